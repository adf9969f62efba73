// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Executable memory for generated routines.
//!
//! A region is mapped read+write, filled, then flipped to read+execute. It is
//! never writable and executable at the same time.

use crate::error::{JitError, Result};
use nix::sys::mman::{MapFlags, ProtFlags, mmap_anonymous, mprotect, munmap};
use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use tracing::{debug, warn};

/// A private anonymous mapping holding one routine.
#[derive(Debug)]
pub struct ExecutableBuffer {
    ptr: NonNull<c_void>,
    len: usize,
}

impl ExecutableBuffer {
    /// Copies `bytes` into fresh executable memory.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let len = NonZeroUsize::new(bytes.len()).ok_or(JitError::EmptyCode)?;

        // SAFETY: a new anonymous mapping aliases nothing.
        let ptr = unsafe {
            mmap_anonymous(
                None,
                len,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_PRIVATE,
            )?
        };
        // Unmapped on drop from here on, including the error path below.
        let buffer = Self {
            ptr,
            len: len.get(),
        };

        // SAFETY: the mapping is `len` writable bytes owned by `buffer`.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().cast::<u8>(), bytes.len());
            mprotect(ptr, buffer.len, ProtFlags::PROT_READ | ProtFlags::PROT_EXEC)?;
        }

        debug!(bytes = buffer.len, address = ?ptr, "loaded routine");
        Ok(buffer)
    }

    /// Calls the routine at the start of the buffer.
    ///
    /// # Safety
    ///
    /// The buffer must hold a complete routine following the System V
    /// calling convention for `extern "C" fn()`.
    pub unsafe fn invoke(&self) {
        // SAFETY: upheld by the caller.
        let entry = unsafe { std::mem::transmute::<*mut c_void, extern "C" fn()>(self.ptr.as_ptr()) };
        entry();
    }

    /// Size of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; empty buffers cannot be loaded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for ExecutableBuffer {
    fn drop(&mut self) {
        // SAFETY: the mapping was created by `load` and is not used after this.
        if let Err(err) = unsafe { munmap(self.ptr, self.len) } {
            warn!(%err, "failed to unmap executable buffer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    #[test]
    fn test_load_empty() {
        assert!(matches!(ExecutableBuffer::load(&[]), Err(JitError::EmptyCode)));
    }

    #[test]
    fn test_load_keeps_length() {
        init_test_logging();
        let buffer = ExecutableBuffer::load(&[0xC3; 10]).unwrap();
        assert_eq!(buffer.len(), 10);
        assert!(!buffer.is_empty());
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_invoke_bare_return() {
        let buffer = ExecutableBuffer::load(&[0xC3]).unwrap();
        // SAFETY: `ret` is a complete routine.
        unsafe { buffer.invoke() };
    }
}
