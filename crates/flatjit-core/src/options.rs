// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler configuration.

/// Bytes a negative byte displacement can reach below the frame pointer.
pub const DEFAULT_FRAME_BUDGET: usize = 128;

/// Options controlling code emission.
///
/// # Example
///
/// ```
/// use flatjit_core::CompilerOptions;
///
/// let options = CompilerOptions { frame_budget: 64 };
/// assert_eq!(options.frame_budget, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Maximum bytes reserved for the variables of one scope frame.
    ///
    /// Frames above it fail with `FrameOverflow`. Default: 128
    pub frame_budget: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            frame_budget: DEFAULT_FRAME_BUDGET,
        }
    }
}

/// Addresses of the host routines bound at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtins {
    /// Address of `print`, an `extern "C" fn(i32)`.
    pub print: u64,
}

impl Builtins {
    /// Builtins bound to the given `print` address.
    pub fn new(print: u64) -> Self {
        Self { print }
    }
}
