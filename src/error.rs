// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the JIT

use thiserror::Error;

/// Result type for JIT operations
pub type Result<T> = std::result::Result<T, JitError>;

/// Errors that can occur while compiling or loading a routine
#[derive(Debug, Error)]
pub enum JitError {
    /// The program did not compile
    #[error("{0}")]
    Compile(#[from] flatjit_core::CompileError),

    /// Mapping or protecting executable memory failed
    #[error("Memory mapping error: {0}")]
    Memory(#[from] nix::Error),

    /// Nothing to load
    #[error("Cannot load an empty routine")]
    EmptyCode,

    /// Generated code only runs on x86-64
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(&'static str),
}
