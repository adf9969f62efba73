// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # flatjit-core
//!
//! Compiles a small structured language straight to x86-64 machine code.
//!
//! ## Overview
//!
//! - Flattening of `if`/`while`/blocks into labels and conditional gotos
//! - A counting pass that sizes every scope frame
//! - Emission of one System V routine with `rbp`-linked scope frames
//!
//! Loading the bytes into executable memory is left to the `flatjit` crate.
//!
//! ## Quick Start
//!
//! ```
//! use flatjit_core::{Builtins, CompilerOptions, Statement, compile};
//!
//! let program = vec![
//!     Statement::var(1, "a"),
//!     Statement::expr(1, ["a", "=", "2", "*", "21"]),
//!     Statement::call(1, "print", ["a"]),
//! ];
//! let code = compile(&program, Builtins::new(0), &CompilerOptions::default()).unwrap();
//! assert_eq!(code.as_bytes().last(), Some(&0xC3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocation;
pub mod ast;
pub mod compiler;
pub mod error;
pub mod flatten;
pub mod options;

pub use allocation::{AllocationKey, AllocationMap, AllocationPass, ScopeCursor};
pub use ast::Statement;
pub use compiler::{MachineCode, compile, emit};
pub use error::{CompileError, Result};
pub use flatten::{Flattener, NameGenerator};
pub use options::{Builtins, CompilerOptions, DEFAULT_FRAME_BUDGET};

#[cfg(feature = "parallel")]
pub use compiler::compile_batch;

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize a tracing subscriber writing to the test harness.
    ///
    /// Filter from `RUST_LOG`, `debug` otherwise.
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Already initialized by an earlier test
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    }
}
