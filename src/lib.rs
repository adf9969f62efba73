// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # flatjit
//!
//! Runs small structured programs as native x86-64 code.
//!
//! ## Overview
//!
//! A program is flattened into labels and conditional gotos, every scope is
//! given an `rbp`-linked stack frame, and the result is emitted as one
//! routine, copied into executable memory and called. The only host routine
//! is `print`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flatjit::{Jit, Statement};
//!
//! let program = vec![
//!     Statement::var(1, "a"),
//!     Statement::expr(1, ["a", "=", "6", "*", "7"]),
//!     Statement::call(1, "print", ["a"]),
//! ];
//! Jit::new().run(&program)?; // prints 42
//! # Ok::<(), flatjit::JitError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod error;
pub mod exec;
pub mod jit;

pub use builtins::builtin_print;
pub use error::{JitError, Result};
pub use exec::ExecutableBuffer;
pub use jit::{CompiledRoutine, Jit};

pub use flatjit_core::{Builtins, CompileError, CompilerOptions, MachineCode, Statement, ast};
