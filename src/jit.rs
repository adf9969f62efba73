// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compile-and-run pipeline.

use crate::builtins::{builtin_print, print_address};
use crate::error::{JitError, Result};
use crate::exec::ExecutableBuffer;
use flatjit_core::{Builtins, CompilerOptions, MachineCode, Statement};
use tracing::debug;

/// The JIT.
///
/// Holds the options and host bindings every compile uses.
#[derive(Debug, Clone)]
pub struct Jit {
    options: CompilerOptions,
    print: extern "C" fn(i32),
}

impl Jit {
    /// Creates a JIT with default options, printing to stdout.
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    /// Creates a JIT with the given options.
    pub fn with_options(options: CompilerOptions) -> Self {
        Self {
            options,
            print: builtin_print,
        }
    }

    /// Binds `print` to another host routine.
    pub fn with_print(mut self, print: extern "C" fn(i32)) -> Self {
        self.print = print;
        self
    }

    /// The options used for every compile.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn builtins(&self) -> Builtins {
        Builtins::new(print_address(self.print))
    }

    /// Compiles a program into a loaded routine.
    pub fn compile(&self, program: &[Statement]) -> Result<CompiledRoutine> {
        let code = flatjit_core::compile(program, self.builtins(), &self.options)?;
        CompiledRoutine::load(code)
    }

    /// Compiles a program and runs it once.
    pub fn run(&self, program: &[Statement]) -> Result<()> {
        self.compile(program)?.invoke();
        Ok(())
    }

    /// Compiles independent programs in parallel and loads them in order.
    #[cfg(feature = "parallel")]
    pub fn compile_batch(&self, programs: &[Vec<Statement>]) -> Vec<Result<CompiledRoutine>> {
        flatjit_core::compile_batch(programs, self.builtins(), &self.options)
            .into_iter()
            .map(|code| CompiledRoutine::load(code?))
            .collect()
    }
}

impl Default for Jit {
    fn default() -> Self {
        Self::new()
    }
}

/// Generated code together with the memory it runs from.
#[derive(Debug)]
pub struct CompiledRoutine {
    code: MachineCode,
    buffer: ExecutableBuffer,
}

impl CompiledRoutine {
    fn load(code: MachineCode) -> Result<Self> {
        if !cfg!(target_arch = "x86_64") {
            return Err(JitError::UnsupportedArchitecture(std::env::consts::ARCH));
        }
        let buffer = ExecutableBuffer::load(code.as_bytes())?;
        debug!(bytes = code.len(), "compiled routine");
        Ok(Self { code, buffer })
    }

    /// The generated bytes.
    pub fn machine_code(&self) -> &MachineCode {
        &self.code
    }

    /// Runs the routine.
    ///
    /// Integer division behaves like the hardware instruction: a divisor
    /// that is zero at run time, or `i32::MIN / -1`, raises `SIGFPE` and
    /// terminates the process. Literal zero divisors are rejected at compile
    /// time.
    pub fn invoke(&self) {
        // SAFETY: the buffer holds a whole routine produced by the emitter.
        // Every frame it opens is closed on each path out, jumps included,
        // and the only foreign call is `print` on a 16-byte aligned stack.
        unsafe { self.buffer.invoke() }
    }
}
