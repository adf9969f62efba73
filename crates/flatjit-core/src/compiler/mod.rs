//! x86-64 code generation for flattened programs.
//!
//! # Module Structure
//!
//! - `machine_code`: Instruction encoders and the growing code buffer
//! - `codegen`: Emission from flattened statements
//!   - `codegen::scope`: Symbol table for variable resolution

pub mod codegen;
pub mod machine_code;

pub use codegen::{Emitter, PRINT, Symbol, SymbolKind, SymbolTable};
pub use machine_code::{Arith, Condition, MachineCode, Operand};

use crate::allocation::AllocationPass;
use crate::ast::Statement;
use crate::error::Result;
use crate::flatten::Flattener;
use crate::options::{Builtins, CompilerOptions};
use tracing::debug;

/// Emits code for an already flattened sequence.
pub fn emit(flat: &[Statement], builtins: Builtins, options: &CompilerOptions) -> Result<MachineCode> {
    let allocations = AllocationPass::run(flat);
    Emitter::new(&allocations, builtins, options).emit(flat)
}

/// Flattens a program and emits it as one routine.
pub fn compile(
    program: &[Statement],
    builtins: Builtins,
    options: &CompilerOptions,
) -> Result<MachineCode> {
    let flat = Flattener::new().flatten_program(program);
    debug!(statements = program.len(), flattened = flat.len(), "flattened program");
    emit(&flat, builtins, options)
}

/// Compiles independent programs on the rayon pool.
///
/// Results are in input order.
#[cfg(feature = "parallel")]
pub fn compile_batch(
    programs: &[Vec<Statement>],
    builtins: Builtins,
    options: &CompilerOptions,
) -> Vec<Result<MachineCode>> {
    use rayon::prelude::*;

    programs
        .par_iter()
        .map(|program| compile(program, builtins, options))
        .collect()
}
