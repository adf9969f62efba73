// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compile errors.

use crate::compiler::codegen::SymbolKind;
use thiserror::Error;

/// Result type for compilation
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors that abort a compile. No partial code survives any of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Expression shape does not match an accepted arity/operator form
    #[error("malformed expression '{expression}': expected {expected}")]
    MalformedExpression {
        /// The offending tokens
        expression: String,
        /// The expected shape
        expected: &'static str,
    },

    /// Identifier not visible in any enclosing scope
    #[error("undefined symbol '{0}'")]
    SymbolNotFound(String),

    /// Re-declaration in the same scope
    #[error("symbol '{0}' already declared in this scope")]
    DuplicateSymbol(String),

    /// A goto whose label never appears
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),

    /// A label emitted twice
    #[error("label '{0}' defined more than once")]
    DuplicateLabel(String),

    /// A jump into a scope frame that is not open at the jump
    #[error("jump to label '{0}' enters a scope that is not open at the jump")]
    GotoAcrossFrames(String),

    /// Scope markers do not nest
    #[error("unbalanced scope markers: {0}")]
    UnbalancedScope(&'static str),

    /// A statement the emitter cannot take, e.g. a nested while
    #[error("unexpected {0} statement in flattened sequence")]
    UnexpectedStatement(&'static str),

    /// A variable declared with no open scope frame
    #[error("variable '{0}' declared outside of any scope")]
    DeclarationOutsideScope(String),

    /// A symbol used as the wrong kind
    #[error("'{name}' is not a {expected}")]
    KindMismatch {
        /// The symbol
        name: String,
        /// The kind the use site needs
        expected: SymbolKind,
    },

    /// More arguments than argument registers
    #[error("call to '{name}' passes {count} arguments, at most 6 are supported")]
    TooManyArguments {
        /// Callee
        name: String,
        /// Argument count
        count: usize,
    },

    /// Scope frame larger than the configured budget
    #[error("scope frame needs {bytes} bytes, budget is {budget}")]
    FrameOverflow {
        /// Bytes requested
        bytes: usize,
        /// Configured budget
        budget: usize,
    },

    /// Frame offset not encodable as a signed byte
    #[error("offset {displacement} of '{name}' does not fit a byte displacement")]
    DisplacementOutOfRange {
        /// Variable being addressed
        name: String,
        /// Computed offset from the frame pointer
        displacement: i64,
    },
}

impl CompileError {
    /// Create a malformed-expression error.
    pub fn malformed(tokens: &[String], expected: &'static str) -> Self {
        Self::MalformedExpression {
            expression: tokens.join(" "),
            expected,
        }
    }
}
