// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Control-flow flattening.
//!
//! Rewrites structured statements into a linear sequence a label/goto
//! machine can run, bracketing every stack frame with explicit scope
//! markers.
//!
//! ## If Statement
//!
//! ```text
//! if (condition) { body }
//!
//!   __alloc__
//!   var temp
//!   temp = condition
//!   if (! temp) goto end
//!   __alloc__
//!   [body]
//!   __dealloc__
//! end:
//!   __dealloc__
//! ```
//!
//! ## While Loop
//!
//! ```text
//! while (condition) { body }
//!
//!   __alloc__
//!   var temp
//! start:
//!   temp = condition
//!   if (! temp) goto end
//!   __alloc__
//!   [body]
//!   __dealloc__
//!   goto start
//! end:
//!   __dealloc__
//! ```
//!
//! Blocks nested inside a scope are spliced into it. Only conditionals and
//! loops open new frames.

use crate::ast::{Expression, ScopeId, Statement};
use tracing::debug;

/// Source of fresh temporary and label names.
///
/// Both kinds draw from one counter, so every generated name is unique
/// within a compile.
#[derive(Debug, Default, Clone)]
pub struct NameGenerator {
    counter: usize,
}

impl NameGenerator {
    /// Creates a generator starting from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next temporary name, `temp__N`.
    pub fn temporary(&mut self) -> String {
        self.counter += 1;
        format!("temp__{}", self.counter)
    }

    /// Next label name, `label__N`.
    pub fn label(&mut self) -> String {
        self.counter += 1;
        format!("label__{}", self.counter)
    }
}

/// Flattens statement trees.
#[derive(Debug, Default)]
pub struct Flattener {
    names: NameGenerator,
}

impl Flattener {
    /// Creates a flattener with a fresh name generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flattener that continues an existing name sequence.
    pub fn with_names(names: NameGenerator) -> Self {
        Self { names }
    }

    /// Gives back the name generator.
    pub fn into_names(self) -> NameGenerator {
        self.names
    }

    /// Flattens a statement list as-is.
    ///
    /// Blocks at this level get one scope pair each; everything below is
    /// spliced.
    pub fn flatten(&mut self, statements: &[Statement]) -> Vec<Statement> {
        let mut out = Vec::with_capacity(statements.len());
        for stmt in statements {
            self.flatten_statement(stmt, false, &mut out);
        }
        debug!(statements = out.len(), "flattened statement list");
        out
    }

    /// Flattens a whole program, treating it as the outermost block.
    pub fn flatten_program(&mut self, statements: &[Statement]) -> Vec<Statement> {
        let scope = statements.first().map_or(0, Statement::scope);
        let mut out = vec![Statement::scope_enter(scope)];
        for stmt in statements {
            self.flatten_statement(stmt, true, &mut out);
        }
        out.push(Statement::scope_exit(scope));
        debug!(statements = out.len(), "flattened program");
        out
    }

    fn flatten_statement(&mut self, stmt: &Statement, in_scope: bool, out: &mut Vec<Statement>) {
        match stmt {
            Statement::Block(block) if in_scope => {
                for inner in &block.body {
                    self.flatten_statement(inner, true, out);
                }
            }
            Statement::Block(block) => {
                out.push(Statement::scope_enter(block.scope));
                for inner in &block.body {
                    self.flatten_statement(inner, true, out);
                }
                out.push(Statement::scope_exit(block.scope));
            }
            Statement::If(if_stmt) => {
                let body = self.flatten_body(&if_stmt.body);
                let temp = self.names.temporary();
                let end = self.names.label();
                let scope = if_stmt.scope;

                out.push(Statement::scope_enter(scope));
                out.push(Statement::var(scope, temp.clone()));
                out.push(assign(scope, &temp, &if_stmt.condition));
                out.push(if_not_goto(scope, &temp, &end));
                out.push(Statement::scope_enter(scope));
                out.extend(body);
                out.push(Statement::scope_exit(scope));
                out.push(Statement::label(scope, end));
                out.push(Statement::scope_exit(scope));
            }
            Statement::While(while_stmt) => {
                let body = self.flatten_body(&while_stmt.body);
                let temp = self.names.temporary();
                let start = self.names.label();
                let end = self.names.label();
                let scope = while_stmt.scope;

                out.push(Statement::scope_enter(scope));
                out.push(Statement::var(scope, temp.clone()));
                out.push(Statement::label(scope, start.clone()));
                out.push(assign(scope, &temp, &while_stmt.condition));
                out.push(if_not_goto(scope, &temp, &end));
                out.push(Statement::scope_enter(scope));
                out.extend(body);
                out.push(Statement::scope_exit(scope));
                out.push(Statement::goto(scope, start));
                out.push(Statement::label(scope, end));
                out.push(Statement::scope_exit(scope));
            }
            Statement::VariableDeclaration(_)
            | Statement::Expression(_)
            | Statement::Label(_)
            | Statement::Goto(_)
            | Statement::Call(_) => out.push(stmt.clone()),
        }
    }

    /// Body of a conditional or loop. The caller supplies the scope pair.
    fn flatten_body(&mut self, body: &[Statement]) -> Vec<Statement> {
        let mut out = Vec::with_capacity(body.len());
        for stmt in body {
            self.flatten_statement(stmt, true, &mut out);
        }
        out
    }
}

/// `temp = condition...`
fn assign(scope: ScopeId, temp: &str, condition: &Expression) -> Statement {
    let tokens = [temp, "="]
        .into_iter()
        .map(str::to_string)
        .chain(condition.tokens.iter().cloned());
    Statement::expr(scope, tokens)
}

/// `if (! temp) goto label`
fn if_not_goto(scope: ScopeId, temp: &str, label: &str) -> Statement {
    Statement::if_(
        scope,
        Expression::new(scope, ["!", temp]),
        vec![Statement::goto(scope, label)],
    )
}
