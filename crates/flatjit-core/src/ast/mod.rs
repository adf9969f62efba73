// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Statement tree definitions.
//!
//! The tree is produced by an external parser and consumed read-only by the
//! flattener and the emitter. Every node carries the scope id the parser
//! assigned to it.

use std::fmt;

/// Token that opens a scope in a flattened sequence.
pub const SCOPE_ENTER: &str = "__alloc__";

/// Token that closes a scope in a flattened sequence.
pub const SCOPE_EXIT: &str = "__dealloc__";

/// Scope id assigned by the front end.
pub type ScopeId = usize;

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `var name;`
    VariableDeclaration(VariableDeclaration),
    /// Expression statement, including the scope markers
    Expression(Expression),
    /// `if (condition) { body }`
    If(IfStatement),
    /// `while (condition) { body }`
    While(WhileStatement),
    /// `{ body }`
    Block(BlockStatement),
    /// `name:`
    Label(LabelStatement),
    /// `goto label;`
    Goto(GotoStatement),
    /// `name(arguments);`
    Call(CallStatement),
}

impl Statement {
    /// Scope id assigned by the front end.
    pub fn scope(&self) -> ScopeId {
        match self {
            Statement::VariableDeclaration(decl) => decl.scope,
            Statement::Expression(expr) => expr.scope,
            Statement::If(stmt) => stmt.scope,
            Statement::While(stmt) => stmt.scope,
            Statement::Block(block) => block.scope,
            Statement::Label(label) => label.scope,
            Statement::Goto(stmt) => stmt.scope,
            Statement::Call(call) => call.scope,
        }
    }

    /// Short variant name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::VariableDeclaration(_) => "variable declaration",
            Statement::Expression(_) => "expression",
            Statement::If(_) => "if",
            Statement::While(_) => "while",
            Statement::Block(_) => "block",
            Statement::Label(_) => "label",
            Statement::Goto(_) => "goto",
            Statement::Call(_) => "call",
        }
    }

    /// `var name;`
    pub fn var(scope: ScopeId, name: impl Into<String>) -> Self {
        Statement::VariableDeclaration(VariableDeclaration {
            scope,
            name: name.into(),
        })
    }

    /// Expression statement built from raw tokens.
    pub fn expr<I, S>(scope: ScopeId, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Statement::Expression(Expression::new(scope, tokens))
    }

    /// `if (condition) { body }`
    pub fn if_(scope: ScopeId, condition: Expression, body: Vec<Statement>) -> Self {
        Statement::If(IfStatement {
            scope,
            condition,
            body,
        })
    }

    /// `while (condition) { body }`
    pub fn while_(scope: ScopeId, condition: Expression, body: Vec<Statement>) -> Self {
        Statement::While(WhileStatement {
            scope,
            condition,
            body,
        })
    }

    /// `{ body }`
    pub fn block(scope: ScopeId, body: Vec<Statement>) -> Self {
        Statement::Block(BlockStatement { scope, body })
    }

    /// `name:`
    pub fn label(scope: ScopeId, name: impl Into<String>) -> Self {
        Statement::Label(LabelStatement {
            scope,
            name: name.into(),
        })
    }

    /// `goto label;`
    pub fn goto(scope: ScopeId, label: impl Into<String>) -> Self {
        Statement::Goto(GotoStatement {
            scope,
            label: label.into(),
        })
    }

    /// `name(arguments);`
    pub fn call<I, S>(scope: ScopeId, name: impl Into<String>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Statement::Call(CallStatement {
            scope,
            name: name.into(),
            arguments: arguments.into_iter().map(Into::into).collect(),
        })
    }

    /// Scope-enter marker.
    pub fn scope_enter(scope: ScopeId) -> Self {
        Statement::Expression(Expression::new(scope, [SCOPE_ENTER]))
    }

    /// Scope-exit marker.
    pub fn scope_exit(scope: ScopeId) -> Self {
        Statement::Expression(Expression::new(scope, [SCOPE_EXIT]))
    }

    /// Whether this is a scope-enter marker.
    pub fn is_scope_enter(&self) -> bool {
        matches!(self, Statement::Expression(expr) if expr.is_scope_enter())
    }

    /// Whether this is a scope-exit marker.
    pub fn is_scope_exit(&self) -> bool {
        matches!(self, Statement::Expression(expr) if expr.is_scope_exit())
    }
}

/// A variable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    /// Owning scope id
    pub scope: ScopeId,
    /// Declared name
    pub name: String,
}

/// An expression: alternating operand/operator tokens.
///
/// The shape is a structural contract, not a tree. Only the lengths 1, 2
/// (`! x`, conditions only), 3, 4 and 5 are understood downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// Owning scope id
    pub scope: ScopeId,
    /// Raw tokens
    pub tokens: Vec<String>,
}

impl Expression {
    /// Creates an expression from raw tokens.
    pub fn new<I, S>(scope: ScopeId, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope,
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of tokens.
    pub fn arity(&self) -> usize {
        self.tokens.len()
    }

    /// Whether this is the `__alloc__` marker.
    pub fn is_scope_enter(&self) -> bool {
        self.tokens.len() == 1 && self.tokens[0] == SCOPE_ENTER
    }

    /// Whether this is the `__dealloc__` marker.
    pub fn is_scope_exit(&self) -> bool {
        self.tokens.len() == 1 && self.tokens[0] == SCOPE_EXIT
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

/// An if statement. After flattening the body is a single goto and the
/// condition is `! temp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfStatement {
    /// Owning scope id
    pub scope: ScopeId,
    /// The condition
    pub condition: Expression,
    /// The body
    pub body: Vec<Statement>,
}

/// A while loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileStatement {
    /// Owning scope id
    pub scope: ScopeId,
    /// The loop condition
    pub condition: Expression,
    /// The body
    pub body: Vec<Statement>,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStatement {
    /// Owning scope id
    pub scope: ScopeId,
    /// The statements in the block
    pub body: Vec<Statement>,
}

/// A label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelStatement {
    /// Owning scope id
    pub scope: ScopeId,
    /// Label name
    pub name: String,
}

/// An unconditional jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GotoStatement {
    /// Owning scope id
    pub scope: ScopeId,
    /// Target label
    pub label: String,
}

/// A call to a host builtin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatement {
    /// Owning scope id
    pub scope: ScopeId,
    /// Callee name
    pub name: String,
    /// Argument tokens, literals or variable names
    pub arguments: Vec<String>,
}

/// Whether a token names a variable.
///
/// Only the first character is inspected: an ASCII letter means variable,
/// anything else is a literal.
pub fn is_variable_token(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}
