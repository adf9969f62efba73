// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-scope variable counting.
//!
//! Every scope in a flattened sequence is identified by its nesting level
//! and its ordinal among the scopes closed before it on that level:
//!
//! ```text
//!               .              level 0 (routine)
//!              / \
//!             /   \
//!         (1,0)   (1,1)        level 1
//!          / \     / \
//!      (2,0)(2,1)(2,2)(2,3)    level 2
//! ```
//!
//! The count stored under a key is the number of words the emitter
//! reserves when it opens that scope's frame.

use crate::ast::Statement;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// `(nesting level, sibling ordinal)` coordinate of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AllocationKey {
    /// Nesting level, 1 for the outermost scope
    pub level: usize,
    /// Scopes already closed on this level
    pub ordinal: usize,
}

impl AllocationKey {
    /// Creates a key.
    pub fn new(level: usize, ordinal: usize) -> Self {
        Self { level, ordinal }
    }
}

/// Variable count per scope.
pub type AllocationMap = BTreeMap<AllocationKey, usize>;

/// Level/ordinal bookkeeping shared by every walk over a flat sequence.
///
/// Levels only rise on enter and only fall on exit; ordinals only grow.
#[derive(Debug, Default, Clone)]
pub struct ScopeCursor {
    level: usize,
    ordinals: FxHashMap<usize, usize>,
}

impl ScopeCursor {
    /// Creates a cursor at level 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting level.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Key of the innermost open scope.
    pub fn current(&self) -> AllocationKey {
        let ordinal = self.ordinals.get(&self.level).copied().unwrap_or(0);
        AllocationKey::new(self.level, ordinal)
    }

    /// Opens a scope and returns its key.
    pub fn enter(&mut self) -> AllocationKey {
        self.level += 1;
        self.current()
    }

    /// Closes the innermost scope and returns its key, or `None` when no
    /// scope is open.
    pub fn exit(&mut self) -> Option<AllocationKey> {
        if self.level == 0 {
            return None;
        }
        let key = self.current();
        *self.ordinals.entry(self.level).or_insert(0) += 1;
        self.level -= 1;
        Some(key)
    }
}

/// Counts declared variables per scope in one linear scan.
#[derive(Debug, Default)]
pub struct AllocationPass {
    cursor: ScopeCursor,
    allocations: AllocationMap,
}

impl AllocationPass {
    /// Creates an empty pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans a flattened sequence and returns the counts.
    pub fn run(statements: &[Statement]) -> AllocationMap {
        let mut pass = Self::new();
        for stmt in statements {
            pass.visit(stmt);
        }
        debug!(scopes = pass.allocations.len(), "allocation pass finished");
        pass.allocations
    }

    fn visit(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(expr) if expr.is_scope_enter() => {
                self.cursor.enter();
            }
            Statement::Expression(expr) if expr.is_scope_exit() => {
                // Unbalanced exits are reported by the emitter.
                let _ = self.cursor.exit();
            }
            Statement::VariableDeclaration(decl) => {
                let key = self.cursor.current();
                trace!(name = %decl.name, level = key.level, ordinal = key.ordinal, "counted variable");
                *self.allocations.entry(key).or_insert(0) += 1;
            }
            _ => {}
        }
    }
}
