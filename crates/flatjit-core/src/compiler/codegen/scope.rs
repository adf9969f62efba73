//! Symbol table for variable resolution during emission.

use crate::error::{CompileError, Result};
use std::fmt;

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// A 32-bit integer variable
    Number,
    /// A host routine
    Function,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Number => write!(f, "number"),
            SymbolKind::Function => write!(f, "function"),
        }
    }
}

/// A declared name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// The name
    pub name: String,
    /// What it names
    pub kind: SymbolKind,
    /// Id of the owning scope
    pub scope: usize,
    /// Nesting depth of the owning scope (0 = global)
    pub depth: usize,
    /// Position within the owning scope, in declaration order
    pub slot: usize,
}

/// One lexical scope.
#[derive(Debug, Default)]
struct Scope {
    id: usize,
    symbols: Vec<Symbol>,
}

/// Scope stack mirroring the scope markers of a flat sequence.
///
/// The global scope (id 0) is always present.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    next_id: usize,
}

impl SymbolTable {
    /// Creates a table holding only the empty global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            next_id: 1,
        }
    }

    /// Depth of the current scope (0 = global).
    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Id of the current scope.
    pub fn current_scope(&self) -> usize {
        self.scopes.last().map_or(0, |scope| scope.id)
    }

    /// Begin a new scope with a fresh id.
    pub fn enter_scope(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.scopes.push(Scope {
            id,
            symbols: Vec::new(),
        });
        id
    }

    /// Discard the current scope. The global scope is never popped.
    pub fn exit_scope(&mut self) -> Result<()> {
        if self.scopes.len() == 1 {
            return Err(CompileError::UnbalancedScope("scope exit without matching enter"));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Declare a name in the current scope, returning its slot.
    pub fn insert(&mut self, name: &str, kind: SymbolKind) -> Result<usize> {
        let depth = self.depth();
        let Some(scope) = self.scopes.last_mut() else {
            return Err(CompileError::UnbalancedScope("no scope to declare in"));
        };
        if scope.symbols.iter().any(|symbol| symbol.name == name) {
            return Err(CompileError::DuplicateSymbol(name.to_string()));
        }

        let slot = scope.symbols.len();
        scope.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            scope: scope.id,
            depth,
            slot,
        });
        Ok(slot)
    }

    /// Resolve a name, innermost scope first.
    pub fn find(&self, name: &str) -> Result<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.symbols.iter().find(|symbol| symbol.name == name))
            .ok_or_else(|| CompileError::SymbolNotFound(name.to_string()))
    }

    /// Number of symbols declared so far in the scope at `depth`.
    pub fn declared_at(&self, depth: usize) -> usize {
        self.scopes.get(depth).map_or(0, |scope| scope.symbols.len())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
