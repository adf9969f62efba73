//! Machine code emission from flattened statements.
//!
//! This module contains the `Emitter` which walks a flattened sequence and
//! produces one parameterless x86-64 routine.
//!
//! ## Frame Layout
//!
//! Every scope-enter marker opens a frame, every scope-exit closes it:
//!
//! ```text
//!   push rbp            ; link to the enclosing frame
//!   mov rbp, rsp
//!   sub rsp, 4 * n      ; n = variables counted for this scope
//!   ...
//!   add rsp, 4 * n
//!   pop rbp
//! ```
//!
//! Slot `s` of the current frame lives at `[rbp - 4 * (s + 1)]`. A variable
//! in an enclosing frame is reached from the current `rbp` by climbing over
//! every saved frame pointer and every word reserved in between.
//!
//! ## Jumps
//!
//! Jumps carry a 4-byte displacement. A jump to a label not yet emitted
//! leaves a zero placeholder and is recorded in the patch table; the label
//! patches every recorded placeholder when it is reached. A jump to a label
//! already emitted is resolved on the spot.
//!
//! A label belongs to the chain of frames open where it is defined. A jump
//! may only target a label whose chain is a prefix of its own; the frames
//! in between are closed on the way out:
//!
//! ```text
//!   goto out            ; backward: add rsp, 4 * n; pop rbp ... jmp out
//!
//!   jmp skip            ; forward: one unwinding stub per jump,
//! stub:                 ; placed in front of the label
//!   add rsp, 4 * n
//!   pop rbp
//!   jmp out
//! skip:
//! out:
//! ```

mod expressions;
mod scope;


pub use scope::{Symbol, SymbolKind, SymbolTable};

use crate::allocation::{AllocationKey, AllocationMap, ScopeCursor};
use crate::ast::{IfStatement, Statement, is_variable_token};
use crate::compiler::machine_code::{Condition, LINK_SIZE, MachineCode, WORD_SIZE};
use crate::error::{CompileError, Result};
use crate::options::{Builtins, CompilerOptions};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

/// Name the host `print` routine is bound under.
pub const PRINT: &str = "print";

/// An open scope frame.
#[derive(Debug, Clone, Copy)]
struct Frame {
    key: AllocationKey,
    /// Words reserved below the saved frame pointer
    slots: usize,
}

/// Where a label was emitted.
#[derive(Debug, Clone)]
struct LabelSite {
    offset: usize,
    /// Keys of the frames open at the label, outermost first
    frames: Vec<AllocationKey>,
}

/// A jump waiting for its label.
#[derive(Debug, Clone)]
struct PendingJump {
    /// Offset of the rel32 placeholder
    at: usize,
    /// Frames open at the jump
    frames: Vec<Frame>,
}

/// Emits machine code for a flattened sequence.
pub struct Emitter<'a> {
    /// The code being generated
    code: MachineCode,
    /// Variable counts from the allocation pass
    allocations: &'a AllocationMap,
    builtins: Builtins,
    options: CompilerOptions,
    cursor: ScopeCursor,
    symbols: SymbolTable,
    /// Open frames, outermost first; `frames[d - 1]` is at depth `d`
    frames: Vec<Frame>,
    /// Bytes pushed below the routine's return address
    stack_depth: usize,
    /// Label -> jumps waiting for it
    pending_jumps: FxHashMap<String, Vec<PendingJump>>,
    /// Label -> where it was emitted
    labels: FxHashMap<String, LabelSite>,
}

impl<'a> Emitter<'a> {
    /// Creates an emitter over the counts of one allocation pass.
    pub fn new(allocations: &'a AllocationMap, builtins: Builtins, options: &CompilerOptions) -> Self {
        Self {
            code: MachineCode::new(),
            allocations,
            builtins,
            options: options.clone(),
            cursor: ScopeCursor::new(),
            symbols: SymbolTable::new(),
            frames: Vec::new(),
            stack_depth: 0,
            pending_jumps: FxHashMap::default(),
            labels: FxHashMap::default(),
        }
    }

    // ========================================================================
    // Main Emission Entry Point
    // ========================================================================

    /// Emits the whole routine.
    pub fn emit(mut self, statements: &[Statement]) -> Result<MachineCode> {
        self.symbols.insert(PRINT, SymbolKind::Function)?;

        self.code.frame_prologue();
        self.stack_depth = LINK_SIZE;

        for stmt in statements {
            self.emit_statement(stmt)?;
        }

        if !self.frames.is_empty() {
            return Err(CompileError::UnbalancedScope("scope enter without matching exit"));
        }
        if let Some(label) = self.pending_jumps.keys().min() {
            return Err(CompileError::UndefinedLabel(label.clone()));
        }

        self.code.pop_rbp();
        self.code.ret();

        debug!(bytes = self.code.len(), labels = self.labels.len(), "emitted routine");
        Ok(self.code)
    }

    // ========================================================================
    // Statement Emission
    // ========================================================================

    fn emit_statement(&mut self, stmt: &Statement) -> Result<()> {
        match stmt {
            Statement::VariableDeclaration(decl) => self.declare(&decl.name),
            Statement::Expression(expr) if expr.is_scope_enter() => self.enter_frame(),
            Statement::Expression(expr) if expr.is_scope_exit() => self.exit_frame(),
            Statement::Expression(expr) => self.emit_expression(expr),
            Statement::If(if_stmt) => self.emit_conditional_goto(if_stmt),
            Statement::Label(label) => self.define_label(&label.name),
            Statement::Goto(goto) => self.emit_goto(&goto.label),
            Statement::Call(call) => self.emit_call(call),
            Statement::While(_) | Statement::Block(_) => {
                Err(CompileError::UnexpectedStatement(stmt.kind()))
            }
        }
    }

    fn declare(&mut self, name: &str) -> Result<()> {
        let Some(frame) = self.frames.last().copied() else {
            return Err(CompileError::DeclarationOutsideScope(name.to_string()));
        };
        let slot = self.symbols.insert(name, SymbolKind::Number)?;
        if slot >= frame.slots {
            // the allocation map was computed over a different sequence
            return Err(CompileError::FrameOverflow {
                bytes: (slot + 1) * WORD_SIZE,
                budget: frame.slots * WORD_SIZE,
            });
        }
        Ok(())
    }

    /// `if (! variable) goto label`
    fn emit_conditional_goto(&mut self, if_stmt: &IfStatement) -> Result<()> {
        let label = match if_stmt.body.as_slice() {
            [Statement::Goto(goto)] => &goto.label,
            _ => return Err(CompileError::UnexpectedStatement("if")),
        };

        let tokens = &if_stmt.condition.tokens;
        let variable = match tokens.as_slice() {
            [bang, name] if bang == "!" && is_variable_token(name) => name,
            _ => {
                return Err(CompileError::malformed(
                    tokens,
                    "`! variable` as a flattened condition",
                ));
            }
        };

        let disp = self.resolve_variable(variable)?;
        self.code.test_frame_zero(disp);
        let at = self.code.jump_if(Condition::Equal);
        self.branch_to(label, at)
    }

    // ========================================================================
    // Frames
    // ========================================================================

    fn enter_frame(&mut self) -> Result<()> {
        let key = self.cursor.enter();
        let slots = self.allocations.get(&key).copied().unwrap_or(0);
        let bytes = slots * WORD_SIZE;
        let budget = self.options.frame_budget;
        let reserve = u32::try_from(bytes)
            .ok()
            .filter(|_| bytes <= budget)
            .ok_or(CompileError::FrameOverflow { bytes, budget })?;

        self.symbols.enter_scope();
        self.code.frame_prologue();
        self.code.reserve(reserve);
        self.stack_depth += LINK_SIZE + bytes;
        self.frames.push(Frame { key, slots });

        trace!(level = key.level, ordinal = key.ordinal, slots, "entered frame");
        Ok(())
    }

    fn exit_frame(&mut self) -> Result<()> {
        let frame = self
            .frames
            .pop()
            .ok_or(CompileError::UnbalancedScope("scope exit without matching enter"))?;
        self.cursor.exit();
        self.symbols.exit_scope()?;

        let bytes = frame.slots * WORD_SIZE;
        // bytes was checked against the budget on enter
        self.code.release(bytes as u32);
        self.code.pop_rbp();
        self.stack_depth -= LINK_SIZE + bytes;

        trace!(level = frame.key.level, ordinal = frame.key.ordinal, "left frame");
        Ok(())
    }

    // ========================================================================
    // Addressing
    // ========================================================================

    /// `rbp`-relative displacement of a number variable.
    fn resolve_variable(&self, name: &str) -> Result<i8> {
        let symbol = self.symbols.find(name)?;
        if symbol.kind != SymbolKind::Number {
            return Err(CompileError::KindMismatch {
                name: name.to_string(),
                expected: SymbolKind::Number,
            });
        }
        self.frame_offset(symbol)
    }

    /// Offset of a symbol's slot from the current frame pointer.
    ///
    /// Same frame: `-(slot + 1) * 4`. Enclosing frame `t` seen from frame
    /// `c`: one saved frame pointer per hop, the target frame's words after
    /// the slot, and every word of the frames strictly between.
    fn frame_offset(&self, symbol: &Symbol) -> Result<i8> {
        let current = self.frames.len();
        let target = symbol.depth;
        debug_assert!(target >= 1 && target <= current, "number symbol outside open frames");

        let displacement = if target == current {
            -(((symbol.slot + 1) * WORD_SIZE) as i64)
        } else {
            let hops = current - target;
            let after_slot = self.frames[target - 1].slots - (symbol.slot + 1);
            let between: usize = self.frames[target..current - 1]
                .iter()
                .map(|frame| frame.slots)
                .sum();
            (hops * LINK_SIZE + (after_slot + between) * WORD_SIZE) as i64
        };

        i8::try_from(displacement).map_err(|_| CompileError::DisplacementOutOfRange {
            name: symbol.name.clone(),
            displacement,
        })
    }

    // ========================================================================
    // Labels
    // ========================================================================

    fn define_label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(CompileError::DuplicateLabel(name.to_string()));
        }
        let here: Vec<AllocationKey> = self.frames.iter().map(|frame| frame.key).collect();

        let mut direct = Vec::new();
        let mut unwinding = Vec::new();
        for jump in self.pending_jumps.remove(name).unwrap_or_default() {
            let leaving = frames_left(name, &here, &jump.frames)?;
            if leaving.is_empty() {
                direct.push(jump.at);
            } else {
                unwinding.push((jump.at, leaving));
            }
        }

        let mut stub_exits = Vec::with_capacity(unwinding.len());
        if !unwinding.is_empty() {
            let skip = self.code.jump();
            for (at, leaving) in unwinding {
                let stub = self.code.len();
                self.code.patch_jump(at, stub);
                stub_exits.push(self.unwind(leaving));
            }
            let end = self.code.len();
            self.code.patch_jump(skip, end);
        }

        let target = self.code.len();
        for at in direct.into_iter().chain(stub_exits) {
            self.code.patch_jump(at, target);
            trace!(label = name, at, target, "patched forward jump");
        }
        self.labels.insert(
            name.to_string(),
            LabelSite {
                offset: target,
                frames: here,
            },
        );
        Ok(())
    }

    /// `goto label`, closing every frame the label lies outside of.
    fn emit_goto(&mut self, label: &str) -> Result<()> {
        match self.labels.get(label) {
            Some(site) => {
                let target = site.offset;
                let leaving = frames_left(label, &site.frames, &self.frames)?;
                let at = self.unwind(leaving);
                self.code.patch_jump(at, target);
                trace!(label, at, target, "resolved backward jump");
                Ok(())
            }
            None => {
                let at = self.code.jump();
                self.defer(label, at);
                Ok(())
            }
        }
    }

    /// Points the branch placeholder at `at` to `label`.
    ///
    /// The branch may fall through, so a backward target that needs frames
    /// closed is reached through a stub skipped by the fall-through path.
    fn branch_to(&mut self, label: &str, at: usize) -> Result<()> {
        let Some(site) = self.labels.get(label) else {
            self.defer(label, at);
            return Ok(());
        };
        let target = site.offset;
        let leaving = frames_left(label, &site.frames, &self.frames)?;
        if leaving.is_empty() {
            self.code.patch_jump(at, target);
        } else {
            let skip = self.code.jump();
            let stub = self.code.len();
            self.code.patch_jump(at, stub);
            let exit = self.unwind(leaving);
            self.code.patch_jump(exit, target);
            let end = self.code.len();
            self.code.patch_jump(skip, end);
        }
        trace!(label, at, target, "resolved backward branch");
        Ok(())
    }

    fn defer(&mut self, label: &str, at: usize) {
        let jump = PendingJump {
            at,
            frames: self.frames.clone(),
        };
        self.pending_jumps
            .entry(label.to_string())
            .or_default()
            .push(jump);
    }

    /// Closes `leaving` innermost first, then emits a `jmp` placeholder.
    fn unwind(&mut self, leaving: Vec<Frame>) -> usize {
        for frame in leaving.iter().rev() {
            // checked against the budget on enter
            self.code.release((frame.slots * WORD_SIZE) as u32);
            self.code.pop_rbp();
        }
        self.code.jump()
    }
}

/// Frames a jump from `source` closes to reach a label defined under
/// `target`. The label's frames must all still be open at the jump.
fn frames_left(label: &str, target: &[AllocationKey], source: &[Frame]) -> Result<Vec<Frame>> {
    let depth = target.len();
    let shared = source.len() >= depth
        && source[..depth]
            .iter()
            .map(|frame| frame.key)
            .eq(target.iter().copied());
    if !shared {
        return Err(CompileError::GotoAcrossFrames(label.to_string()));
    }
    Ok(source[depth..].to_vec())
}
