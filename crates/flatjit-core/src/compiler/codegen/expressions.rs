//! Expression and call emission.
//!
//! Expressions arrive as token lists of fixed shapes:
//!
//! | Tokens | Form              | Code                                   |
//! |--------|-------------------|----------------------------------------|
//! | 1      | `v`               | none, operands are still checked       |
//! | 3      | `x = v`           | load, store                            |
//! | 4      | `x = ! v`         | load, compare with 0, store            |
//! | 5      | `x = a <op> b`    | load `a`, apply `b`, store             |
//!
//! All values pass through `eax`.

use super::{Emitter, PRINT, SymbolKind};
use crate::ast::{CallStatement, Expression, is_variable_token};
use crate::compiler::machine_code::{ARGUMENT_REGISTERS, Arith, Condition, LINK_SIZE, Operand};
use crate::error::{CompileError, Result};
use tracing::trace;

/// Operator of a five-token expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Arith(Arith),
    Compare(Condition),
}

impl BinaryOp {
    fn parse(op: &str) -> Option<Self> {
        let op = match op {
            "+" => BinaryOp::Arith(Arith::Add),
            "-" => BinaryOp::Arith(Arith::Sub),
            "*" => BinaryOp::Arith(Arith::Mul),
            "/" => BinaryOp::Arith(Arith::Div),
            "==" => BinaryOp::Compare(Condition::Equal),
            "!=" => BinaryOp::Compare(Condition::NotEqual),
            "<" => BinaryOp::Compare(Condition::Less),
            "<=" => BinaryOp::Compare(Condition::LessEqual),
            ">" => BinaryOp::Compare(Condition::Greater),
            ">=" => BinaryOp::Compare(Condition::GreaterEqual),
            _ => return None,
        };
        Some(op)
    }
}

impl Emitter<'_> {
    pub(super) fn emit_expression(&mut self, expr: &Expression) -> Result<()> {
        let tokens = expr.tokens.as_slice();
        match tokens {
            [value] => {
                self.operand(value, tokens)?;
            }
            [target, eq, value] if eq == "=" => {
                let dst = self.assignment_target(target, tokens)?;
                let src = self.operand(value, tokens)?;
                self.code.load_eax(src);
                self.code.store_eax(dst);
            }
            [target, eq, bang, value] if eq == "=" && bang == "!" => {
                let dst = self.assignment_target(target, tokens)?;
                let src = self.operand(value, tokens)?;
                self.code.load_eax(src);
                self.code.materialize(Condition::Equal, Operand::Imm(0));
                self.code.store_eax(dst);
            }
            [target, eq, lhs, op, rhs] if eq == "=" => {
                let op = BinaryOp::parse(op).ok_or_else(|| {
                    CompileError::malformed(tokens, "one of + - * / == != < <= > >=")
                })?;
                let dst = self.assignment_target(target, tokens)?;
                let lhs = self.operand(lhs, tokens)?;
                let rhs = self.operand(rhs, tokens)?;
                if op == BinaryOp::Arith(Arith::Div) && rhs == Operand::Imm(0) {
                    return Err(CompileError::malformed(tokens, "a non-zero divisor"));
                }
                self.code.load_eax(lhs);
                match op {
                    BinaryOp::Arith(arith) => self.code.arith(arith, rhs),
                    BinaryOp::Compare(condition) => self.code.materialize(condition, rhs),
                }
                self.code.store_eax(dst);
            }
            [_, _, _] => return Err(CompileError::malformed(tokens, "`variable = operand`")),
            [_, _, _, _] => {
                return Err(CompileError::malformed(tokens, "`variable = ! operand`"));
            }
            [_, _, _, _, _] => {
                return Err(CompileError::malformed(tokens, "`variable = operand op operand`"));
            }
            _ => return Err(CompileError::malformed(tokens, "1, 3, 4 or 5 tokens")),
        }

        trace!(expression = %expr, "emitted expression");
        Ok(())
    }

    /// The left-hand side of an assignment must name a number variable.
    fn assignment_target(&self, token: &str, tokens: &[String]) -> Result<i8> {
        if !is_variable_token(token) {
            return Err(CompileError::malformed(tokens, "a variable on the left of `=`"));
        }
        self.resolve_variable(token)
    }

    /// A variable slot or a 32-bit literal.
    pub(super) fn operand(&self, token: &str, tokens: &[String]) -> Result<Operand> {
        if is_variable_token(token) {
            return self.resolve_variable(token).map(Operand::Frame);
        }
        token
            .parse::<i32>()
            .map(Operand::Imm)
            .map_err(|_| CompileError::malformed(tokens, "a variable or a 32-bit integer literal"))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Calls a host routine under the System V convention.
    ///
    /// Arguments are pushed left to right as 8-byte words, then loaded into
    /// the argument registers. `rsp` is padded to a 16-byte boundary for the
    /// call and everything is popped afterwards.
    pub(super) fn emit_call(&mut self, call: &CallStatement) -> Result<()> {
        let symbol = self.symbols.find(&call.name)?;
        if symbol.kind != SymbolKind::Function {
            return Err(CompileError::KindMismatch {
                name: call.name.clone(),
                expected: SymbolKind::Function,
            });
        }
        let address = match call.name.as_str() {
            PRINT => self.builtins.print,
            _ => return Err(CompileError::SymbolNotFound(call.name.clone())),
        };

        let count = call.arguments.len();
        if count > ARGUMENT_REGISTERS {
            return Err(CompileError::TooManyArguments {
                name: call.name.clone(),
                count,
            });
        }

        let operands = call
            .arguments
            .iter()
            .map(|arg| self.operand(arg, &call.arguments))
            .collect::<Result<Vec<_>>>()?;

        for operand in operands {
            self.code.push_argument(operand);
            self.stack_depth += LINK_SIZE;
        }
        for index in 0..count {
            // at most 5 words above the last pushed argument
            let disp = ((count - 1 - index) * LINK_SIZE) as u8;
            self.code.load_argument_register(index, disp);
        }

        // rsp sits 8 below a 16-byte boundary on entry
        let padding = (2 * 16 - LINK_SIZE - self.stack_depth % 16) % 16;
        self.code.reserve(padding as u32);
        self.code.call_absolute(address);
        self.code.release((count * LINK_SIZE + padding) as u32);
        self.stack_depth -= count * LINK_SIZE;

        trace!(name = %call.name, arguments = count, padding, "emitted call");
        Ok(())
    }
}
