// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! x86-64 instruction encoding.
//!
//! Only the handful of forms the emitter needs. Memory operands are always
//! `[rbp + disp8]`; data operations use 32-bit registers.

/// Size of a variable slot.
pub const WORD_SIZE: usize = 4;

/// Size of a saved frame pointer.
pub const LINK_SIZE: usize = 8;

/// Bytes covered by the skip in a boolean materialization:
/// `mov eax, 1` plus `jmp rel32`.
const SKIP_TO_ZERO: i32 = 10;

/// Bytes covered by `mov eax, 0`.
const SKIP_ZERO: i32 = 5;

/// Integer argument registers, System V order.
pub const ARGUMENT_REGISTERS: usize = 6;

/// A finished or in-progress routine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MachineCode {
    bytes: Vec<u8>,
}

/// Condition codes for `jcc rel32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Condition {
    /// Equal / zero
    Equal = 0x84,
    /// Not equal / not zero
    NotEqual = 0x85,
    /// Signed less
    Less = 0x8C,
    /// Signed greater or equal
    GreaterEqual = 0x8D,
    /// Signed less or equal
    LessEqual = 0x8E,
    /// Signed greater
    Greater = 0x8F,
}

impl Condition {
    /// The condition that holds exactly when this one does not.
    pub fn inverse(self) -> Self {
        match self {
            Condition::Equal => Condition::NotEqual,
            Condition::NotEqual => Condition::Equal,
            Condition::Less => Condition::GreaterEqual,
            Condition::GreaterEqual => Condition::Less,
            Condition::LessEqual => Condition::Greater,
            Condition::Greater => Condition::LessEqual,
        }
    }
}

/// Arithmetic with `eax` as destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arith {
    /// `add`
    Add,
    /// `sub`
    Sub,
    /// `imul`
    Mul,
    /// `idiv`, quotient only
    Div,
}

/// Second operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// 32-bit immediate
    Imm(i32),
    /// `dword [rbp + disp8]`
    Frame(i8),
}

impl MachineCode {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Current size, which is also the offset of the next instruction.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn push(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    fn push_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// `push rbp; mov rbp, rsp`
    pub fn frame_prologue(&mut self) {
        self.push(&[0x55, 0x48, 0x89, 0xE5]);
    }

    /// `pop rbp`
    pub fn pop_rbp(&mut self) {
        self.push(&[0x5D]);
    }

    /// `ret`
    pub fn ret(&mut self) {
        self.push(&[0xC3]);
    }

    /// `sub rsp, bytes`
    pub fn reserve(&mut self, bytes: u32) {
        self.rsp_adjust(0xEC, bytes);
    }

    /// `add rsp, bytes`
    pub fn release(&mut self, bytes: u32) {
        self.rsp_adjust(0xC4, bytes);
    }

    fn rsp_adjust(&mut self, modrm: u8, bytes: u32) {
        if bytes == 0 {
            return;
        }
        match i8::try_from(bytes) {
            Ok(small) => self.push(&[0x48, 0x83, modrm, small as u8]),
            Err(_) => {
                self.push(&[0x48, 0x81, modrm]);
                self.push(&bytes.to_le_bytes());
            }
        }
    }

    // ========================================================================
    // Data movement
    // ========================================================================

    /// `mov eax, imm32` or `mov eax, [rbp + disp]`
    pub fn load_eax(&mut self, operand: Operand) {
        match operand {
            Operand::Imm(value) => {
                self.push(&[0xB8]);
                self.push_i32(value);
            }
            Operand::Frame(disp) => self.push(&[0x8B, 0x45, disp as u8]),
        }
    }

    /// `mov [rbp + disp], eax`
    pub fn store_eax(&mut self, disp: i8) {
        self.push(&[0x89, 0x45, disp as u8]);
    }

    /// `push imm32`, or `movsxd rax, [rbp + disp]; push rax`
    pub fn push_argument(&mut self, operand: Operand) {
        match operand {
            Operand::Imm(value) => {
                self.push(&[0x68]);
                self.push_i32(value);
            }
            Operand::Frame(disp) => self.push(&[0x48, 0x63, 0x45, disp as u8, 0x50]),
        }
    }

    /// Loads the `index`-th System V argument register from `[rsp + disp]`.
    pub fn load_argument_register(&mut self, index: usize, disp: u8) {
        // rdi, rsi, rdx, rcx, r8, r9 as (REX, ModRM) with a [rsp] SIB
        const ENCODINGS: [(u8, u8); ARGUMENT_REGISTERS] = [
            (0x48, 0x7C),
            (0x48, 0x74),
            (0x48, 0x54),
            (0x48, 0x4C),
            (0x4C, 0x44),
            (0x4C, 0x4C),
        ];
        let (rex, modrm) = ENCODINGS[index];
        self.push(&[rex, 0x8B, modrm, 0x24, disp]);
    }

    /// `mov rax, imm64; call rax`
    pub fn call_absolute(&mut self, address: u64) {
        self.push(&[0x48, 0xB8]);
        self.push(&address.to_le_bytes());
        self.push(&[0xFF, 0xD0]);
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    /// `eax = eax <op> operand`
    pub fn arith(&mut self, op: Arith, operand: Operand) {
        match (op, operand) {
            (Arith::Add, Operand::Imm(value)) => {
                self.push(&[0x05]);
                self.push_i32(value);
            }
            (Arith::Add, Operand::Frame(disp)) => self.push(&[0x03, 0x45, disp as u8]),
            (Arith::Sub, Operand::Imm(value)) => {
                self.push(&[0x2D]);
                self.push_i32(value);
            }
            (Arith::Sub, Operand::Frame(disp)) => self.push(&[0x2B, 0x45, disp as u8]),
            (Arith::Mul, Operand::Imm(value)) => {
                self.push(&[0x69, 0xC0]);
                self.push_i32(value);
            }
            (Arith::Mul, Operand::Frame(disp)) => self.push(&[0x0F, 0xAF, 0x45, disp as u8]),
            (Arith::Div, Operand::Imm(value)) => {
                // mov ecx, imm32
                self.push(&[0xB9]);
                self.push_i32(value);
                self.signed_divide_by_ecx();
            }
            (Arith::Div, Operand::Frame(disp)) => {
                // mov ecx, [rbp + disp]
                self.push(&[0x8B, 0x4D, disp as u8]);
                self.signed_divide_by_ecx();
            }
        }
    }

    /// `cdq; idiv ecx`
    fn signed_divide_by_ecx(&mut self) {
        self.push(&[0x99, 0xF7, 0xF9]);
    }

    /// `cmp eax, operand`
    pub fn compare_eax(&mut self, operand: Operand) {
        match operand {
            Operand::Imm(value) => {
                self.push(&[0x3D]);
                self.push_i32(value);
            }
            Operand::Frame(disp) => self.push(&[0x3B, 0x45, disp as u8]),
        }
    }

    /// `cmp dword [rbp + disp], 0`
    pub fn test_frame_zero(&mut self, disp: i8) {
        self.push(&[0x83, 0x7D, disp as u8, 0x00]);
    }

    /// Sets `eax` to 1 when `eax <condition> operand` holds, else 0.
    ///
    /// ```text
    ///   cmp eax, operand
    ///   j<inverse> +10
    ///   mov eax, 1
    ///   jmp +5
    ///   mov eax, 0
    /// ```
    pub fn materialize(&mut self, condition: Condition, operand: Operand) {
        self.compare_eax(operand);
        self.push(&[0x0F, condition.inverse() as u8]);
        self.push_i32(SKIP_TO_ZERO);
        self.load_eax(Operand::Imm(1));
        self.push(&[0xE9]);
        self.push_i32(SKIP_ZERO);
        self.load_eax(Operand::Imm(0));
    }

    // ========================================================================
    // Jumps
    // ========================================================================

    /// `jcc rel32` with a zero placeholder. Returns the placeholder offset.
    pub fn jump_if(&mut self, condition: Condition) -> usize {
        self.push(&[0x0F, condition as u8]);
        self.placeholder()
    }

    /// `jmp rel32` with a zero placeholder. Returns the placeholder offset.
    pub fn jump(&mut self) -> usize {
        self.push(&[0xE9]);
        self.placeholder()
    }

    fn placeholder(&mut self) -> usize {
        let at = self.bytes.len();
        self.push_i32(0);
        at
    }

    /// Points the placeholder at `at` to the byte offset `target`.
    ///
    /// The displacement counts from the end of the placeholder, which is
    /// where the processor's instruction pointer sits.
    pub fn patch_jump(&mut self, at: usize, target: usize) {
        let displacement = target as i64 - (at as i64 + 4);
        let bytes = (displacement as i32).to_le_bytes();
        self.bytes[at..at + 4].copy_from_slice(&bytes);
    }

    /// Reads back a rel32 field.
    pub fn displacement_at(&self, at: usize) -> i32 {
        let mut field = [0u8; 4];
        field.copy_from_slice(&self.bytes[at..at + 4]);
        i32::from_le_bytes(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prologue_bytes() {
        let mut code = MachineCode::new();
        code.frame_prologue();
        code.reserve(8);
        code.release(8);
        code.pop_rbp();
        code.ret();
        assert_eq!(
            code.as_bytes(),
            &[0x55, 0x48, 0x89, 0xE5, 0x48, 0x83, 0xEC, 0x08, 0x48, 0x83, 0xC4, 0x08, 0x5D, 0xC3]
        );
    }

    #[test]
    fn test_zero_reservation_emits_nothing() {
        let mut code = MachineCode::new();
        code.reserve(0);
        code.release(0);
        assert!(code.is_empty());
    }

    #[test]
    fn test_wide_reservation() {
        let mut code = MachineCode::new();
        code.reserve(256);
        assert_eq!(code.as_bytes(), &[0x48, 0x81, 0xEC, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_load_store() {
        let mut code = MachineCode::new();
        code.load_eax(Operand::Imm(-2));
        code.store_eax(-4);
        code.load_eax(Operand::Frame(12));
        assert_eq!(
            code.as_bytes(),
            &[0xB8, 0xFE, 0xFF, 0xFF, 0xFF, 0x89, 0x45, 0xFC, 0x8B, 0x45, 0x0C]
        );
    }

    #[test]
    fn test_materialize_layout() {
        let mut code = MachineCode::new();
        code.materialize(Condition::Less, Operand::Imm(3));
        let bytes = code.as_bytes();
        // cmp eax, 3
        assert_eq!(&bytes[0..5], &[0x3D, 0x03, 0x00, 0x00, 0x00]);
        // jge +10
        assert_eq!(&bytes[5..7], &[0x0F, 0x8D]);
        assert_eq!(code.displacement_at(7), 10);
        // mov eax, 1; jmp +5; mov eax, 0
        assert_eq!(&bytes[11..16], &[0xB8, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(bytes[16], 0xE9);
        assert_eq!(code.displacement_at(17), 5);
        assert_eq!(&bytes[21..26], &[0xB8, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(bytes.len(), 26);
    }

    #[test]
    fn test_inverse_conditions_pair_up() {
        for condition in [
            Condition::Equal,
            Condition::NotEqual,
            Condition::Less,
            Condition::GreaterEqual,
            Condition::LessEqual,
            Condition::Greater,
        ] {
            assert_ne!(condition.inverse(), condition);
            assert_eq!(condition.inverse().inverse(), condition);
        }
    }

    #[test]
    fn test_patch_forward_and_backward() {
        let mut code = MachineCode::new();
        let forward = code.jump();
        code.ret();
        code.patch_jump(forward, code.len());
        assert_eq!(code.displacement_at(forward), 1);

        let target = code.len();
        let backward = code.jump();
        code.patch_jump(backward, target);
        assert_eq!(code.displacement_at(backward), -5);
    }

    #[test]
    fn test_argument_registers() {
        let mut code = MachineCode::new();
        code.load_argument_register(0, 8);
        code.load_argument_register(5, 0);
        assert_eq!(
            code.as_bytes(),
            &[0x48, 0x8B, 0x7C, 0x24, 0x08, 0x4C, 0x8B, 0x4C, 0x24, 0x00]
        );
    }

    #[test]
    fn test_call_absolute() {
        let mut code = MachineCode::new();
        code.call_absolute(0x1122_3344_5566_7788);
        assert_eq!(
            code.as_bytes(),
            &[0x48, 0xB8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0xFF, 0xD0]
        );
    }
}
