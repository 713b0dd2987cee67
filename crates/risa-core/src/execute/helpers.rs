//! Pure arithmetic, comparison, and load-extension helpers.

#![allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use crate::encoding::Operation;
use crate::memory::{MemError, Memory};

/// Computes an arithmetic, logical, or shift result.
///
/// Register and immediate forms share one rule. Shifts use the low five bits
/// of `b`. Returns `None` for operations that are not ALU operations.
#[must_use]
pub const fn alu(op: Operation, a: u32, b: u32) -> Option<u32> {
    let shamt = b & 0x1F;
    let value = match op {
        Operation::Add | Operation::Addi => a.wrapping_add(b),
        Operation::Sub => a.wrapping_sub(b),
        Operation::Sll | Operation::Slli => a << shamt,
        Operation::Slt | Operation::Slti => ((a as i32) < (b as i32)) as u32,
        Operation::Sltu | Operation::Sltiu => (a < b) as u32,
        Operation::Xor | Operation::Xori => a ^ b,
        Operation::Srl | Operation::Srli => a >> shamt,
        Operation::Sra | Operation::Srai => ((a as i32) >> shamt) as u32,
        Operation::Or | Operation::Ori => a | b,
        Operation::And | Operation::Andi => a & b,
        _ => return None,
    };
    Some(value)
}

/// Evaluates a branch condition. Returns `None` for non-branch operations.
#[must_use]
pub const fn branch_taken(op: Operation, a: u32, b: u32) -> Option<bool> {
    let taken = match op {
        Operation::Beq => a == b,
        Operation::Bne => a != b,
        Operation::Blt => (a as i32) < (b as i32),
        Operation::Bge => (a as i32) >= (b as i32),
        Operation::Bltu => a < b,
        Operation::Bgeu => a >= b,
        _ => return None,
    };
    Some(taken)
}

/// Performs a load and sign- or zero-extends it to 32 bits.
///
/// Returns `Ok(None)` for operations that are not loads.
///
/// # Errors
///
/// Returns [`MemError`] when the access is out of bounds.
pub fn load(memory: &Memory, op: Operation, addr: u32) -> Result<Option<u32>, MemError> {
    let value = match op {
        Operation::Lb => memory.load_u8(addr)? as i8 as i32 as u32,
        Operation::Lh => memory.load_u16(addr)? as i16 as i32 as u32,
        Operation::Lw => memory.load_u32(addr)?,
        Operation::Lbu => u32::from(memory.load_u8(addr)?),
        Operation::Lhu => u32::from(memory.load_u16(addr)?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Stores the low 1, 2, or 4 bytes of `value`.
///
/// Returns `Ok(false)` for operations that are not stores.
///
/// # Errors
///
/// Returns [`MemError`] when the access is out of bounds.
#[allow(clippy::cast_possible_truncation)]
pub fn store(memory: &mut Memory, op: Operation, addr: u32, value: u32) -> Result<bool, MemError> {
    match op {
        Operation::Sb => memory.store_u8(addr, value as u8)?,
        Operation::Sh => memory.store_u16(addr, value as u16)?,
        Operation::Sw => memory.store_u32(addr, value)?,
        _ => return Ok(false),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{alu, branch_taken, load, store};
    use crate::encoding::Operation;
    use crate::memory::Memory;

    #[rstest]
    #[case(Operation::Add, 0xFFFF_FFFF, 1, 0)]
    #[case(Operation::Sub, 0, 1, 0xFFFF_FFFF)]
    #[case(Operation::Sll, 1, 33, 2)]
    #[case(Operation::Slli, 0x8000_0001, 1, 2)]
    #[case(Operation::Slt, 0xFFFF_FFFF, 0, 1)]
    #[case(Operation::Sltu, 0xFFFF_FFFF, 0, 0)]
    #[case(Operation::Slti, 5, 0xFFFF_FFFF, 0)]
    #[case(Operation::Sltiu, 5, 0xFFFF_FFFF, 1)]
    #[case(Operation::Xor, 0b1100, 0b1010, 0b0110)]
    #[case(Operation::Srl, 0x8000_0000, 31, 1)]
    #[case(Operation::Sra, 0x8000_0000, 31, 0xFFFF_FFFF)]
    #[case(Operation::Srai, 0xF000_0000, 36, 0xFF00_0000)]
    #[case(Operation::Or, 0xF0, 0x0F, 0xFF)]
    #[case(Operation::And, 0xF0, 0x3C, 0x30)]
    #[case(Operation::Addi, 15, 6, 21)]
    fn alu_semantics(#[case] op: Operation, #[case] a: u32, #[case] b: u32, #[case] out: u32) {
        assert_eq!(alu(op, a, b), Some(out));
    }

    #[test]
    fn alu_rejects_non_alu_operations() {
        assert_eq!(alu(Operation::Lw, 1, 2), None);
        assert_eq!(alu(Operation::Beq, 1, 2), None);
    }

    #[rstest]
    #[case(Operation::Beq, 3, 3, true)]
    #[case(Operation::Bne, 3, 3, false)]
    #[case(Operation::Blt, 0xFFFF_FFFF, 0, true)]
    #[case(Operation::Bltu, 0xFFFF_FFFF, 0, false)]
    #[case(Operation::Bge, 0, 0xFFFF_FFFF, true)]
    #[case(Operation::Bgeu, 0, 0xFFFF_FFFF, false)]
    #[case(Operation::Bge, 7, 7, true)]
    fn branch_conditions(
        #[case] op: Operation,
        #[case] a: u32,
        #[case] b: u32,
        #[case] taken: bool,
    ) {
        assert_eq!(branch_taken(op, a, b), Some(taken));
    }

    #[test]
    fn loads_extend_by_signedness() {
        let mut memory = Memory::new(8).expect("allocates");
        memory.store_u32(0, 0x0000_8080).expect("in bounds");
        assert_eq!(load(&memory, Operation::Lb, 0), Ok(Some(0xFFFF_FF80)));
        assert_eq!(load(&memory, Operation::Lbu, 0), Ok(Some(0x80)));
        assert_eq!(load(&memory, Operation::Lh, 0), Ok(Some(0xFFFF_8080)));
        assert_eq!(load(&memory, Operation::Lhu, 0), Ok(Some(0x8080)));
        assert_eq!(load(&memory, Operation::Lw, 0), Ok(Some(0x8080)));
        assert_eq!(load(&memory, Operation::Add, 0), Ok(None));
        assert!(load(&memory, Operation::Lw, 6).is_err());
    }

    #[test]
    fn stores_truncate_to_width() {
        let mut memory = Memory::new(8).expect("allocates");
        assert_eq!(store(&mut memory, Operation::Sb, 0, 0x1234_5678), Ok(true));
        assert_eq!(store(&mut memory, Operation::Sh, 2, 0x1234_5678), Ok(true));
        assert_eq!(memory.load_u32(0), Ok(0x5678_0078));
        assert_eq!(store(&mut memory, Operation::Sw, 4, 0xDEAD_BEEF), Ok(true));
        assert_eq!(memory.load_u32(4), Ok(0xDEAD_BEEF));
        assert!(store(&mut memory, Operation::Sw, 5, 0).is_err());
    }
}
