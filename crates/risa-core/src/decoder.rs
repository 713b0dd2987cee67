//! Field decoder for 32-bit base-integer instruction words.
//!
//! Fields are pulled out with explicit shifts and masks on a plain `u32`.
//! Decoding never looks at operation tables; it only resolves the format and
//! assembles the immediate. Operation lookup happens in
//! [`DecodedInstruction::operation`], so an unmapped opcode and an unmapped
//! funct combination fault at different points but with the same code.

use crate::encoding::{
    classify_branch, classify_imm, classify_opcode_only, classify_reg_reg, classify_store,
    format_of, InstructionFormat, Operation,
};
use crate::fault::FaultCode;

/// Raw register and function-select fields of an instruction word.
///
/// Fields the format does not carry are left at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedFields {
    /// Bits `[6:0]`.
    pub opcode: u8,
    /// Bits `[11:7]`.
    pub rd: u8,
    /// Bits `[19:15]`.
    pub rs1: u8,
    /// Bits `[24:20]`.
    pub rs2: u8,
    /// Bits `[14:12]`.
    pub funct3: u8,
    /// Bits `[31:25]`.
    pub funct7: u8,
}

/// A decoded instruction word: its format, fields, and resolved immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DecodedInstruction {
    /// Format selected by the opcode.
    pub format: InstructionFormat,
    /// Extracted fields.
    pub fields: DecodedFields,
    /// Sign-extended immediate. Zero for register-register words.
    pub immediate: i32,
}

impl DecodedInstruction {
    /// Low 12 immediate bits, as used by the environment re-key.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub const fn imm12(self) -> u16 {
        (self.immediate as u32 & 0x0FFF) as u16
    }

    /// Shift amount for shift-immediate words.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn shamt(self) -> u32 {
        self.immediate as u32 & 0x1F
    }

    /// Resolves the operation from the composite funct/opcode key.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::IllegalSequence`] when no operation matches.
    pub fn operation(self) -> Result<Operation, FaultCode> {
        let DecodedFields {
            opcode,
            funct3,
            funct7,
            ..
        } = self.fields;

        let operation = match self.format {
            InstructionFormat::RegReg => classify_reg_reg(funct7, funct3, opcode),
            InstructionFormat::Imm => classify_imm(self.imm12(), funct3, opcode),
            InstructionFormat::Store => classify_store(funct3, opcode),
            InstructionFormat::Branch => classify_branch(funct3, opcode),
            InstructionFormat::Upper | InstructionFormat::Jump => classify_opcode_only(opcode),
            InstructionFormat::Undefined => None,
        };

        operation.ok_or(FaultCode::IllegalSequence)
    }

    /// Re-assembles a 32-bit word from the fields and immediate.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn encode(self) -> u32 {
        let f = self.fields;
        let imm = self.immediate;
        match self.format {
            InstructionFormat::RegReg => encode_r(f.opcode, f.rd, f.funct3, f.rs1, f.rs2, f.funct7),
            InstructionFormat::Imm => encode_i(f.opcode, f.rd, f.funct3, f.rs1, imm),
            InstructionFormat::Store => encode_s(f.opcode, f.funct3, f.rs1, f.rs2, imm),
            InstructionFormat::Branch => encode_b(f.opcode, f.funct3, f.rs1, f.rs2, imm),
            InstructionFormat::Upper => encode_u(f.opcode, f.rd, imm),
            InstructionFormat::Jump => encode_j(f.opcode, f.rd, imm),
            InstructionFormat::Undefined => f.opcode as u32 & 0x7F,
        }
    }
}

const fn bits(word: u32, hi: u32, lo: u32) -> u32 {
    (word >> lo) & ((1 << (hi - lo + 1)) - 1)
}

#[allow(clippy::cast_possible_truncation)]
const fn field(word: u32, hi: u32, lo: u32) -> u8 {
    bits(word, hi, lo) as u8
}

/// Sign-extends the low `width` bits of `value`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub const fn sign_extend(value: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}

/// Decodes an instruction word.
///
/// # Errors
///
/// Returns [`FaultCode::IllegalSequence`] when the opcode maps to no format.
#[allow(clippy::cast_possible_wrap)]
pub fn decode(word: u32) -> Result<DecodedInstruction, FaultCode> {
    let opcode = field(word, 6, 0);
    let format = format_of(opcode);

    let rd = field(word, 11, 7);
    let rs1 = field(word, 19, 15);
    let rs2 = field(word, 24, 20);
    let funct3 = field(word, 14, 12);
    let funct7 = field(word, 31, 25);

    let (fields, immediate) = match format {
        InstructionFormat::Undefined => return Err(FaultCode::IllegalSequence),
        InstructionFormat::RegReg => (
            DecodedFields {
                opcode,
                rd,
                rs1,
                rs2,
                funct3,
                funct7,
            },
            0,
        ),
        InstructionFormat::Imm => (
            DecodedFields {
                opcode,
                rd,
                rs1,
                funct3,
                ..DecodedFields::default()
            },
            sign_extend(bits(word, 31, 20), 12),
        ),
        InstructionFormat::Store => (
            DecodedFields {
                opcode,
                rs1,
                rs2,
                funct3,
                ..DecodedFields::default()
            },
            sign_extend((bits(word, 31, 25) << 5) | bits(word, 11, 7), 12),
        ),
        InstructionFormat::Branch => {
            let raw = (bits(word, 31, 31) << 12)
                | (bits(word, 7, 7) << 11)
                | (bits(word, 30, 25) << 5)
                | (bits(word, 11, 8) << 1);
            (
                DecodedFields {
                    opcode,
                    rs1,
                    rs2,
                    funct3,
                    ..DecodedFields::default()
                },
                sign_extend(raw, 13),
            )
        }
        InstructionFormat::Upper => (
            DecodedFields {
                opcode,
                rd,
                ..DecodedFields::default()
            },
            (word & 0xFFFF_F000) as i32,
        ),
        InstructionFormat::Jump => {
            let raw = (bits(word, 31, 31) << 20)
                | (bits(word, 19, 12) << 12)
                | (bits(word, 20, 20) << 11)
                | (bits(word, 30, 21) << 1);
            (
                DecodedFields {
                    opcode,
                    rd,
                    ..DecodedFields::default()
                },
                sign_extend(raw, 21),
            )
        }
    };

    Ok(DecodedInstruction {
        format,
        fields,
        immediate,
    })
}

const fn reg(index: u8) -> u32 {
    (index & 0x1F) as u32
}

const fn low7(value: u8) -> u32 {
    (value & 0x7F) as u32
}

const fn low3(value: u8) -> u32 {
    (value & 0x07) as u32
}

/// Assembles a register-register word.
#[must_use]
pub const fn encode_r(opcode: u8, rd: u8, funct3: u8, rs1: u8, rs2: u8, funct7: u8) -> u32 {
    (low7(funct7) << 25)
        | (reg(rs2) << 20)
        | (reg(rs1) << 15)
        | (low3(funct3) << 12)
        | (reg(rd) << 7)
        | low7(opcode)
}

/// Assembles an immediate word. Only the low 12 immediate bits are kept.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_i(opcode: u8, rd: u8, funct3: u8, rs1: u8, imm: i32) -> u32 {
    ((imm as u32 & 0x0FFF) << 20)
        | (reg(rs1) << 15)
        | (low3(funct3) << 12)
        | (reg(rd) << 7)
        | low7(opcode)
}

/// Assembles a store word.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_s(opcode: u8, funct3: u8, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    (bits(imm, 11, 5) << 25)
        | (reg(rs2) << 20)
        | (reg(rs1) << 15)
        | (low3(funct3) << 12)
        | (bits(imm, 4, 0) << 7)
        | low7(opcode)
}

/// Assembles a branch word. Bit 0 of the offset is dropped.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_b(opcode: u8, funct3: u8, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    (bits(imm, 12, 12) << 31)
        | (bits(imm, 10, 5) << 25)
        | (reg(rs2) << 20)
        | (reg(rs1) << 15)
        | (low3(funct3) << 12)
        | (bits(imm, 4, 1) << 8)
        | (bits(imm, 11, 11) << 7)
        | low7(opcode)
}

/// Assembles an upper-immediate word. The low 12 immediate bits are dropped.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_u(opcode: u8, rd: u8, imm: i32) -> u32 {
    (imm as u32 & 0xFFFF_F000) | (reg(rd) << 7) | low7(opcode)
}

/// Assembles a jump word. Bit 0 of the offset is dropped.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub const fn encode_j(opcode: u8, rd: u8, imm: i32) -> u32 {
    let imm = imm as u32;
    (bits(imm, 20, 20) << 31)
        | (bits(imm, 10, 1) << 21)
        | (bits(imm, 11, 11) << 20)
        | (bits(imm, 19, 12) << 12)
        | (reg(rd) << 7)
        | low7(opcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_addi_fields_and_immediate() {
        let decoded = decode(0x00F0_0313).expect("addi decodes");
        assert_eq!(decoded.format, InstructionFormat::Imm);
        assert_eq!(
            decoded.fields,
            DecodedFields {
                opcode: 0x13,
                rd: 6,
                rs1: 0,
                rs2: 0,
                funct3: 0,
                funct7: 0,
            }
        );
        assert_eq!(decoded.immediate, 15);
        assert_eq!(decoded.operation(), Ok(Operation::Addi));
    }

    #[test]
    fn decodes_add_register_fields() {
        let decoded = decode(0x0063_8433).expect("add decodes");
        assert_eq!(decoded.format, InstructionFormat::RegReg);
        assert_eq!(decoded.fields.rd, 8);
        assert_eq!(decoded.fields.rs1, 7);
        assert_eq!(decoded.fields.rs2, 6);
        assert_eq!(decoded.immediate, 0);
        assert_eq!(decoded.operation(), Ok(Operation::Add));
    }

    #[test]
    fn negative_imm_is_sign_extended() {
        // addi x1, x1, -1
        let decoded = decode(0xFFF0_8093).expect("addi decodes");
        assert_eq!(decoded.immediate, -1);
        assert_eq!(decoded.imm12(), 0x0FFF);
    }

    #[test]
    fn store_immediate_joins_both_fragments() {
        // sw x2, 8(x1)
        let decoded = decode(0x0020_A423).expect("sw decodes");
        assert_eq!(decoded.format, InstructionFormat::Store);
        assert_eq!(decoded.fields.rs1, 1);
        assert_eq!(decoded.fields.rs2, 2);
        assert_eq!(decoded.fields.rd, 0);
        assert_eq!(decoded.immediate, 8);
        assert_eq!(decoded.operation(), Ok(Operation::Sw));

        // sw x5, -20(x3)
        let word = encode_s(0x23, 2, 3, 5, -20);
        assert_eq!(decode(word).expect("sw decodes").immediate, -20);
    }

    #[test]
    fn backward_branch_offset_is_negative() {
        // beq x0, x0, -4
        let decoded = decode(0xFE00_0EE3).expect("beq decodes");
        assert_eq!(decoded.format, InstructionFormat::Branch);
        assert_eq!(decoded.immediate, -4);
        assert_eq!(decoded.operation(), Ok(Operation::Beq));
    }

    #[test]
    fn jump_offsets_reassemble_scrambled_bits() {
        // jal x0, -8
        assert_eq!(decode(0xFF9F_F06F).expect("jal decodes").immediate, -8);
        // jal ra, 2048 sets only imm[11], which lives in bit 20
        let decoded = decode(0x0010_00EF).expect("jal decodes");
        assert_eq!(decoded.immediate, 2048);
        assert_eq!(decoded.fields.rd, 1);
    }

    #[test]
    fn upper_immediate_keeps_high_bits() {
        // lui x5, 0x12345
        let decoded = decode(0x1234_52B7).expect("lui decodes");
        assert_eq!(decoded.format, InstructionFormat::Upper);
        assert_eq!(decoded.fields.rd, 5);
        assert_eq!(decoded.immediate, 0x1234_5000);

        let decoded = decode(encode_u(0x17, 1, 0xFFFF_F000_u32 as i32)).expect("auipc decodes");
        assert_eq!(decoded.immediate, -4096);
        assert_eq!(decoded.operation(), Ok(Operation::Auipc));
    }

    #[test]
    fn undefined_opcode_is_illegal_sequence() {
        assert_eq!(decode(0xAAAA_AAAA), Err(FaultCode::IllegalSequence));
        assert_eq!(decode(0x0000_0000), Err(FaultCode::IllegalSequence));
        assert_eq!(decode(0xFFFF_FFFF), Err(FaultCode::IllegalSequence));
    }

    #[test]
    fn unknown_funct_combination_fails_at_operation_lookup() {
        // opcode 0x33, funct7 0x01 (multiply extension)
        let decoded = decode(encode_r(0x33, 1, 0, 2, 3, 0x01)).expect("format decodes");
        assert_eq!(decoded.operation(), Err(FaultCode::IllegalSequence));
    }

    #[test]
    fn shift_immediate_resolves_through_upper_bits() {
        // srai x1, x2, 3
        let decoded = decode(encode_i(0x13, 1, 5, 2, 0x403)).expect("srai decodes");
        assert_eq!(decoded.operation(), Ok(Operation::Srai));
        assert_eq!(decoded.shamt(), 3);
    }

    #[test]
    fn environment_words_rekey_on_immediate() {
        assert_eq!(
            decode(0x0000_0073).and_then(DecodedInstruction::operation),
            Ok(Operation::Ecall)
        );
        assert_eq!(
            decode(0x0010_0073).and_then(DecodedInstruction::operation),
            Ok(Operation::Ebreak)
        );
        // csrrw shares the opcode but not funct3
        assert_eq!(
            decode(0x3402_1073).and_then(DecodedInstruction::operation),
            Err(FaultCode::IllegalSequence)
        );
    }

    #[test]
    fn encode_reproduces_reference_words() {
        for word in [
            0x00F0_0313,
            0x0063_0393,
            0x0063_8433,
            0x0020_A423,
            0xFE00_0EE3,
            0xFF9F_F06F,
            0x1234_52B7,
            0x0000_0073,
        ] {
            assert_eq!(decode(word).expect("decodes").encode(), word, "{word:#010x}");
        }
    }

    #[test]
    fn sign_extend_handles_every_width_boundary() {
        assert_eq!(sign_extend(0x7FF, 12), 2047);
        assert_eq!(sign_extend(0x800, 12), -2048);
        assert_eq!(sign_extend(0x1000, 13), -4096);
        assert_eq!(sign_extend(0x0F_FFFF, 21), 0x0F_FFFF);
        assert_eq!(sign_extend(0x10_0000, 21), -0x10_0000);
    }
}
