//! Textual disassembly, used by trace output and the debug front end.

use std::fmt;

use crate::decoder::{decode, DecodedInstruction};
use crate::encoding::{InstructionFormat, Operation};

/// A disassembled instruction word.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Disassembly {
    /// Lower-case mnemonic, or `.word` for words that do not decode.
    pub mnemonic: String,
    /// Comma-separated operands, possibly empty.
    pub operands: String,
}

impl fmt::Display for Disassembly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            f.write_str(&self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Disassembles one instruction word.
#[must_use]
pub fn disassemble(word: u32) -> Disassembly {
    let Some((instruction, operation)) = decode(word)
        .ok()
        .and_then(|i| i.operation().ok().map(|op| (i, op)))
    else {
        return Disassembly {
            mnemonic: ".word".to_string(),
            operands: format!("{word:#010x}"),
        };
    };

    Disassembly {
        mnemonic: operation.mnemonic().to_string(),
        operands: format_operands(instruction, operation),
    }
}

#[allow(clippy::cast_sign_loss)]
fn format_operands(instruction: DecodedInstruction, operation: Operation) -> String {
    let f = instruction.fields;
    let imm = instruction.immediate;
    match instruction.format {
        InstructionFormat::RegReg => format!("x{}, x{}, x{}", f.rd, f.rs1, f.rs2),
        InstructionFormat::Imm => match operation {
            Operation::Ecall | Operation::Ebreak | Operation::Fence => String::new(),
            Operation::Slli | Operation::Srli | Operation::Srai => {
                format!("x{}, x{}, {}", f.rd, f.rs1, instruction.shamt())
            }
            Operation::Lb
            | Operation::Lh
            | Operation::Lw
            | Operation::Lbu
            | Operation::Lhu
            | Operation::Jalr => format!("x{}, {imm}(x{})", f.rd, f.rs1),
            _ => format!("x{}, x{}, {imm}", f.rd, f.rs1),
        },
        InstructionFormat::Store => format!("x{}, {imm}(x{})", f.rs2, f.rs1),
        InstructionFormat::Branch => format!("x{}, x{}, {imm}", f.rs1, f.rs2),
        InstructionFormat::Upper => format!("x{}, {:#x}", f.rd, (imm as u32) >> 12),
        InstructionFormat::Jump => format!("x{}, {imm}", f.rd),
        InstructionFormat::Undefined => String::new(),
    }
}
