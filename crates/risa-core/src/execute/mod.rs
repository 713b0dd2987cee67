//! Execute stage: applies one decoded instruction to a hart.
//!
//! Explicit `pc` writes subtract four so that the unconditional advance at
//! retire lands on the real target. Handler capabilities are not invoked
//! here; the returned [`Effect`] tells the engine which one is due.

#![allow(clippy::cast_sign_loss)]

mod helpers;

pub use helpers::{alu, branch_taken, load, store};

use crate::decoder::DecodedInstruction;
use crate::encoding::{InstructionFormat, Operation};
use crate::fault::FaultCode;
use crate::hart::{EnvOp, Hart};

/// Handler capability an executed instruction asks the engine to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Nothing to invoke.
    None,
    /// A store completed; invoke the MMIO capability.
    Mmio,
    /// An environment sub-operation ran; invoke the environment capability.
    Environment(EnvOp),
}

/// Executes `instruction` against `hart`.
///
/// # Errors
///
/// Returns [`FaultCode::IllegalSequence`] when no operation matches the
/// funct/opcode key and [`FaultCode::AddressFault`] when a load or store is
/// out of bounds. A faulting instruction leaves registers unchanged.
pub fn execute(hart: &mut Hart, instruction: DecodedInstruction) -> Result<Effect, FaultCode> {
    let op = instruction.operation()?;
    let fields = instruction.fields;
    let imm = instruction.immediate as u32;
    let pc = hart.pc();
    let rs1 = hart.reg(fields.rs1);
    let rs2 = hart.reg(fields.rs2);

    match instruction.format {
        InstructionFormat::RegReg => {
            let value = alu(op, rs1, rs2).ok_or(FaultCode::IllegalSequence)?;
            hart.set_reg(fields.rd, value);
        }
        InstructionFormat::Imm => {
            let target = rs1.wrapping_add(imm);
            hart.set_target_address(target);
            return execute_imm(hart, instruction, op, rs1, target);
        }
        InstructionFormat::Store => {
            let target = rs1.wrapping_add(imm);
            hart.set_target_address(target);
            if !store(hart.memory_mut(), op, target, rs2)? {
                return Err(FaultCode::IllegalSequence);
            }
            return Ok(Effect::Mmio);
        }
        InstructionFormat::Branch => {
            if branch_taken(op, rs1, rs2).ok_or(FaultCode::IllegalSequence)? {
                hart.set_pc(pc.wrapping_add(imm).wrapping_sub(4));
            }
        }
        InstructionFormat::Upper => {
            let value = match op {
                Operation::Lui => imm,
                Operation::Auipc => pc.wrapping_add(imm),
                _ => return Err(FaultCode::IllegalSequence),
            };
            hart.set_reg(fields.rd, value);
        }
        InstructionFormat::Jump => {
            hart.set_reg(fields.rd, pc.wrapping_add(4));
            hart.set_pc(pc.wrapping_add(imm).wrapping_sub(4));
        }
        InstructionFormat::Undefined => return Err(FaultCode::IllegalSequence),
    }

    Ok(Effect::None)
}

fn execute_imm(
    hart: &mut Hart,
    instruction: DecodedInstruction,
    op: Operation,
    rs1: u32,
    target: u32,
) -> Result<Effect, FaultCode> {
    let rd = instruction.fields.rd;
    let imm = instruction.immediate as u32;
    let env = match op {
        Operation::Ecall => Some(EnvOp::Ecall),
        Operation::Ebreak => Some(EnvOp::Ebreak),
        Operation::Fence => Some(EnvOp::Fence),
        _ => None,
    };
    if let Some(env) = env {
        hart.set_last_env_op(env);
        return Ok(Effect::Environment(env));
    }

    let value = match op {
        Operation::Jalr => {
            let link = hart.pc().wrapping_add(4);
            hart.set_pc((target & !1).wrapping_sub(4));
            link
        }
        Operation::Slli | Operation::Srli | Operation::Srai => {
            alu(op, rs1, instruction.shamt()).ok_or(FaultCode::IllegalSequence)?
        }
        _ => match load(hart.memory(), op, target)? {
            Some(value) => value,
            None => alu(op, rs1, imm).ok_or(FaultCode::IllegalSequence)?,
        },
    };
    hart.set_reg(rd, value);
    Ok(Effect::None)
}
