/// Major opcode for register-immediate loads.
pub const OPCODE_LOAD: u8 = 0x03;
/// Major opcode for memory ordering fences.
pub const OPCODE_MISC_MEM: u8 = 0x0F;
/// Major opcode for register-immediate arithmetic.
pub const OPCODE_OP_IMM: u8 = 0x13;
/// Major opcode for `AUIPC`.
pub const OPCODE_AUIPC: u8 = 0x17;
/// Major opcode for stores.
pub const OPCODE_STORE: u8 = 0x23;
/// Major opcode for register-register arithmetic.
pub const OPCODE_OP: u8 = 0x33;
/// Major opcode for `LUI`.
pub const OPCODE_LUI: u8 = 0x37;
/// Major opcode for conditional branches.
pub const OPCODE_BRANCH: u8 = 0x63;
/// Major opcode for `JALR`.
pub const OPCODE_JALR: u8 = 0x67;
/// Major opcode for `JAL`.
pub const OPCODE_JAL: u8 = 0x6F;
/// Major opcode for environment calls and breakpoints.
pub const OPCODE_SYSTEM: u8 = 0x73;

/// Instruction-word layouts selected by the low seven opcode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum InstructionFormat {
    /// R-type: `rd, rs1, rs2, funct3, funct7`.
    RegReg,
    /// I-type: `rd, rs1, funct3, imm[11:0]`.
    Imm,
    /// S-type: `rs1, rs2, funct3, imm[11:5|4:0]`.
    Store,
    /// B-type: `rs1, rs2, funct3, imm[12|10:5|4:1|11]`.
    Branch,
    /// U-type: `rd, imm[31:12]`.
    Upper,
    /// J-type: `rd, imm[20|10:1|11|19:12]`.
    Jump,
    /// No base-integer instruction uses this opcode.
    Undefined,
}

const fn build_format_table() -> [InstructionFormat; 128] {
    let mut table = [InstructionFormat::Undefined; 128];
    table[OPCODE_LOAD as usize] = InstructionFormat::Imm;
    table[OPCODE_MISC_MEM as usize] = InstructionFormat::Imm;
    table[OPCODE_OP_IMM as usize] = InstructionFormat::Imm;
    table[OPCODE_AUIPC as usize] = InstructionFormat::Upper;
    table[OPCODE_STORE as usize] = InstructionFormat::Store;
    table[OPCODE_OP as usize] = InstructionFormat::RegReg;
    table[OPCODE_LUI as usize] = InstructionFormat::Upper;
    table[OPCODE_BRANCH as usize] = InstructionFormat::Branch;
    table[OPCODE_JALR as usize] = InstructionFormat::Imm;
    table[OPCODE_JAL as usize] = InstructionFormat::Jump;
    table[OPCODE_SYSTEM as usize] = InstructionFormat::Imm;
    table
}

/// Opcode-to-format table, indexed by the low seven bits of an instruction word.
pub static FORMAT_TABLE: [InstructionFormat; 128] = build_format_table();

/// Returns the instruction format for a 7-bit opcode.
///
/// Bits above the low seven are ignored.
#[must_use]
pub fn format_of(opcode: u8) -> InstructionFormat {
    FORMAT_TABLE[usize::from(opcode & 0x7F)]
}

/// Every operation of the base integer instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum Operation {
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Jalr,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Fence,
    Ecall,
    Ebreak,
    Sb,
    Sh,
    Sw,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lui,
    Auipc,
    Jal,
}

impl Operation {
    /// Lower-case assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Slli => "slli",
            Self::Srli => "srli",
            Self::Srai => "srai",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Sll => "sll",
            Self::Slt => "slt",
            Self::Sltu => "sltu",
            Self::Xor => "xor",
            Self::Srl => "srl",
            Self::Sra => "sra",
            Self::Or => "or",
            Self::And => "and",
            Self::Jalr => "jalr",
            Self::Lb => "lb",
            Self::Lh => "lh",
            Self::Lw => "lw",
            Self::Lbu => "lbu",
            Self::Lhu => "lhu",
            Self::Addi => "addi",
            Self::Slti => "slti",
            Self::Sltiu => "sltiu",
            Self::Xori => "xori",
            Self::Ori => "ori",
            Self::Andi => "andi",
            Self::Fence => "fence",
            Self::Ecall => "ecall",
            Self::Ebreak => "ebreak",
            Self::Sb => "sb",
            Self::Sh => "sh",
            Self::Sw => "sw",
            Self::Beq => "beq",
            Self::Bne => "bne",
            Self::Blt => "blt",
            Self::Bge => "bge",
            Self::Bltu => "bltu",
            Self::Bgeu => "bgeu",
            Self::Lui => "lui",
            Self::Auipc => "auipc",
            Self::Jal => "jal",
        }
    }
}

/// Register-register table keyed by `(funct7, funct3, opcode)`.
///
/// The shift-by-immediate forms share this key space: their `funct7` is the
/// upper seven immediate bits and their shift amount sits in the `rs2` slot.
pub const REG_REG_TABLE: &[(u8, u8, u8, Operation)] = &[
    (0x00, 0x1, OPCODE_OP_IMM, Operation::Slli),
    (0x00, 0x5, OPCODE_OP_IMM, Operation::Srli),
    (0x20, 0x5, OPCODE_OP_IMM, Operation::Srai),
    (0x00, 0x0, OPCODE_OP, Operation::Add),
    (0x20, 0x0, OPCODE_OP, Operation::Sub),
    (0x00, 0x1, OPCODE_OP, Operation::Sll),
    (0x00, 0x2, OPCODE_OP, Operation::Slt),
    (0x00, 0x3, OPCODE_OP, Operation::Sltu),
    (0x00, 0x4, OPCODE_OP, Operation::Xor),
    (0x00, 0x5, OPCODE_OP, Operation::Srl),
    (0x20, 0x5, OPCODE_OP, Operation::Sra),
    (0x00, 0x6, OPCODE_OP, Operation::Or),
    (0x00, 0x7, OPCODE_OP, Operation::And),
];

/// Immediate-format table keyed by `(funct3, opcode)`.
pub const IMM_TABLE: &[(u8, u8, Operation)] = &[
    (0x0, OPCODE_JALR, Operation::Jalr),
    (0x0, OPCODE_LOAD, Operation::Lb),
    (0x1, OPCODE_LOAD, Operation::Lh),
    (0x2, OPCODE_LOAD, Operation::Lw),
    (0x4, OPCODE_LOAD, Operation::Lbu),
    (0x5, OPCODE_LOAD, Operation::Lhu),
    (0x0, OPCODE_OP_IMM, Operation::Addi),
    (0x2, OPCODE_OP_IMM, Operation::Slti),
    (0x3, OPCODE_OP_IMM, Operation::Sltiu),
    (0x4, OPCODE_OP_IMM, Operation::Xori),
    (0x6, OPCODE_OP_IMM, Operation::Ori),
    (0x7, OPCODE_OP_IMM, Operation::Andi),
    (0x0, OPCODE_MISC_MEM, Operation::Fence),
];

/// Environment table keyed by `(imm[11:0], funct3, opcode)`.
pub const ENV_TABLE: &[(u16, u8, u8, Operation)] = &[
    (0x000, 0x0, OPCODE_SYSTEM, Operation::Ecall),
    (0x001, 0x0, OPCODE_SYSTEM, Operation::Ebreak),
];

/// Store table keyed by `(funct3, opcode)`.
pub const STORE_TABLE: &[(u8, u8, Operation)] = &[
    (0x0, OPCODE_STORE, Operation::Sb),
    (0x1, OPCODE_STORE, Operation::Sh),
    (0x2, OPCODE_STORE, Operation::Sw),
];

/// Branch table keyed by `(funct3, opcode)`.
pub const BRANCH_TABLE: &[(u8, u8, Operation)] = &[
    (0x0, OPCODE_BRANCH, Operation::Beq),
    (0x1, OPCODE_BRANCH, Operation::Bne),
    (0x4, OPCODE_BRANCH, Operation::Blt),
    (0x5, OPCODE_BRANCH, Operation::Bge),
    (0x6, OPCODE_BRANCH, Operation::Bltu),
    (0x7, OPCODE_BRANCH, Operation::Bgeu),
];

/// Upper-immediate and jump table keyed by opcode alone.
pub const OPCODE_ONLY_TABLE: &[(u8, Operation)] = &[
    (OPCODE_LUI, Operation::Lui),
    (OPCODE_AUIPC, Operation::Auipc),
    (OPCODE_JAL, Operation::Jal),
];

/// Looks up a register-register (or shift-immediate) operation.
#[must_use]
pub fn classify_reg_reg(funct7: u8, funct3: u8, opcode: u8) -> Option<Operation> {
    REG_REG_TABLE.iter().find_map(|(f7, f3, op, operation)| {
        (*f7 == funct7 && *f3 == funct3 && *op == opcode).then_some(*operation)
    })
}

/// Looks up an immediate-format operation, re-keying on the full 12-bit
/// immediate for the environment opcode and on `funct7` for shift-immediates.
#[must_use]
pub fn classify_imm(imm12: u16, funct3: u8, opcode: u8) -> Option<Operation> {
    if let Some(operation) = lookup_funct3(IMM_TABLE, funct3, opcode) {
        return Some(operation);
    }

    if opcode == OPCODE_OP_IMM {
        let funct7 = ((imm12 >> 5) & 0x7F) as u8;
        return classify_reg_reg(funct7, funct3, opcode);
    }

    let imm12 = imm12 & 0x0FFF;
    ENV_TABLE.iter().find_map(|(imm, f3, op, operation)| {
        (*imm == imm12 && *f3 == funct3 && *op == opcode).then_some(*operation)
    })
}

/// Looks up a store operation.
#[must_use]
pub fn classify_store(funct3: u8, opcode: u8) -> Option<Operation> {
    lookup_funct3(STORE_TABLE, funct3, opcode)
}

/// Looks up a branch operation.
#[must_use]
pub fn classify_branch(funct3: u8, opcode: u8) -> Option<Operation> {
    lookup_funct3(BRANCH_TABLE, funct3, opcode)
}

/// Looks up an upper-immediate or jump operation by opcode alone.
#[must_use]
pub fn classify_opcode_only(opcode: u8) -> Option<Operation> {
    OPCODE_ONLY_TABLE
        .iter()
        .find_map(|(op, operation)| (*op == opcode).then_some(*operation))
}

fn lookup_funct3(table: &[(u8, u8, Operation)], funct3: u8, opcode: u8) -> Option<Operation> {
    table.iter().find_map(|(f3, op, operation)| {
        (*f3 == funct3 && *op == opcode).then_some(*operation)
    })
}
