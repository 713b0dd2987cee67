/// Number of general-purpose registers (`x0..x31`).
pub const GENERAL_REGISTER_COUNT: usize = 32;
/// Index of the return-address register `ra`.
pub const RA: u8 = 1;
/// Index of the stack-pointer register `sp`.
pub const SP: u8 = 2;
/// Index of the first argument/return register `a0`.
pub const A0: u8 = 10;
/// Index of the second argument register `a1`.
pub const A1: u8 = 11;
/// Index of the third argument register `a2`.
pub const A2: u8 = 12;
/// Index of the system-call number register `a7`.
pub const A7: u8 = 17;

/// ABI names for `x0..x31`, in index order.
pub const ABI_NAMES: [&str; GENERAL_REGISTER_COUNT] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// Returns the ABI name of a register index, or `None` past `x31`.
#[must_use]
pub fn abi_name(index: u8) -> Option<&'static str> {
    ABI_NAMES.get(usize::from(index)).copied()
}

/// Resolves an ABI name (`"sp"`, `"fp"`) or numeric name (`"x2"`) to an index.
#[must_use]
pub fn register_index(name: &str) -> Option<u8> {
    if name == "fp" {
        return Some(8);
    }
    if let Some(position) = ABI_NAMES.iter().position(|candidate| *candidate == name) {
        return u8::try_from(position).ok();
    }
    let index: u8 = name.strip_prefix('x')?.parse().ok()?;
    (usize::from(index) < GENERAL_REGISTER_COUNT).then_some(index)
}

/// The 32 general-purpose registers.
///
/// Writes to `x0` are stored like any other; the engine zeroes it at retire,
/// so a handler or instruction may observe a non-zero `x0` mid-cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    regs: [u32; GENERAL_REGISTER_COUNT],
}

impl RegisterFile {
    /// Reads a register. Only the low five bits of `index` are used.
    #[must_use]
    pub const fn get(&self, index: u8) -> u32 {
        self.regs[(index & 0x1F) as usize]
    }

    /// Writes a register. Only the low five bits of `index` are used.
    pub const fn set(&mut self, index: u8, value: u32) {
        self.regs[(index & 0x1F) as usize] = value;
    }

    /// Forces `x0` back to zero.
    pub const fn clear_zero(&mut self) {
        self.regs[0] = 0;
    }

    /// All registers in index order.
    #[must_use]
    pub const fn as_array(&self) -> &[u32; GENERAL_REGISTER_COUNT] {
        &self.regs
    }
}
