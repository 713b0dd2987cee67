//! The simulated processor: registers, program counter, cycle counter, and
//! the memory it owns.

use tracing::info;

use crate::api::HartConfig;
use crate::debug::RegisterSnapshot;
use crate::fault::SetupError;
use crate::memory::{MemError, Memory};
use crate::state::registers::SP;
use crate::state::RegisterFile;

/// Environment sub-operation that invoked the environment-call capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EnvOp {
    /// `ecall`: a request to the execution environment.
    Ecall,
    /// `ebreak`: a request to the debugger.
    Ebreak,
    /// `fence`: a memory-ordering hint.
    Fence,
}

/// One hart and its memory.
#[derive(Debug, Clone)]
pub struct Hart {
    regs: RegisterFile,
    pc: u32,
    cycles: u64,
    target_address: u32,
    last_env_op: Option<EnvOp>,
    memory: Memory,
    config: HartConfig,
    stop_requested: bool,
}

impl Hart {
    /// Validates `config` and allocates zeroed memory.
    ///
    /// `pc` starts at zero and `sp` at the top of memory.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidConfiguration`] for a rejected config and
    /// [`SetupError::OutOfMemory`] when the buffer cannot be allocated.
    pub fn new(config: HartConfig) -> Result<Self, SetupError> {
        config.validate()?;
        let top = u32::try_from(config.mem_size).map_err(|_| {
            SetupError::InvalidConfiguration("memory size must fit a 32-bit address space")
        })?;
        let memory = Memory::new(config.mem_size)?;
        info!(
            mem_size = config.mem_size,
            interrupt_period = config.interrupt_period,
            timeout = ?config.timeout,
            "hart allocated"
        );

        let mut regs = RegisterFile::default();
        regs.set(SP, top);

        Ok(Self {
            regs,
            pc: 0,
            cycles: 0,
            target_address: 0,
            last_env_op: None,
            memory,
            config,
            stop_requested: false,
        })
    }

    /// Reads register `x{index}`.
    #[must_use]
    pub const fn reg(&self, index: u8) -> u32 {
        self.regs.get(index)
    }

    /// Writes register `x{index}`. A write to `x0` is undone at retire.
    pub const fn set_reg(&mut self, index: u8, value: u32) {
        self.regs.set(index, value);
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.pc
    }

    /// Overwrites the program counter.
    pub const fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// Cycles retired so far.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Effective address computed by the most recent immediate-format or
    /// store instruction.
    #[must_use]
    pub const fn target_address(&self) -> u32 {
        self.target_address
    }

    /// Sub-operation of the most recent environment-call capability invocation.
    #[must_use]
    pub const fn last_env_op(&self) -> Option<EnvOp> {
        self.last_env_op
    }

    /// Owned memory.
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Owned memory, mutably.
    #[must_use]
    pub const fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Configuration the hart was built from.
    #[must_use]
    pub const fn config(&self) -> &HartConfig {
        &self.config
    }

    /// Configured memory size in bytes.
    #[must_use]
    pub const fn mem_size(&self) -> usize {
        self.config.mem_size
    }

    /// Asks the engine to stop successfully at the next retire.
    pub const fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub const fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// `x0..x31` followed by `pc`.
    #[must_use]
    pub fn register_snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot::new(self.regs.as_array(), self.pc)
    }

    /// Reads one byte for a debugger.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when `addr` is out of bounds.
    pub fn peek_byte(&self, addr: u32) -> Result<u8, MemError> {
        self.memory.load_u8(addr)
    }

    /// Writes one byte for a debugger.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when `addr` is out of bounds.
    pub fn poke_byte(&mut self, addr: u32, value: u8) -> Result<(), MemError> {
        self.memory.store_u8(addr, value)
    }

    pub(crate) const fn set_target_address(&mut self, addr: u32) {
        self.target_address = addr;
    }

    pub(crate) const fn set_last_env_op(&mut self, op: EnvOp) {
        self.last_env_op = Some(op);
    }

    /// Fixed end-of-cycle bookkeeping: count the cycle and advance `pc`.
    pub(crate) const fn advance(&mut self) {
        self.cycles += 1;
        self.pc = self.pc.wrapping_add(4);
    }

    pub(crate) const fn clear_zero_register(&mut self) {
        self.regs.clear_zero();
    }
}

#[cfg(test)]
mod tests {
    use super::Hart;
    use crate::api::HartConfig;
    use crate::fault::SetupError;

    fn hart(mem_size: usize) -> Hart {
        Hart::new(HartConfig {
            mem_size,
            ..HartConfig::default()
        })
        .expect("valid config")
    }

    #[test]
    fn new_hart_starts_at_zero_with_stack_at_top() {
        let hart = hart(1024);
        assert_eq!(hart.pc(), 0);
        assert_eq!(hart.cycles(), 0);
        assert_eq!(hart.reg(2), 1024);
        assert_eq!(hart.memory().size(), 1024);
        assert_eq!(hart.last_env_op(), None);
        assert!(!hart.stop_requested());
    }

    #[test]
    fn invalid_config_is_rejected_before_allocation() {
        let error = Hart::new(HartConfig {
            interrupt_period: 0,
            ..HartConfig::default()
        })
        .expect_err("zero period");
        assert!(matches!(error, SetupError::InvalidConfiguration(_)));
    }

    #[test]
    fn advance_counts_and_moves_pc() {
        let mut hart = hart(64);
        hart.set_pc(u32::MAX - 3);
        hart.advance();
        assert_eq!(hart.cycles(), 1);
        assert_eq!(hart.pc(), 0);
    }

    #[test]
    fn snapshot_lists_registers_then_pc() {
        let mut hart = hart(64);
        hart.set_reg(31, 0xABCD);
        hart.set_pc(0x10);
        let snapshot = hart.register_snapshot();
        assert_eq!(snapshot.as_slice().len(), 33);
        assert_eq!(snapshot.as_slice()[31], 0xABCD);
        assert_eq!(snapshot.pc(), 0x10);
    }

    #[test]
    fn peek_and_poke_are_bounds_checked() {
        let mut hart = hart(8);
        hart.poke_byte(7, 0x5A).expect("in bounds");
        assert_eq!(hart.peek_byte(7), Ok(0x5A));
        assert!(hart.peek_byte(8).is_err());
        assert!(hart.poke_byte(8, 0).is_err());
    }
}
