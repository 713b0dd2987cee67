//! Host-facing configuration and run-outcome types for embedding the engine.

use crate::fault::SetupError;
use crate::memory::{DEFAULT_MEM_SIZE, WORD_ACCESS_BYTES};
use crate::state::RunState;

/// Default number of cycles between interrupt-handler invocations.
pub const DEFAULT_INTERRUPT_PERIOD: u64 = 500;

/// Configuration for one hart, fixed for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct HartConfig {
    /// Memory size in bytes.
    pub mem_size: usize,
    /// Cycles between interrupt-handler invocations.
    pub interrupt_period: u64,
    /// Cycle count at which the run stops successfully. `None` is unbounded.
    pub timeout: Option<u64>,
    /// Emits one trace event per fetched instruction.
    pub trace: bool,
    /// Polls an attached debug bridge before every cycle.
    pub debug: bool,
}

impl Default for HartConfig {
    fn default() -> Self {
        Self {
            mem_size: DEFAULT_MEM_SIZE,
            interrupt_period: DEFAULT_INTERRUPT_PERIOD,
            timeout: None,
            trace: false,
            debug: false,
        }
    }
}

impl HartConfig {
    /// Checks every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::InvalidConfiguration`] when memory cannot hold a
    /// single instruction word, when memory is not addressable by a 32-bit
    /// program counter, or when the interrupt period or timeout is zero.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.mem_size < usize::from(WORD_ACCESS_BYTES) {
            return Err(SetupError::InvalidConfiguration(
                "memory size must hold at least one instruction word",
            ));
        }
        if u32::try_from(self.mem_size).is_err() {
            return Err(SetupError::InvalidConfiguration(
                "memory size must fit a 32-bit address space",
            ));
        }
        if self.interrupt_period == 0 {
            return Err(SetupError::InvalidConfiguration(
                "interrupt period must be at least one cycle",
            ));
        }
        if self.timeout == Some(0) {
            return Err(SetupError::InvalidConfiguration(
                "timeout must be at least one cycle",
            ));
        }
        Ok(())
    }
}

/// Result of [`crate::Engine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Terminal state the engine stopped in.
    pub state: RunState,
    /// Cycles retired over the whole run.
    pub cycles: u64,
}

impl RunOutcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }
}
