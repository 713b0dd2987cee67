//! Architectural register state and the engine run-state machine.

/// General-purpose register file and ABI names.
pub mod registers;
/// Run-state machine.
pub mod run_state;

pub use registers::{abi_name, register_index, RegisterFile, GENERAL_REGISTER_COUNT};
pub use run_state::{RunState, StopReason};
