//! Core interpreter crate for rISA, a cycle-stepped RV32I simulator.

/// Fault taxonomy for decode, memory, and setup failures.
pub mod fault;
pub use fault::{FaultClass, FaultCode, SetupError};

/// Opcode formats and funct/opcode classification tables.
pub mod encoding;
pub use encoding::{format_of, InstructionFormat, Operation, FORMAT_TABLE};

/// Instruction field extraction, immediate assembly, and encoders.
pub mod decoder;
pub use decoder::{decode, sign_extend, DecodedFields, DecodedInstruction};

/// Human-readable rendering of instruction words.
pub mod disasm;
pub use disasm::{disassemble, Disassembly};

/// Flat little-endian memory and its bounds policy.
pub mod memory;
pub use memory::{MemError, Memory, DEFAULT_MEM_SIZE, WORD_ACCESS_BYTES};

/// Architectural register state and run-state machine.
pub mod state;
pub use state::{abi_name, register_index, RegisterFile, RunState, StopReason};

/// Host-facing configuration and run outcome types.
pub mod api;
pub use api::{HartConfig, RunOutcome, DEFAULT_INTERRUPT_PERIOD};

/// Simulated core state.
pub mod hart;
pub use hart::{EnvOp, Hart};

/// Handler capabilities and the stock handler sets.
pub mod handlers;
pub use handlers::{
    BoundHandlers, Capability, HandlerFn, HandlerModule, HandlerSet, LoggingHandlers,
    NoopHandlers, SyscallHandlers,
};

/// Instruction execution.
pub mod execute;
pub use execute::{execute, Effect};

/// Debug-bridge polling contract and channel bridge.
pub mod debug;
pub use debug::{
    BridgeClient, BridgeReply, BridgeRequest, ChannelBridge, DebugBridge, DebugCommand,
    RegisterSnapshot,
};

/// Program image loading and boot vector.
pub mod image;
pub use image::{load_image, BootVector};

/// Fetch/decode/execute/retire loop.
pub mod engine;
pub use engine::{Engine, ShutdownHandle};

#[cfg(test)]
use proptest as _;
