//! Debug-bridge boundary: register snapshots, the polling contract, and a
//! channel-driven bridge for a front end running on another thread.

use std::collections::BTreeSet;
use std::sync::mpsc::{self, Receiver, RecvError, Sender, TryRecvError};

use tracing::{debug, info};

use crate::hart::Hart;
use crate::memory::MemError;
use crate::state::GENERAL_REGISTER_COUNT;

/// Registers in a snapshot: `x0..x31` then `pc`.
pub const SNAPSHOT_REGISTER_COUNT: usize = GENERAL_REGISTER_COUNT + 1;

/// Register index a front end uses to address `pc`.
pub const PC_INDEX: u8 = 32;

/// Ordered `x0..x31, pc` view for wire transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterSnapshot {
    values: [u32; SNAPSHOT_REGISTER_COUNT],
}

impl RegisterSnapshot {
    /// Builds a snapshot from a register array and `pc`.
    #[must_use]
    pub const fn new(regs: &[u32; GENERAL_REGISTER_COUNT], pc: u32) -> Self {
        let mut values = [0; SNAPSHOT_REGISTER_COUNT];
        let mut i = 0;
        while i < GENERAL_REGISTER_COUNT {
            values[i] = regs[i];
            i += 1;
        }
        values[GENERAL_REGISTER_COUNT] = pc;
        Self { values }
    }

    /// All 33 values in order.
    #[must_use]
    pub const fn as_slice(&self) -> &[u32] {
        &self.values
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u32 {
        self.values[GENERAL_REGISTER_COUNT]
    }

    /// Values as consecutive little-endian words.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values.iter().flat_map(|value| value.to_le_bytes()).collect()
    }
}

/// What the engine should do with the pending cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugCommand {
    /// Execute it; the bridge stays free-running.
    Continue,
    /// Execute it; the bridge will halt on its next poll.
    Step,
    /// Do not execute it; end the run successfully.
    Kill,
}

/// Polled by the engine once before every cycle when debug mode is on.
///
/// `poll` may block for as long as it likes; the engine stalls with it.
pub trait DebugBridge {
    /// Inspects or changes `hart` and decides whether the next cycle runs.
    fn poll(&mut self, hart: &mut Hart) -> DebugCommand;
}

/// Requests a front end sends to a [`ChannelBridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeRequest {
    /// Run one cycle, then halt.
    Step,
    /// Run until a breakpoint or a [`BridgeRequest::Break`].
    Continue,
    /// Halt a running program.
    Break,
    /// Halt before executing the instruction at this address.
    SetBreakpoint(u32),
    /// Forget a breakpoint.
    RemoveBreakpoint(u32),
    /// Reply with [`BridgeReply::Registers`].
    ReadRegisters,
    /// Write one register; index [`PC_INDEX`] addresses `pc`.
    WriteRegister {
        /// `0..=31` for `x0..x31`, [`PC_INDEX`] for `pc`.
        index: u8,
        /// New value.
        value: u32,
    },
    /// Reply with [`BridgeReply::Memory`].
    ReadMemory {
        /// First byte.
        addr: u32,
        /// Byte count.
        len: usize,
    },
    /// Write bytes starting at `addr`. Nothing is written unless every byte fits.
    WriteMemory {
        /// First byte.
        addr: u32,
        /// Bytes to write.
        bytes: Vec<u8>,
    },
    /// End the run.
    Kill,
}

/// Replies a [`ChannelBridge`] sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeReply {
    /// The program is halted at `pc` and the bridge is waiting for requests.
    Halted {
        /// Address of the next instruction to execute.
        pc: u32,
    },
    /// Request applied.
    Ok,
    /// Register snapshot.
    Registers(RegisterSnapshot),
    /// Memory contents.
    Memory(Vec<u8>),
    /// Memory request out of bounds.
    MemoryError(MemError),
    /// Register index out of range.
    BadRegister(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Halted { announced: bool },
    Stepping,
    Running,
    Detached,
}

/// A [`DebugBridge`] driven over `std::sync::mpsc` channels.
///
/// Starts halted. While halted, `poll` blocks servicing inspection requests
/// until `Step`, `Continue`, or `Kill` arrives. If the front end hangs up
/// the program runs free.
#[derive(Debug)]
pub struct ChannelBridge {
    requests: Receiver<BridgeRequest>,
    replies: Sender<BridgeReply>,
    breakpoints: BTreeSet<u32>,
    mode: Mode,
}

/// Front-end half of a [`ChannelBridge`].
#[derive(Debug)]
pub struct BridgeClient {
    requests: Sender<BridgeRequest>,
    replies: Receiver<BridgeReply>,
}

impl BridgeClient {
    /// Sends a request. Returns `false` once the bridge is gone.
    pub fn send(&self, request: BridgeRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Waits for the next reply.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError`] once the bridge is gone.
    pub fn recv(&self) -> Result<BridgeReply, RecvError> {
        self.replies.recv()
    }

    /// Sends a request and waits for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError`] once the bridge is gone.
    pub fn request(&self, request: BridgeRequest) -> Result<BridgeReply, RecvError> {
        if !self.send(request) {
            return Err(RecvError);
        }
        self.recv()
    }
}

impl ChannelBridge {
    /// Creates a connected bridge and front-end pair.
    #[must_use]
    pub fn pair() -> (Self, BridgeClient) {
        let (request_tx, request_rx) = mpsc::channel();
        let (reply_tx, reply_rx) = mpsc::channel();
        (
            Self {
                requests: request_rx,
                replies: reply_tx,
                breakpoints: BTreeSet::new(),
                mode: Mode::Halted { announced: false },
            },
            BridgeClient {
                requests: request_tx,
                replies: reply_rx,
            },
        )
    }

    /// Currently set breakpoints.
    #[must_use]
    pub const fn breakpoints(&self) -> &BTreeSet<u32> {
        &self.breakpoints
    }

    fn reply(&self, reply: BridgeReply) {
        if self.replies.send(reply).is_err() {
            debug!("debug front end dropped its reply channel");
        }
    }

    fn halt(&mut self, hart: &Hart) {
        if self.mode != (Mode::Halted { announced: true }) {
            debug!(pc = hart.pc(), "debug bridge halted");
            self.reply(BridgeReply::Halted { pc: hart.pc() });
        }
        self.mode = Mode::Halted { announced: true };
    }

    /// Applies one request. Returns a command when the request resumes or
    /// ends execution.
    fn service(&mut self, request: BridgeRequest, hart: &mut Hart) -> Option<DebugCommand> {
        match request {
            BridgeRequest::Step => {
                self.mode = Mode::Stepping;
                return Some(DebugCommand::Step);
            }
            BridgeRequest::Continue => {
                self.mode = Mode::Running;
                return Some(DebugCommand::Continue);
            }
            BridgeRequest::Kill => {
                info!("debug front end killed the run");
                return Some(DebugCommand::Kill);
            }
            BridgeRequest::Break => self.halt(hart),
            BridgeRequest::SetBreakpoint(addr) => {
                self.breakpoints.insert(addr);
                self.reply(BridgeReply::Ok);
            }
            BridgeRequest::RemoveBreakpoint(addr) => {
                self.breakpoints.remove(&addr);
                self.reply(BridgeReply::Ok);
            }
            BridgeRequest::ReadRegisters => {
                self.reply(BridgeReply::Registers(hart.register_snapshot()));
            }
            BridgeRequest::WriteRegister { index, value } => {
                let reply = match index {
                    PC_INDEX => {
                        hart.set_pc(value);
                        BridgeReply::Ok
                    }
                    0..=31 => {
                        hart.set_reg(index, value);
                        BridgeReply::Ok
                    }
                    _ => BridgeReply::BadRegister(index),
                };
                self.reply(reply);
            }
            BridgeRequest::ReadMemory { addr, len } => {
                let reply = match hart.memory().read_range(addr, len) {
                    Ok(bytes) => BridgeReply::Memory(bytes.to_vec()),
                    Err(error) => BridgeReply::MemoryError(error),
                };
                self.reply(reply);
            }
            BridgeRequest::WriteMemory { addr, bytes } => {
                let reply = match write_bytes(hart, addr, &bytes) {
                    Ok(()) => BridgeReply::Ok,
                    Err(error) => BridgeReply::MemoryError(error),
                };
                self.reply(reply);
            }
        }
        None
    }

    fn drain(&mut self, hart: &mut Hart) -> Option<DebugCommand> {
        loop {
            match self.requests.try_recv() {
                Ok(BridgeRequest::Continue | BridgeRequest::Step) => {}
                Ok(request) => {
                    if let Some(command) = self.service(request, hart) {
                        return Some(command);
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.detach();
                    return Some(DebugCommand::Continue);
                }
            }
        }
    }

    fn detach(&mut self) {
        info!("debug front end disconnected, running free");
        self.mode = Mode::Detached;
    }
}

fn write_bytes(hart: &mut Hart, addr: u32, bytes: &[u8]) -> Result<(), MemError> {
    hart.memory().read_range(addr, bytes.len())?;
    let mut cursor = addr;
    for &byte in bytes {
        hart.poke_byte(cursor, byte)?;
        cursor = cursor.wrapping_add(1);
    }
    Ok(())
}

impl DebugBridge for ChannelBridge {
    fn poll(&mut self, hart: &mut Hart) -> DebugCommand {
        match self.mode {
            Mode::Detached => return DebugCommand::Continue,
            Mode::Running => {
                if let Some(command) = self.drain(hart) {
                    return command;
                }
                if self.mode == Mode::Running {
                    if !self.breakpoints.contains(&hart.pc()) {
                        return DebugCommand::Continue;
                    }
                    debug!(pc = hart.pc(), "breakpoint hit");
                }
            }
            Mode::Stepping | Mode::Halted { .. } => {}
        }

        self.halt(hart);
        loop {
            let Ok(request) = self.requests.recv() else {
                self.detach();
                return DebugCommand::Continue;
            };
            if let Some(command) = self.service(request, hart) {
                return command;
            }
        }
    }
}
