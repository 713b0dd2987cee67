//! Fetch, decode, execute, retire.
//!
//! The [`Engine`] owns the [`Hart`] and the [`HandlerSet`] side by side so
//! that every capability can be handed `&mut Hart` while it runs. The loop is
//! synchronous: handlers and the debug bridge run to completion inside the
//! cycle that calls them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::api::{HartConfig, RunOutcome};
use crate::debug::{DebugBridge, DebugCommand};
use crate::decoder::decode;
use crate::disasm::disassemble;
use crate::execute::{execute, Effect};
use crate::fault::{FaultCode, SetupError};
use crate::handlers::HandlerSet;
use crate::hart::Hart;
use crate::image::{load_image, BootVector};
use crate::memory::MemError;
use crate::state::{RunState, StopReason};

/// Cloneable handle that asks a running engine to stop cleanly.
///
/// The request is observed at the start of the next retire, so the cycle in
/// flight always completes.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Requests a stop. Safe to call from any thread or a signal handler.
    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once a stop has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A hart, its handler set, and the run-state machine that drives them.
///
/// Dropping an engine that has started but not reached a terminal state
/// still invokes the exit handler.
pub struct Engine<H: HandlerSet> {
    hart: Hart,
    handlers: H,
    state: RunState,
    shutdown: ShutdownHandle,
    bridge: Option<Box<dyn DebugBridge>>,
    initialized: bool,
    exited: bool,
    started: Option<Instant>,
}

impl<H: HandlerSet> Engine<H> {
    /// Builds a hart from `config` and binds `handlers` for its lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError`] when the config is rejected or memory cannot be
    /// allocated.
    pub fn new(config: HartConfig, handlers: H) -> Result<Self, SetupError> {
        Ok(Self {
            hart: Hart::new(config)?,
            handlers,
            state: RunState::Running,
            shutdown: ShutdownHandle::default(),
            bridge: None,
            initialized: false,
            exited: false,
            started: None,
        })
    }

    /// Attaches a debug bridge. It is polled only when debug mode is on.
    #[must_use]
    pub fn with_debug_bridge(mut self, bridge: impl DebugBridge + 'static) -> Self {
        self.bridge = Some(Box::new(bridge));
        self
    }

    /// Copies a raw image to memory offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::ImageTooLarge`] when the image does not fit.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), SetupError> {
        load_image(image, self.hart.memory_mut())
    }

    /// Seeds `sp` and `pc` from the first two words of memory.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when memory is smaller than the boot vector.
    pub fn apply_boot_vector(&mut self) -> Result<BootVector, MemError> {
        let vector = BootVector::read(self.hart.memory())?;
        vector.apply(&mut self.hart);
        Ok(vector)
    }

    /// The hart.
    #[must_use]
    pub const fn hart(&self) -> &Hart {
        &self.hart
    }

    /// The hart, mutably. Intended for setup before the first cycle.
    #[must_use]
    pub const fn hart_mut(&mut self) -> &mut Hart {
        &mut self.hart
    }

    /// The bound handler set.
    #[must_use]
    pub const fn handlers(&self) -> &H {
        &self.handlers
    }

    /// Current run state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// A handle sharing this engine's shutdown flag.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Runs cycles until a terminal state.
    pub fn run(&mut self) -> RunOutcome {
        while !self.step().is_terminal() {}
        RunOutcome {
            state: self.state,
            cycles: self.hart.cycles(),
        }
    }

    /// Runs exactly one cycle and returns the resulting state.
    ///
    /// Once terminal, further calls do nothing and return the same state.
    pub fn step(&mut self) -> RunState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.ensure_initialized();

        if self.hart.config().debug {
            if let Some(bridge) = self.bridge.as_mut() {
                if bridge.poll(&mut self.hart) == DebugCommand::Kill {
                    return self.finish(RunState::StoppedOk(StopReason::Killed));
                }
            }
        }

        let pc = self.hart.pc();
        let word = match self.hart.memory().load_u32(pc) {
            Ok(word) => word,
            Err(error) => {
                warn!(%error, "instruction fetch out of bounds");
                return self.finish(RunState::StoppedFault(FaultCode::AddressFault));
            }
        };

        if self.hart.config().trace {
            info!(
                pc = format_args!("{pc:#010x}"),
                word = format_args!("{word:#010x}"),
                cycles = self.hart.cycles(),
                "{}",
                disassemble(word)
            );
        }

        match decode(word).and_then(|instruction| execute(&mut self.hart, instruction)) {
            Ok(Effect::None) => {}
            Ok(Effect::Mmio) => self.handlers.on_mmio_access(&mut self.hart),
            Ok(Effect::Environment(_)) => self.handlers.on_environment_call(&mut self.hart),
            Err(fault) => {
                warn!(
                    pc = format_args!("{pc:#010x}"),
                    word = format_args!("{word:#010x}"),
                    %fault,
                    "instruction faulted"
                );
                return self.finish(RunState::StoppedFault(fault));
            }
        }

        self.retire()
    }

    fn ensure_initialized(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.started = Some(Instant::now());
        if self.hart.config().debug && self.bridge.is_none() {
            warn!("debug mode enabled without a debug bridge");
        }
        info!(pc = self.hart.pc(), "starting simulation");
        self.handlers.on_init(&mut self.hart);
    }

    fn retire(&mut self) -> RunState {
        let stop = self.shutdown.is_requested() || self.hart.stop_requested();

        self.hart.advance();
        let cycles = self.hart.cycles();
        if cycles % self.hart.config().interrupt_period == 0 {
            self.handlers.on_interrupt(&mut self.hart);
        }
        self.hart.clear_zero_register();

        if stop {
            return self.finish(RunState::StoppedOk(StopReason::ShutdownRequested));
        }
        if self.hart.config().timeout.is_some_and(|timeout| cycles >= timeout) {
            return self.finish(RunState::StoppedOk(StopReason::Timeout));
        }
        if usize::try_from(self.hart.pc()).map_or(true, |pc| pc >= self.hart.mem_size()) {
            warn!(
                pc = format_args!("{:#010x}", self.hart.pc()),
                mem_size = self.hart.mem_size(),
                "program counter left memory"
            );
            return self.finish(RunState::StoppedFault(FaultCode::AddressFault));
        }
        RunState::Running
    }

    fn finish(&mut self, state: RunState) -> RunState {
        self.state = state;
        let elapsed = self.started.map(|started| started.elapsed());
        match state {
            RunState::StoppedFault(fault) => {
                warn!(
                    %fault,
                    code = fault.as_u8(),
                    cycles = self.hart.cycles(),
                    ?elapsed,
                    "simulation stopped"
                );
            }
            RunState::StoppedOk(reason) => {
                info!(
                    ?reason,
                    cycles = self.hart.cycles(),
                    ?elapsed,
                    "simulation stopped"
                );
            }
            RunState::Running => {}
        }
        self.exit_once();
        state
    }

    fn exit_once(&mut self) {
        if !self.exited {
            self.exited = true;
            self.handlers.on_exit(&mut self.hart);
        }
    }
}

impl<H: HandlerSet> Drop for Engine<H> {
    fn drop(&mut self) {
        if self.initialized && !self.exited {
            info!(
                cycles = self.hart.cycles(),
                "engine dropped before the run finished"
            );
            self.exit_once();
        }
    }
}

impl<H: HandlerSet + fmt::Debug> fmt::Debug for Engine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("hart", &self.hart)
            .field("handlers", &self.handlers)
            .field("state", &self.state)
            .field("debug_bridge", &self.bridge.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::Engine;
    use crate::api::HartConfig;
    use crate::fault::FaultCode;
    use crate::handlers::{BoundHandlers, Capability, NoopHandlers};
    use crate::hart::Hart;
    use crate::state::{RunState, StopReason};

    const ADDI_X1_X1_1: u32 = 0x0010_8093;

    fn engine(mem_size: usize, timeout: Option<u64>, words: &[u32]) -> Engine<NoopHandlers> {
        let mut engine = Engine::new(
            HartConfig {
                mem_size,
                timeout,
                ..HartConfig::default()
            },
            NoopHandlers,
        )
        .expect("valid config");
        engine
            .hart_mut()
            .memory_mut()
            .write_words(0, words)
            .expect("program fits");
        engine
    }

    #[test]
    fn step_runs_one_cycle() {
        let mut engine = engine(64, None, &[ADDI_X1_X1_1; 4]);
        assert_eq!(engine.step(), RunState::Running);
        assert_eq!(engine.hart().cycles(), 1);
        assert_eq!(engine.hart().pc(), 4);
        assert_eq!(engine.hart().reg(1), 1);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut engine = engine(8, None, &[0xAAAA_AAAA]);
        assert_eq!(
            engine.step(),
            RunState::StoppedFault(FaultCode::IllegalSequence)
        );
        assert_eq!(
            engine.step(),
            RunState::StoppedFault(FaultCode::IllegalSequence)
        );
        assert_eq!(engine.hart().cycles(), 0);
    }

    #[test]
    fn shutdown_handle_stops_after_current_cycle() {
        let mut engine = engine(64, None, &[ADDI_X1_X1_1; 16]);
        let handle = engine.shutdown_handle();
        assert_eq!(engine.step(), RunState::Running);
        handle.request();
        assert!(handle.is_requested());
        let outcome = engine.run();
        assert_eq!(
            outcome.state,
            RunState::StoppedOk(StopReason::ShutdownRequested)
        );
        assert_eq!(outcome.cycles, 2);
        assert_eq!(engine.hart().reg(1), 2);
    }

    #[test]
    fn pc_leaving_memory_is_address_fault() {
        let mut engine = engine(8, None, &[ADDI_X1_X1_1; 2]);
        let outcome = engine.run();
        assert_eq!(outcome.state, RunState::StoppedFault(FaultCode::AddressFault));
        assert_eq!(outcome.cycles, 2);
    }

    #[test]
    fn timeout_wins_over_pc_range_on_the_same_cycle() {
        let mut engine = engine(8, Some(2), &[ADDI_X1_X1_1; 2]);
        assert_eq!(
            engine.run().state,
            RunState::StoppedOk(StopReason::Timeout)
        );
    }

    #[test]
    fn handler_requested_stop_is_a_clean_stop() {
        let mut handlers = BoundHandlers::default();
        handlers.set(Capability::Environment, Box::new(Hart::request_stop));
        let mut engine = Engine::new(
            HartConfig {
                mem_size: 64,
                ..HartConfig::default()
            },
            handlers,
        )
        .expect("valid config");
        engine
            .hart_mut()
            .memory_mut()
            .write_words(0, &[ADDI_X1_X1_1, 0x0000_0073, ADDI_X1_X1_1])
            .expect("fits");

        let outcome = engine.run();
        assert_eq!(
            outcome.state,
            RunState::StoppedOk(StopReason::ShutdownRequested)
        );
        assert_eq!(outcome.cycles, 2);
        assert_eq!(engine.hart().reg(1), 1);
    }

    #[test]
    fn exit_runs_once_even_when_stepped_past_the_end() {
        let exits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&exits);
        let mut handlers = BoundHandlers::default();
        handlers.set(
            Capability::Exit,
            Box::new(move |_: &mut Hart| counter.set(counter.get() + 1)),
        );
        let mut engine = Engine::new(
            HartConfig {
                mem_size: 8,
                ..HartConfig::default()
            },
            handlers,
        )
        .expect("valid config");

        engine.run();
        engine.step();
        engine.run();
        drop(engine);
        assert_eq!(exits.get(), 1);
    }

    fn counting_exit(exits: &Rc<Cell<u32>>) -> BoundHandlers {
        let counter = Rc::clone(exits);
        let mut handlers = BoundHandlers::default();
        handlers.set(
            Capability::Exit,
            Box::new(move |_: &mut Hart| counter.set(counter.get() + 1)),
        );
        handlers
    }

    #[test]
    fn dropping_a_started_engine_runs_exit() {
        let exits = Rc::new(Cell::new(0));
        let mut engine = Engine::new(
            HartConfig {
                mem_size: 64,
                ..HartConfig::default()
            },
            counting_exit(&exits),
        )
        .expect("valid config");
        assert_eq!(engine.step(), RunState::Running);
        assert_eq!(exits.get(), 0);

        drop(engine);
        assert_eq!(exits.get(), 1);
    }

    #[test]
    fn dropping_an_unstarted_engine_skips_exit() {
        let exits = Rc::new(Cell::new(0));
        let engine = Engine::new(HartConfig::default(), counting_exit(&exits))
            .expect("valid config");
        drop(engine);
        assert_eq!(exits.get(), 0);
    }

    #[test]
    fn borrowed_handlers_are_usable_after_the_engine_is_gone() {
        let exits = Rc::new(Cell::new(0));
        let mut handlers = counting_exit(&exits);
        {
            let mut engine = Engine::new(
                HartConfig {
                    mem_size: 8,
                    ..HartConfig::default()
                },
                &mut handlers,
            )
            .expect("valid config");
            engine.run();
        }
        assert!(handlers.is_bound(Capability::Exit));
        assert_eq!(exits.get(), 1);
    }
}
