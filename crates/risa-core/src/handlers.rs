//! Handler capabilities invoked by the engine, and the built-in sets.
//!
//! A [`HandlerSet`] is chosen once when an [`crate::Engine`] is built and is
//! never swapped mid-run. Each capability receives exclusive access to the
//! [`Hart`] and may read or change anything on it.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use tracing::{info, warn};

use crate::hart::{EnvOp, Hart};
use crate::state::registers::{A0, A1, A2, A7};

/// The five engine capabilities. Every method defaults to a no-op.
pub trait HandlerSet {
    /// Called after every store, once the stored bytes are visible in memory.
    fn on_mmio_access(&mut self, _hart: &mut Hart) {}

    /// Called after retire every `interrupt_period` cycles.
    fn on_interrupt(&mut self, _hart: &mut Hart) {}

    /// Called for `ecall`, `ebreak`, and `fence`.
    fn on_environment_call(&mut self, _hart: &mut Hart) {}

    /// Called once, after memory is loaded and before the first fetch.
    fn on_init(&mut self, _hart: &mut Hart) {}

    /// Called once, when the run reaches a terminal state.
    fn on_exit(&mut self, _hart: &mut Hart) {}
}

impl<H: HandlerSet + ?Sized> HandlerSet for Box<H> {
    fn on_mmio_access(&mut self, hart: &mut Hart) {
        (**self).on_mmio_access(hart);
    }

    fn on_interrupt(&mut self, hart: &mut Hart) {
        (**self).on_interrupt(hart);
    }

    fn on_environment_call(&mut self, hart: &mut Hart) {
        (**self).on_environment_call(hart);
    }

    fn on_init(&mut self, hart: &mut Hart) {
        (**self).on_init(hart);
    }

    fn on_exit(&mut self, hart: &mut Hart) {
        (**self).on_exit(hart);
    }
}

impl<H: HandlerSet + ?Sized> HandlerSet for &mut H {
    fn on_mmio_access(&mut self, hart: &mut Hart) {
        (**self).on_mmio_access(hart);
    }

    fn on_interrupt(&mut self, hart: &mut Hart) {
        (**self).on_interrupt(hart);
    }

    fn on_environment_call(&mut self, hart: &mut Hart) {
        (**self).on_environment_call(hart);
    }

    fn on_init(&mut self, hart: &mut Hart) {
        (**self).on_init(hart);
    }

    fn on_exit(&mut self, hart: &mut Hart) {
        (**self).on_exit(hart);
    }
}

/// Every capability is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopHandlers;

impl HandlerSet for NoopHandlers {}

/// Identifies one of the five capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Capability {
    Mmio,
    Interrupt,
    Environment,
    Init,
    Exit,
}

/// Capability-to-symbol table used when binding from a module.
pub const CAPABILITY_SYMBOLS: &[(Capability, &str)] = &[
    (Capability::Mmio, "risaMmioHandler"),
    (Capability::Interrupt, "risaIntHandler"),
    (Capability::Environment, "risaEnvHandler"),
    (Capability::Init, "risaInitHandler"),
    (Capability::Exit, "risaExitHandler"),
];

impl Capability {
    /// Exported symbol name this capability binds to.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        CAPABILITY_SYMBOLS
            .iter()
            .find_map(|(capability, symbol)| (*capability == self).then_some(*symbol))
            .unwrap_or_default()
    }
}

/// A bound capability implementation.
pub type HandlerFn = Box<dyn FnMut(&mut Hart)>;

/// A set of exported handler functions looked up by exact symbol name.
///
/// Stands in for a dynamically loaded handler library: whoever loads the
/// library fills this in, and [`BoundHandlers::bind`] resolves from it.
#[derive(Default)]
pub struct HandlerModule {
    symbols: HashMap<String, HandlerFn>,
}

impl HandlerModule {
    /// An empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports `handler` under `name`, replacing any earlier export.
    #[must_use]
    pub fn export(
        mut self,
        name: impl Into<String>,
        handler: impl FnMut(&mut Hart) + 'static,
    ) -> Self {
        self.symbols.insert(name.into(), Box::new(handler));
        self
    }

    fn take(&mut self, name: &str) -> Option<HandlerFn> {
        self.symbols.remove(name)
    }
}

impl fmt::Debug for HandlerModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.symbols.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerModule").field("symbols", &names).finish()
    }
}

/// Five independently bound capabilities. Unbound ones are no-ops.
#[derive(Default)]
pub struct BoundHandlers {
    mmio: Option<HandlerFn>,
    interrupt: Option<HandlerFn>,
    environment: Option<HandlerFn>,
    init: Option<HandlerFn>,
    exit: Option<HandlerFn>,
}

impl BoundHandlers {
    /// Resolves each capability from `module` by its symbol name.
    ///
    /// Missing symbols keep the no-op default and are logged.
    #[must_use]
    pub fn bind(mut module: HandlerModule) -> Self {
        let mut bound = Self::default();
        for (capability, symbol) in CAPABILITY_SYMBOLS {
            match module.take(symbol) {
                Some(handler) => bound.set(*capability, handler),
                None => info!(symbol, "handler not found, using no-op default"),
            }
        }
        bound
    }

    /// Binds one capability directly.
    pub fn set(&mut self, capability: Capability, handler: HandlerFn) {
        let slot = match capability {
            Capability::Mmio => &mut self.mmio,
            Capability::Interrupt => &mut self.interrupt,
            Capability::Environment => &mut self.environment,
            Capability::Init => &mut self.init,
            Capability::Exit => &mut self.exit,
        };
        *slot = Some(handler);
    }

    /// Returns `true` when `capability` has a bound implementation.
    #[must_use]
    pub const fn is_bound(&self, capability: Capability) -> bool {
        match capability {
            Capability::Mmio => self.mmio.is_some(),
            Capability::Interrupt => self.interrupt.is_some(),
            Capability::Environment => self.environment.is_some(),
            Capability::Init => self.init.is_some(),
            Capability::Exit => self.exit.is_some(),
        }
    }
}

fn call(slot: &mut Option<HandlerFn>, hart: &mut Hart) {
    if let Some(handler) = slot {
        handler(hart);
    }
}

impl HandlerSet for BoundHandlers {
    fn on_mmio_access(&mut self, hart: &mut Hart) {
        call(&mut self.mmio, hart);
    }

    fn on_interrupt(&mut self, hart: &mut Hart) {
        call(&mut self.interrupt, hart);
    }

    fn on_environment_call(&mut self, hart: &mut Hart) {
        call(&mut self.environment, hart);
    }

    fn on_init(&mut self, hart: &mut Hart) {
        call(&mut self.init, hart);
    }

    fn on_exit(&mut self, hart: &mut Hart) {
        call(&mut self.exit, hart);
    }
}

impl fmt::Debug for BoundHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandlers")
            .field("mmio", &self.mmio.is_some())
            .field("interrupt", &self.interrupt.is_some())
            .field("environment", &self.environment.is_some())
            .field("init", &self.init.is_some())
            .field("exit", &self.exit.is_some())
            .finish()
    }
}

/// Logs one line per capability invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggingHandlers;

impl HandlerSet for LoggingHandlers {
    fn on_mmio_access(&mut self, hart: &mut Hart) {
        info!("mmio access at {:#010x}", hart.target_address());
    }

    fn on_interrupt(&mut self, hart: &mut Hart) {
        info!(
            cycles = hart.cycles(),
            period = hart.config().interrupt_period,
            "interrupt"
        );
    }

    fn on_environment_call(&mut self, hart: &mut Hart) {
        info!(op = ?hart.last_env_op(), a7 = hart.reg(A7), "environment call");
    }

    fn on_init(&mut self, hart: &mut Hart) {
        info!(pc = hart.pc(), "init");
    }

    fn on_exit(&mut self, hart: &mut Hart) {
        info!(cycles = hart.cycles(), "exit");
    }
}

/// `exit` system-call numbers (newlib and Linux numbering).
pub const SYSCALL_EXIT: &[u32] = &[1, 93];
/// `write` system-call numbers (newlib and Linux numbering).
pub const SYSCALL_WRITE: &[u32] = &[5, 64];

/// Minimal system-call layer over `ecall`, keyed by `a7`.
///
/// `exit` records `a0` and requests a stop. `write` copies memory
/// `[a1, a1 + a2)` to the sink and returns the byte count in `a0`, or
/// `-1` when the range is out of bounds or the sink fails. Other numbers,
/// `ebreak`, and `fence` are ignored.
#[derive(Debug)]
pub struct SyscallHandlers<W> {
    out: W,
    exit_status: Option<u32>,
}

impl<W: Write> SyscallHandlers<W> {
    /// Writes program output to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            exit_status: None,
        }
    }

    /// Value of `a0` passed to `exit`, once the program has exited.
    #[must_use]
    pub const fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    /// Output sink.
    #[must_use]
    pub const fn output(&self) -> &W {
        &self.out
    }

    /// Consumes the handler set and returns the sink.
    #[must_use]
    pub fn into_output(self) -> W {
        self.out
    }

    fn write(&mut self, hart: &mut Hart) {
        let addr = hart.reg(A1);
        let len = usize::try_from(hart.reg(A2)).unwrap_or(usize::MAX);
        let written = match hart.memory().read_range(addr, len) {
            Ok(bytes) => self
                .out
                .write_all(bytes)
                .and_then(|()| self.out.flush())
                .map_err(|error| warn!(%error, "write syscall failed")),
            Err(error) => {
                warn!(%error, "write syscall buffer out of bounds");
                Err(())
            }
        };
        hart.set_reg(A0, if written.is_ok() { hart.reg(A2) } else { u32::MAX });
    }
}

impl<W: Write> HandlerSet for SyscallHandlers<W> {
    fn on_environment_call(&mut self, hart: &mut Hart) {
        if hart.last_env_op() != Some(EnvOp::Ecall) {
            return;
        }
        let number = hart.reg(A7);
        if SYSCALL_EXIT.contains(&number) {
            let status = hart.reg(A0);
            info!(status, "program exited");
            self.exit_status = Some(status);
            hart.request_stop();
        } else if SYSCALL_WRITE.contains(&number) {
            self.write(hart);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{
        BoundHandlers, Capability, HandlerModule, HandlerSet, NoopHandlers, SyscallHandlers,
    };
    use crate::api::HartConfig;
    use crate::hart::{EnvOp, Hart};
    use crate::state::registers::{A0, A1, A2, A7};

    fn hart() -> Hart {
        Hart::new(HartConfig {
            mem_size: 64,
            ..HartConfig::default()
        })
        .expect("valid config")
    }

    #[test]
    fn noop_handlers_leave_hart_untouched() {
        let mut hart = hart();
        let before = hart.register_snapshot();
        let mut handlers = NoopHandlers;
        handlers.on_init(&mut hart);
        handlers.on_mmio_access(&mut hart);
        handlers.on_interrupt(&mut hart);
        handlers.on_environment_call(&mut hart);
        handlers.on_exit(&mut hart);
        assert_eq!(hart.register_snapshot(), before);
    }

    #[test]
    fn symbols_match_exported_names() {
        assert_eq!(Capability::Mmio.symbol(), "risaMmioHandler");
        assert_eq!(Capability::Interrupt.symbol(), "risaIntHandler");
        assert_eq!(Capability::Environment.symbol(), "risaEnvHandler");
        assert_eq!(Capability::Init.symbol(), "risaInitHandler");
        assert_eq!(Capability::Exit.symbol(), "risaExitHandler");
    }

    #[test]
    fn binding_resolves_only_exact_names() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let init_calls = Rc::clone(&calls);
        let module = HandlerModule::new()
            .export("risaInitHandler", move |_| init_calls.borrow_mut().push("init"))
            .export("risainithandler", |hart: &mut Hart| hart.set_reg(5, 1));

        let mut handlers = BoundHandlers::bind(module);
        assert!(handlers.is_bound(Capability::Init));
        assert!(!handlers.is_bound(Capability::Mmio));

        let mut hart = hart();
        handlers.on_init(&mut hart);
        handlers.on_mmio_access(&mut hart);
        handlers.on_exit(&mut hart);
        assert_eq!(*calls.borrow(), vec!["init"]);
        assert_eq!(hart.reg(5), 0);
    }

    #[test]
    fn boxed_and_borrowed_sets_forward_calls() {
        let mut bound = BoundHandlers::default();
        bound.set(Capability::Interrupt, Box::new(|hart: &mut Hart| hart.set_reg(6, 9)));

        fn interrupt<H: HandlerSet>(mut handlers: H, hart: &mut Hart) {
            handlers.on_interrupt(hart);
        }

        let mut hart = hart();
        interrupt(&mut bound, &mut hart);
        assert_eq!(hart.reg(6), 9);

        let mut boxed: Box<dyn HandlerSet> = Box::new(bound);
        hart.set_reg(6, 0);
        boxed.on_interrupt(&mut hart);
        assert_eq!(hart.reg(6), 9);
    }

    #[test]
    fn exit_syscall_requests_stop() {
        let mut hart = hart();
        hart.set_last_env_op(EnvOp::Ecall);
        hart.set_reg(A7, 93);
        hart.set_reg(A0, 3);
        let mut handlers = SyscallHandlers::new(Vec::<u8>::new());
        handlers.on_environment_call(&mut hart);
        assert!(hart.stop_requested());
        assert_eq!(handlers.exit_status(), Some(3));
    }

    #[test]
    fn write_syscall_copies_memory_to_sink() {
        let mut hart = hart();
        hart.memory_mut().as_bytes_mut()[16..21].copy_from_slice(b"hello");
        hart.set_last_env_op(EnvOp::Ecall);
        hart.set_reg(A7, 5);
        hart.set_reg(A0, 1);
        hart.set_reg(A1, 16);
        hart.set_reg(A2, 5);
        let mut handlers = SyscallHandlers::new(Vec::<u8>::new());
        handlers.on_environment_call(&mut hart);
        assert_eq!(handlers.output().as_slice(), b"hello");
        assert_eq!(hart.reg(A0), 5);
        assert!(!hart.stop_requested());
    }

    #[test]
    fn write_syscall_out_of_bounds_returns_minus_one() {
        let mut hart = hart();
        hart.set_last_env_op(EnvOp::Ecall);
        hart.set_reg(A7, 64);
        hart.set_reg(A1, 60);
        hart.set_reg(A2, 8);
        let mut handlers = SyscallHandlers::new(Vec::<u8>::new());
        handlers.on_environment_call(&mut hart);
        assert!(handlers.into_output().is_empty());
        assert_eq!(hart.reg(A0), u32::MAX);
    }

    #[test]
    fn ebreak_and_unknown_numbers_are_ignored() {
        let mut hart = hart();
        hart.set_last_env_op(EnvOp::Ebreak);
        hart.set_reg(A7, 93);
        let mut handlers = SyscallHandlers::new(Vec::<u8>::new());
        handlers.on_environment_call(&mut hart);
        assert!(!hart.stop_requested());

        hart.set_last_env_op(EnvOp::Ecall);
        hart.set_reg(A7, 999);
        handlers.on_environment_call(&mut hart);
        assert!(!hart.stop_requested());
        assert_eq!(handlers.exit_status(), None);
    }
}
