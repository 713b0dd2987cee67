//! CLI entry point for the rISA RV32I interpreter.

mod console;

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::PathBuf;

use risa_core::{
    ChannelBridge, Engine, HandlerSet, HartConfig, LoggingHandlers, NoopHandlers, RunOutcome,
    SetupError, SyscallHandlers,
};
#[cfg(test)]
use tempfile as _;
use tracing::{error, warn};
use tracing_subscriber::{fmt, EnvFilter};

const USAGE_TEXT: &str = "\
Usage: risa [options] <image>

Runs a raw little-endian RV32I image loaded at address 0.

Options:
  -m, --memory <bytes>      Memory size (default: 16384)
  -i, --interrupt <cycles>  Cycles between interrupt handler calls (default: 500)
  -t, --timeout <cycles>    Stop successfully after this many cycles
  -l, --handlers <name>     Handler set: noop, log, syscall (default: noop)
      --trace               Log every fetched instruction
  -d, --debug               Start halted under the stdin debug console
      --boot-vector         Take sp and pc from the first two image words
  -h, --help                Show this help message

Numbers accept decimal or 0x-prefixed hex. RUST_LOG overrides the log filter.

Examples:
  risa program.bin
  risa -t 1000 --trace program.bin
  risa -l syscall -m 0x10000 hello.bin
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerChoice {
    Noop,
    Log,
    Syscall,
}

impl HandlerChoice {
    fn from_name(name: &str) -> Result<Self, SetupError> {
        match name {
            "noop" => Ok(Self::Noop),
            "log" => Ok(Self::Log),
            "syscall" => Ok(Self::Syscall),
            other => Err(SetupError::UnknownHandlerSet(other.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    image: PathBuf,
    config: HartConfig,
    handlers: String,
    boot_vector: bool,
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

fn parse_number(flag: &str, value: Option<OsString>) -> Result<u64, String> {
    let value = value.ok_or_else(|| format!("missing value for {flag}"))?;
    let text = value.to_string_lossy();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid number for {flag}: {text}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut config = HartConfig::default();
    let mut image: Option<PathBuf> = None;
    let mut handlers = String::from("noop");
    let mut boot_vector = false;

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseResult::Help),
            "-m" | "--memory" => {
                let bytes = parse_number(&flag, args.next())?;
                config.mem_size = usize::try_from(bytes)
                    .map_err(|_| format!("memory size out of range: {bytes}"))?;
            }
            "-i" | "--interrupt" => config.interrupt_period = parse_number(&flag, args.next())?,
            "-t" | "--timeout" => config.timeout = Some(parse_number(&flag, args.next())?),
            "-l" | "--handlers" => {
                let name = args
                    .next()
                    .ok_or_else(|| format!("missing value for {flag}"))?;
                handlers = name.to_string_lossy().to_string();
            }
            "--trace" => config.trace = true,
            "-d" | "--debug" => config.debug = true,
            "--boot-vector" => boot_vector = true,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            _ => {
                if image.is_some() {
                    return Err("multiple image paths provided".to_string());
                }
                image = Some(PathBuf::from(arg));
            }
        }
    }

    let image = image.ok_or_else(|| "missing image path".to_string())?;
    Ok(ParseResult::Run(RunArgs {
        image,
        config,
        handlers,
        boot_vector,
    }))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Ends the run cleanly on SIGINT. The handler can only be installed once per
/// process.
fn install_interrupt_handler<H: HandlerSet>(engine: &Engine<H>) {
    let handle = engine.shutdown_handle();
    if let Err(err) = ctrlc::set_handler(move || handle.request()) {
        warn!(error = %err, "failed to install interrupt handler");
    }
}

fn simulate<H: HandlerSet>(
    args: &RunArgs,
    image: &[u8],
    handlers: H,
) -> Result<RunOutcome, SetupError> {
    let mut engine = Engine::new(args.config.clone(), handlers)?;
    engine.load_image(image)?;
    if args.boot_vector {
        engine.apply_boot_vector().map_err(|_| {
            SetupError::InvalidConfiguration("memory too small to hold a boot vector")
        })?;
    }
    if args.config.debug {
        let (bridge, client) = ChannelBridge::pair();
        console::spawn(client);
        engine = engine.with_debug_bridge(bridge);
    }
    install_interrupt_handler(&engine);
    Ok(engine.run())
}

/// Maps a program's `exit` argument to a process status, keeping the low byte.
fn program_status(status: u32) -> i32 {
    i32::try_from(status & 0xFF).unwrap_or(1)
}

fn run(args: &RunArgs) -> Result<i32, SetupError> {
    let choice = HandlerChoice::from_name(&args.handlers)?;
    let image = match fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("error: failed to read {}: {err}", args.image.display());
            return Ok(1);
        }
    };

    let code = match choice {
        HandlerChoice::Noop => simulate(args, &image, NoopHandlers)?.exit_code(),
        HandlerChoice::Log => simulate(args, &image, LoggingHandlers)?.exit_code(),
        HandlerChoice::Syscall => {
            let mut handlers = SyscallHandlers::new(io::stdout());
            let outcome = simulate(args, &image, &mut handlers)?;
            match handlers.exit_status() {
                Some(status) if outcome.state.fault().is_none() => program_status(status),
                _ => outcome.exit_code(),
            }
        }
    };
    Ok(code)
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => {
            init_logging();
            match run(&args) {
                Ok(code) => code,
                Err(err) => {
                    error!(error = %err, "setup failed");
                    eprintln!("error: {err}");
                    err.fault_code().exit_code()
                }
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}
