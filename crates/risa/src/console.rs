//! Line-oriented debug console on stdin, driving a channel bridge.
//!
//! The console waits for the engine to halt, then reads commands until one of
//! them resumes execution. `Break` is not offered because input is only read
//! while halted.

use std::io::{self, BufRead, Write};
use std::thread;

use risa_core::debug::PC_INDEX;
use risa_core::{abi_name, register_index, BridgeClient, BridgeReply, BridgeRequest};

const HELP_TEXT: &str = "\
commands:
  s, step              execute one instruction
  c, continue          run until a breakpoint
  b <addr>             set a breakpoint
  d <addr>             delete a breakpoint
  r, regs              print registers
  x <addr> <len>       dump memory
  set <reg> <value>    write a register (x5, t0, pc, ...)
  k, kill              end the run";

fn parse_u32(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| format!("invalid number: {text}"))
}

fn parse_register(name: &str) -> Result<u8, String> {
    if name == "pc" {
        return Ok(PC_INDEX);
    }
    register_index(name).ok_or_else(|| format!("unknown register: {name}"))
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<BridgeRequest>, String> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let mut operand = |what: &str| {
        words
            .next()
            .ok_or_else(|| format!("{command}: missing {what}"))
    };

    let request = match command {
        "s" | "step" => BridgeRequest::Step,
        "c" | "continue" => BridgeRequest::Continue,
        "k" | "kill" | "q" | "quit" => BridgeRequest::Kill,
        "r" | "regs" => BridgeRequest::ReadRegisters,
        "b" | "break" => BridgeRequest::SetBreakpoint(parse_u32(operand("address")?)?),
        "d" | "delete" => BridgeRequest::RemoveBreakpoint(parse_u32(operand("address")?)?),
        "x" => {
            let addr = parse_u32(operand("address")?)?;
            let len = parse_u32(operand("length")?)?;
            BridgeRequest::ReadMemory {
                addr,
                len: usize::try_from(len).map_err(|_| format!("length too large: {len}"))?,
            }
        }
        "set" => {
            let index = parse_register(operand("register")?)?;
            let value = parse_u32(operand("value")?)?;
            BridgeRequest::WriteRegister { index, value }
        }
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(request))
}

fn print_reply(out: &mut impl Write, reply: &BridgeReply) -> io::Result<()> {
    match reply {
        BridgeReply::Halted { pc } => writeln!(out, "halted at {pc:#010x}"),
        BridgeReply::Ok => writeln!(out, "ok"),
        BridgeReply::Registers(snapshot) => {
            for (index, value) in (0u8..).zip(snapshot.as_slice()) {
                let name = abi_name(index).unwrap_or("pc");
                writeln!(out, "{name:>4} = {value:#010x}")?;
            }
            Ok(())
        }
        BridgeReply::Memory(bytes) => {
            let hex: Vec<String> = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
            writeln!(out, "{}", hex.join(" "))
        }
        BridgeReply::MemoryError(error) => writeln!(out, "error: {error}"),
        BridgeReply::BadRegister(index) => writeln!(out, "error: no register {index}"),
    }
}

/// Drives `client` from `input` until the run is killed or the bridge goes
/// away. End of input kills the run.
///
/// # Errors
///
/// Returns an I/O error when reading input or writing output fails.
pub fn run_console(
    client: &BridgeClient,
    mut input: impl BufRead,
    mut out: impl Write,
) -> io::Result<()> {
    loop {
        loop {
            match client.recv() {
                Ok(reply @ BridgeReply::Halted { .. }) => {
                    print_reply(&mut out, &reply)?;
                    break;
                }
                Ok(reply) => print_reply(&mut out, &reply)?,
                Err(_) => return Ok(()),
            }
        }

        loop {
            write!(out, "(risa) ")?;
            out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                client.send(BridgeRequest::Kill);
                return Ok(());
            }
            if matches!(line.trim(), "h" | "help" | "?") {
                writeln!(out, "{HELP_TEXT}")?;
                continue;
            }
            match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(request @ (BridgeRequest::Step | BridgeRequest::Continue))) => {
                    if !client.send(request) {
                        return Ok(());
                    }
                    break;
                }
                Ok(Some(BridgeRequest::Kill)) => {
                    client.send(BridgeRequest::Kill);
                    return Ok(());
                }
                Ok(Some(request)) => match client.request(request) {
                    Ok(reply) => print_reply(&mut out, &reply)?,
                    Err(_) => return Ok(()),
                },
                Err(message) => writeln!(out, "error: {message}")?,
            }
        }
    }
}

/// Runs the console on stdin and stderr in a background thread.
pub fn spawn(client: BridgeClient) {
    thread::spawn(move || {
        if let Err(error) = run_console(&client, io::stdin().lock(), io::stderr()) {
            tracing::warn!(%error, "debug console stopped");
        }
    });
}
