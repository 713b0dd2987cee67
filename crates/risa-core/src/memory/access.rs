//! Bounds policy shared by fetch, load, store, and debug peek/poke.

use thiserror::Error;

use crate::fault::FaultCode;

/// Width in bytes of an instruction fetch and of `lw`/`sw`.
pub const WORD_ACCESS_BYTES: u8 = 4;

/// An access that does not lie entirely within memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{width}-byte access at {addr:#010x} is outside {size} bytes of memory")]
pub struct MemError {
    /// First byte of the rejected access.
    pub addr: u32,
    /// Access width in bytes.
    pub width: u8,
    /// Configured memory size in bytes.
    pub size: usize,
}

impl From<MemError> for FaultCode {
    fn from(_: MemError) -> Self {
        Self::AddressFault
    }
}

/// Validates that `[addr, addr + width)` lies within `[0, size)` and returns
/// the starting index.
///
/// # Errors
///
/// Returns [`MemError`] when any byte of the access is out of bounds. An
/// access whose end overflows `u32` is out of bounds too.
pub fn check_access(addr: u32, width: u8, size: usize) -> Result<usize, MemError> {
    let start = usize::try_from(addr).map_err(|_| MemError { addr, width, size })?;
    match start.checked_add(usize::from(width)) {
        Some(end) if end <= size => Ok(start),
        _ => Err(MemError { addr, width, size }),
    }
}
