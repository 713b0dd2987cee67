//! Flat, byte-addressed, little-endian simulator memory.

/// Bounds policy and access errors.
pub mod access;

pub use access::{check_access, MemError, WORD_ACCESS_BYTES};

use crate::fault::SetupError;

/// Default memory size in bytes.
pub const DEFAULT_MEM_SIZE: usize = 16_384;

/// Owned memory buffer of a fixed size, zeroed at allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Box<[u8]>,
}

impl Memory {
    /// Allocates `size` zeroed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::OutOfMemory`] when the allocator refuses the
    /// request.
    pub fn new(size: usize) -> Result<Self, SetupError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size)
            .map_err(|_| SetupError::OutOfMemory { size })?;
        bytes.resize(size, 0);
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
        })
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Whole buffer as a slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whole buffer as a mutable slice.
    #[must_use]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn window<const N: usize>(&self, addr: u32) -> Result<[u8; N], MemError> {
        #[allow(clippy::cast_possible_truncation)]
        let start = check_access(addr, N as u8, self.size())?;
        let mut out = [0; N];
        out.copy_from_slice(&self.bytes[start..start + N]);
        Ok(out)
    }

    fn window_mut<const N: usize>(&mut self, addr: u32, value: [u8; N]) -> Result<(), MemError> {
        #[allow(clippy::cast_possible_truncation)]
        let start = check_access(addr, N as u8, self.size())?;
        self.bytes[start..start + N].copy_from_slice(&value);
        Ok(())
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when `addr` is out of bounds.
    pub fn load_u8(&self, addr: u32) -> Result<u8, MemError> {
        self.window::<1>(addr).map(|[b]| b)
    }

    /// Reads a little-endian halfword.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when either byte is out of bounds.
    pub fn load_u16(&self, addr: u32) -> Result<u16, MemError> {
        self.window(addr).map(u16::from_le_bytes)
    }

    /// Reads a little-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when any byte is out of bounds.
    pub fn load_u32(&self, addr: u32) -> Result<u32, MemError> {
        self.window(addr).map(u32::from_le_bytes)
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when `addr` is out of bounds.
    pub fn store_u8(&mut self, addr: u32, value: u8) -> Result<(), MemError> {
        self.window_mut(addr, [value])
    }

    /// Writes a little-endian halfword.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when either byte is out of bounds.
    pub fn store_u16(&mut self, addr: u32, value: u16) -> Result<(), MemError> {
        self.window_mut(addr, value.to_le_bytes())
    }

    /// Writes a little-endian word.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when any byte is out of bounds.
    pub fn store_u32(&mut self, addr: u32, value: u32) -> Result<(), MemError> {
        self.window_mut(addr, value.to_le_bytes())
    }

    /// Reads `len` bytes starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when the range is not entirely in bounds.
    pub fn read_range(&self, addr: u32, len: usize) -> Result<&[u8], MemError> {
        let error = MemError {
            addr,
            width: u8::try_from(len).unwrap_or(u8::MAX),
            size: self.size(),
        };
        let start = usize::try_from(addr).map_err(|_| error)?;
        let end = start.checked_add(len).ok_or(error)?;
        self.bytes.get(start..end).ok_or(error)
    }

    /// Stores consecutive little-endian words starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] on the first word that does not fit; words before
    /// it are already written.
    pub fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<(), MemError> {
        let mut cursor = addr;
        for &word in words {
            self.store_u32(cursor, word)?;
            cursor = cursor.wrapping_add(u32::from(WORD_ACCESS_BYTES));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemError, Memory, DEFAULT_MEM_SIZE};

    #[test]
    fn new_memory_is_zeroed() {
        let memory = Memory::new(DEFAULT_MEM_SIZE).expect("allocates");
        assert_eq!(memory.size(), 16_384);
        assert!(memory.as_bytes().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut memory = Memory::new(16).expect("allocates");
        memory.store_u32(4, 0x1122_3344).expect("in bounds");
        assert_eq!(&memory.as_bytes()[4..8], &[0x44, 0x33, 0x22, 0x11]);
        assert_eq!(memory.load_u16(4), Ok(0x3344));
        assert_eq!(memory.load_u16(6), Ok(0x1122));
        assert_eq!(memory.load_u8(7), Ok(0x11));
    }

    #[test]
    fn unaligned_accesses_are_allowed() {
        let mut memory = Memory::new(16).expect("allocates");
        memory.store_u32(3, 0xDEAD_BEEF).expect("in bounds");
        assert_eq!(memory.load_u32(3), Ok(0xDEAD_BEEF));
        memory.store_u16(9, 0xCAFE).expect("in bounds");
        assert_eq!(memory.load_u16(9), Ok(0xCAFE));
    }

    #[test]
    fn access_straddling_the_end_is_rejected() {
        let mut memory = Memory::new(16).expect("allocates");
        assert_eq!(
            memory.load_u32(13),
            Err(MemError {
                addr: 13,
                width: 4,
                size: 16
            })
        );
        assert!(memory.store_u16(15, 0).is_err());
        assert!(memory.store_u8(16, 0).is_err());
        assert_eq!(memory.load_u8(15), Ok(0));
    }

    #[test]
    fn write_words_lays_out_consecutive_words() {
        let mut memory = Memory::new(12).expect("allocates");
        memory
            .write_words(0, &[0x00F0_0313, 0x0063_0393, 0x0063_8433])
            .expect("fits");
        assert_eq!(memory.load_u32(8), Ok(0x0063_8433));
        assert!(memory.write_words(8, &[1, 2]).is_err());
        assert_eq!(memory.load_u32(8), Ok(1));
    }

    #[test]
    fn read_range_is_bounds_checked() {
        let mut memory = Memory::new(8).expect("allocates");
        memory.store_u32(0, 0x6C6C_6548).expect("in bounds");
        assert_eq!(memory.read_range(0, 4), Ok(&b"Hell"[..]));
        assert_eq!(memory.read_range(8, 0), Ok(&[][..]));
        assert!(memory.read_range(6, 4).is_err());
    }

    #[test]
    fn allocation_failure_is_reported() {
        assert!(Memory::new(usize::MAX).is_err());
    }
}
