//! Raw program images and the optional boot vector at their start.

use tracing::info;

use crate::fault::SetupError;
use crate::hart::Hart;
use crate::memory::{MemError, Memory};
use crate::state::registers::SP;

/// Offset of the initial stack-pointer word.
pub const BOOT_SP_OFFSET: u32 = 0;
/// Offset of the initial program-counter word.
pub const BOOT_PC_OFFSET: u32 = 4;

/// Copies `image` verbatim to memory offset 0.
///
/// Bytes past the image keep their current value. A trailing partial word
/// reads back zero-padded from freshly allocated memory.
///
/// # Errors
///
/// Returns [`SetupError::ImageTooLarge`] when `image` is longer than memory.
pub fn load_image(image: &[u8], memory: &mut Memory) -> Result<(), SetupError> {
    let mem_size = memory.size();
    let Some(dest) = memory.as_bytes_mut().get_mut(..image.len()) else {
        return Err(SetupError::ImageTooLarge {
            image_len: image.len(),
            mem_size,
        });
    };
    dest.copy_from_slice(image);
    info!(bytes = image.len(), "image loaded");
    Ok(())
}

/// Initial stack pointer and program counter stored at the image start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BootVector {
    /// Initial `sp`.
    pub sp: u32,
    /// Initial `pc`.
    pub pc: u32,
}

impl BootVector {
    /// Reads the boot vector words from memory.
    ///
    /// # Errors
    ///
    /// Returns [`MemError`] when memory is too small to hold both words.
    pub fn read(memory: &Memory) -> Result<Self, MemError> {
        Ok(Self {
            sp: memory.load_u32(BOOT_SP_OFFSET)?,
            pc: memory.load_u32(BOOT_PC_OFFSET)?,
        })
    }

    /// Seeds `sp` and `pc` on `hart`.
    pub fn apply(self, hart: &mut Hart) {
        hart.set_reg(SP, self.sp);
        hart.set_pc(self.pc);
        info!(
            sp = format_args!("{:#010x}", self.sp),
            pc = format_args!("{:#010x}", self.pc),
            "boot vector applied"
        );
    }
}
