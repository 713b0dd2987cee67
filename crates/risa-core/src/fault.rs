use thiserror::Error;

/// Fault classes used for log aggregation and exit-status policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Decoder or dispatch rejected an instruction encoding.
    Decode,
    /// Fetch, load, store, or program-counter bound violation.
    Memory,
    /// Configuration or allocation rejected before the first cycle.
    Setup,
}

/// Closed fault taxonomy for everything that can stop a hart abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// Unmapped opcode or unrecognized funct/opcode combination.
    #[error("illegal instruction sequence")]
    IllegalSequence = 0x01,
    /// Memory access or program counter outside the configured memory size.
    #[error("address fault")]
    AddressFault = 0x02,
    /// Memory buffer allocation failed during setup.
    #[error("out of memory")]
    OutOfMemory = 0x03,
    /// Configuration value rejected during setup.
    #[error("invalid configuration")]
    InvalidConfiguration = 0x04,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::IllegalSequence),
            0x02 => Some(Self::AddressFault),
            0x03 => Some(Self::OutOfMemory),
            0x04 => Some(Self::InvalidConfiguration),
            _ => None,
        }
    }

    /// Returns the fault class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::IllegalSequence => FaultClass::Decode,
            Self::AddressFault => FaultClass::Memory,
            Self::OutOfMemory | Self::InvalidConfiguration => FaultClass::Setup,
        }
    }

    /// Process exit status reported for this fault at the outermost boundary.
    ///
    /// Values follow the conventional host numbering (`EILSEQ`, `EFAULT`,
    /// `ENOMEM`, `EINVAL`) so scripts written against other simulators keep
    /// working.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::IllegalSequence => 84,
            Self::AddressFault => 14,
            Self::OutOfMemory => 12,
            Self::InvalidConfiguration => 22,
        }
    }
}

/// Errors raised while building a hart, before the first cycle runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// A configuration field is out of its accepted range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
    /// The memory buffer could not be allocated.
    #[error("could not allocate {size} bytes of simulator memory")]
    OutOfMemory {
        /// Requested memory size in bytes.
        size: usize,
    },
    /// The program image does not fit in the configured memory.
    #[error("image of {image_len} bytes does not fit in {mem_size} bytes of memory")]
    ImageTooLarge {
        /// Image length in bytes.
        image_len: usize,
        /// Configured memory size in bytes.
        mem_size: usize,
    },
    /// No built-in handler set has the requested name.
    #[error("unknown handler set '{0}'")]
    UnknownHandlerSet(String),
}

impl SetupError {
    /// Maps a setup error onto the runtime fault taxonomy.
    #[must_use]
    pub const fn fault_code(&self) -> FaultCode {
        match self {
            Self::OutOfMemory { .. } => FaultCode::OutOfMemory,
            Self::InvalidConfiguration(_)
            | Self::ImageTooLarge { .. }
            | Self::UnknownHandlerSet(_) => FaultCode::InvalidConfiguration,
        }
    }
}

impl From<SetupError> for FaultCode {
    fn from(error: SetupError) -> Self {
        error.fault_code()
    }
}
