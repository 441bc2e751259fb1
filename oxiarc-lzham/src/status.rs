//! Status, flush and flag vocabulary shared with LZHAM-compatible callers.
//!
//! Numeric values are part of the external interface. For both status
//! enums every code at or above [`FIRST_SUCCESS_OR_FAILURE_CODE`] is
//! terminal: the stream either finished or failed and needs a reinit.

/// First terminal status code (equal to `Success`).
pub const FIRST_SUCCESS_OR_FAILURE_CODE: u32 = 3;

/// First failure code of [`CompressStatus`].
pub const COMP_FIRST_FAILURE_CODE: u32 = 4;

/// First failure code of [`DecompressStatus`].
pub const DECOMP_FIRST_FAILURE_CODE: u32 = 4;

/// Result of a compression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CompressStatus {
    /// Nothing has been processed yet.
    NotFinished = 0,
    /// All input consumed; call again with more input or a flush.
    NeedsMoreInput = 1,
    /// Output buffer filled; call again to drain.
    HasMoreOutput = 2,
    /// Stream finished.
    Success = 3,
    /// Generic failure.
    Failed = 4,
    /// Initialization failed.
    FailedInitializing = 5,
    /// A parameter was out of range.
    InvalidParameter = 6,
    /// The destination buffer was too small.
    OutputBufTooSmall = 7,
}

impl CompressStatus {
    /// Numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Whether no further progress is possible without a reinit.
    pub fn is_terminal(self) -> bool {
        self.code() >= FIRST_SUCCESS_OR_FAILURE_CODE
    }

    /// Whether this is a failure code.
    pub fn is_failure(self) -> bool {
        self.code() >= COMP_FIRST_FAILURE_CODE
    }
}

/// Result of a decompression call.
///
/// Only the vocabulary lives here; stream decoding is a separate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DecompressStatus {
    /// Nothing has been processed yet.
    NotFinished = 0,
    /// Output buffer filled; call again to drain.
    HasMoreOutput = 1,
    /// All input consumed.
    NeedsMoreInput = 2,
    /// Stream decoded and verified.
    Success = 3,
    /// Initialization failed.
    FailedInitializing = 4,
    /// Destination buffer too small for unbuffered output.
    FailedDestBufTooSmall = 5,
    /// Raw block ended early.
    FailedExpectedMoreRawBytes = 6,
    /// Invalid entropy code.
    FailedBadCode = 7,
    /// Adler-32 trailer mismatch.
    FailedAdler32 = 8,
    /// Malformed raw block.
    FailedBadRawBlock = 9,
    /// Block check bits mismatch.
    FailedBadCompBlockSyncCheck = 10,
    /// zlib header invalid.
    FailedBadZlibHeader = 11,
    /// Stream was compressed against seed bytes that were not supplied.
    FailedNeedSeedBytes = 12,
    /// Seed bytes supplied but invalid.
    FailedBadSeedBytes = 13,
    /// Malformed sync block.
    FailedBadSyncBlock = 14,
    /// A parameter was out of range.
    InvalidParameter = 15,
}

impl DecompressStatus {
    /// Numeric code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Whether no further progress is possible without a reinit.
    pub fn is_terminal(self) -> bool {
        self.code() >= FIRST_SUCCESS_OR_FAILURE_CODE
    }

    /// Whether this is a failure code.
    pub fn is_failure(self) -> bool {
        self.code() >= DECOMP_FIRST_FAILURE_CODE
    }
}

/// Flush request passed to the streaming compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum FlushMode {
    /// Buffer input until a full block is available.
    #[default]
    None = 0,
    /// Compress pending input and emit a sync block.
    Sync = 2,
    /// Like `Sync`, and reset the coding state.
    Full = 3,
    /// Compress pending input and finish the stream.
    Finish = 4,
    /// Like `Sync`, and restart the Huffman table update cadence.
    Table = 10,
}

impl FlushMode {
    /// Flush type written into a sync block, if this mode emits one.
    pub(crate) fn sync_flush_type(self) -> Option<u32> {
        match self {
            Self::Sync => Some(0),
            Self::Full => Some(1),
            Self::Table => Some(2),
            Self::None | Self::Finish => None,
        }
    }
}

/// Decompression flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecompressFlags(u32);

impl DecompressFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Output goes straight to the caller buffer, which must hold everything.
    pub const OUTPUT_UNBUFFERED: Self = Self(1);
    /// Verify the Adler-32 trailer.
    pub const COMPUTE_ADLER32: Self = Self(2);
    /// Expect zlib framing.
    pub const READ_ZLIB_STREAM: Self = Self(4);

    /// Raw bit value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DecompressFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
