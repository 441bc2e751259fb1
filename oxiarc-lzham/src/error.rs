//! LZHAM-specific error types.

use crate::status::CompressStatus;
use crate::symbol_codec::CodecMode;
use oxiarc_core::OxiArcError;
use thiserror::Error;

/// LZHAM compression errors.
#[derive(Debug, Error)]
pub enum LzhamError {
    /// Dictionary size exponent outside the supported range.
    #[error("Invalid dictionary size log2: {0} (must be {min}-{max})",
        min = crate::tables::MIN_DICT_SIZE_LOG2,
        max = crate::tables::MAX_DICT_SIZE_LOG2)]
    InvalidDictSizeLog2(u32),

    /// A compression parameter was out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Compressor construction failed.
    #[error("Compressor initialization failed: {0}")]
    FailedInitializing(String),

    /// Reinit was asked to restart a compressor that does not exist.
    #[error("No compressor state to reinitialize")]
    NilCompressState,

    /// A codec primitive was used in the wrong mode.
    #[error("Symbol codec is in {actual:?} mode, operation requires {expected:?}")]
    InvalidCodecState {
        /// Mode the operation needs.
        expected: CodecMode,
        /// Mode the codec is in.
        actual: CodecMode,
    },

    /// The destination buffer cannot hold the compressed stream.
    #[error("Output buffer too small: need at least {needed} bytes, have {available}")]
    OutputBufTooSmall {
        /// Bytes produced so far (a lower bound of what is needed).
        needed: usize,
        /// Capacity of the destination.
        available: usize,
    },

    /// Error from the shared core crate.
    #[error(transparent)]
    Core(#[from] OxiArcError),
}

/// Result type for LZHAM operations.
pub type Result<T> = std::result::Result<T, LzhamError>;

impl LzhamError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    /// Create an initialization failure.
    pub fn failed_initializing(message: impl Into<String>) -> Self {
        Self::FailedInitializing(message.into())
    }

    /// Status code reported to streaming callers for this error.
    pub fn status(&self) -> CompressStatus {
        match self {
            Self::InvalidDictSizeLog2(_) | Self::InvalidParameter(_) | Self::NilCompressState => {
                CompressStatus::InvalidParameter
            }
            Self::FailedInitializing(_) => CompressStatus::FailedInitializing,
            Self::OutputBufTooSmall { .. } => CompressStatus::OutputBufTooSmall,
            Self::InvalidCodecState { .. } | Self::Core(_) => CompressStatus::Failed,
        }
    }
}
