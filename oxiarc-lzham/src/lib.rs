//! # OxiArc LZHAM
//!
//! LZHAM-style LZ77 compression: a sliding-window binary-tree match finder
//! feeding an adaptive entropy coder that mixes arithmetic-coded decisions
//! with quasi-adaptive Huffman symbols.
//!
//! ## Features
//!
//! - **Pure Rust** compressor with five levels, `Fastest` to `Uber`
//! - Dictionaries from 32 KiB to 512 MiB (64 MiB on 32-bit targets)
//! - Seeded (delta) compression against a caller-supplied prior buffer
//! - Optional zlib-compatible framing (method 14)
//! - Sync, full and table flushes; Adler-32 stream trailer
//! - Streaming API with bounded output buffers
//!
//! ## Usage
//!
//! ```ignore
//! use oxiarc_lzham::{CompressLevel, CompressParams, compress_to_vec};
//!
//! let params = CompressParams::new(20, CompressLevel::Default);
//! let compressed = compress_to_vec(&params, b"Hello, Hello, Hello!")?;
//! ```
//!
//! ### Streaming
//!
//! ```ignore
//! use oxiarc_lzham::{CompressParams, CompressState, CompressStatus, FlushMode};
//!
//! let mut state = CompressState::init(&CompressParams::default())?;
//! let mut out = vec![0u8; 4096];
//! let (consumed, written, status) = state.compress(input, &mut out, FlushMode::Finish);
//! ```
//!
//! ## Stream Format
//!
//! An optional two-byte zlib header is followed by byte-aligned blocks, each
//! starting with a 2-bit type and a 4-bit block check:
//! 1. Compressed blocks (LZ decisions, arithmetic/Huffman coded)
//! 2. Raw blocks for data that does not compress
//! 3. Sync blocks written by flushes
//! 4. A final block carrying the Adler-32 of the source
//!
//! Decompression is provided separately; this crate defines only its status
//! and flag vocabulary.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod lzbase;
pub mod lzcomp;
pub mod match_accel;
pub mod model;
pub mod params;
pub mod parser;
pub mod stats;
pub mod status;
pub mod stream;
pub mod symbol_codec;
pub mod tables;

// Re-exports
pub use error::{LzhamError, Result};
pub use lzbase::{LzDecision, LzState};
pub use lzcomp::LzCompressor;
pub use match_accel::{AccelConfig, AccelFlags, DictMatch, SearchAccelerator};
pub use model::{AdaptiveBitModel, QuasiAdaptiveHuffmanModel};
pub use params::{CompressFlags, CompressLevel, CompressParams, InitParams};
pub use stats::{CodingStats, TrackedStat};
pub use status::{CompressStatus, DecompressFlags, DecompressStatus, FlushMode};
pub use stream::{CompressState, compress_memory, compress_to_vec};
pub use symbol_codec::{CodecMode, SymbolCodec};
pub use tables::{compute_position_slot, num_position_slots};

/// Version of the LZHAM bitstream produced (major, minor).
pub const LZHAM_VERSION: (u32, u32) = (1, 0);

/// Library version string.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
