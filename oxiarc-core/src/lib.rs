//! # OxiArc Core
//!
//! Core components shared by the OxiArc codecs.
//!
//! - [`crc`]: CRC-32 checksum
//! - [`adler32`]: Adler-32 checksum
//! - [`error`]: Error types
//!
//! ## Example
//!
//! ```rust
//! use oxiarc_core::{Adler32, Crc32};
//!
//! assert_eq!(Crc32::compute(b"Hello, world!"), 0xEBE6C6E6);
//! assert_eq!(Adler32::checksum(b"Hello, world!"), 0x205E048A);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod adler32;
pub mod crc;
pub mod error;

// Re-exports for convenience
pub use adler32::{Adler32, adler32_update};
pub use crc::Crc32;
pub use error::{OxiArcError, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::adler32::Adler32;
    pub use crate::crc::Crc32;
    pub use crate::error::{OxiArcError, Result};
}
