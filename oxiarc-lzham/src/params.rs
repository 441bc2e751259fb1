//! Compression parameters and their validation.
//!
//! [`CompressParams`] is what callers fill in. [`InitParams`] is the
//! validated, normalized form the compressor is built from; it is produced
//! once per compressor lifetime by [`InitParams::from_params`].

use crate::error::{LzhamError, Result};
use crate::tables::{
    DEFAULT_BEST_ARRIVALS, DEFAULT_TABLE_UPDATE_RATE, FASTEST_TABLE_UPDATE_RATE, LEVEL_SETTINGS,
    MAX_BEST_ARRIVALS, MAX_DICT_SIZE_LOG2, MAX_FAST_BYTES, MAX_HELPER_THREADS, MIN_DICT_SIZE_LOG2,
    MAX_TABLE_UPDATE_INTERVAL, MAX_TABLE_UPDATE_SLOW_RATE, MIN_FAST_BYTES, TABLE_UPDATE_SETTINGS,
};
use tracing::debug;

/// Compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum CompressLevel {
    /// Minimal search, no length-2 matches.
    Fastest = 0,
    /// Light search.
    Faster = 1,
    /// Balanced.
    #[default]
    Default = 2,
    /// Deeper search.
    Better = 3,
    /// Deepest search; enables extreme parsing when requested.
    Uber = 4,
}

impl CompressLevel {
    /// Number of levels.
    pub const COUNT: usize = 5;

    /// All levels from fastest to slowest.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Fastest,
        Self::Faster,
        Self::Default,
        Self::Better,
        Self::Uber,
    ];

    /// Index into the per-level tuning table.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Level hint stored in the two top bits of the zlib FLG byte.
    pub fn zlib_level_hint(self) -> u8 {
        match self {
            Self::Fastest => 0,
            Self::Faster => 1,
            Self::Default | Self::Better => 2,
            Self::Uber => 3,
        }
    }
}

impl TryFrom<u32> for CompressLevel {
    type Error = LzhamError;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| LzhamError::invalid_parameter(format!("unknown compression level {value}")))
    }
}

/// Compression flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CompressFlags(u32);

impl CompressFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Use the extreme parser settings (highest level only).
    pub const EXTREME_PARSING: Self = Self(2);
    /// Output must not depend on scheduling.
    pub const DETERMINISTIC_PARSING: Self = Self(4);
    /// Restart Huffman update cadence every block, trading decode speed for ratio.
    pub const TRADEOFF_DECOMPRESSION_RATE_FOR_RATIO: Self = Self(16);
    /// Frame the stream with a zlib header.
    pub const WRITE_ZLIB_STREAM: Self = Self(32);
    /// Never use helper threads.
    pub const FORCE_SINGLE_THREADED_PARSING: Self = Self(64);
    /// Use the 16-bit hash even at higher levels.
    pub const USE_LOW_MEMORY_MATCH_FINDER: Self = Self(128);

    /// Flags from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for CompressFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for CompressFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Caller-facing compression parameters.
///
/// Zero in any of the advanced fields means "use the default".
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CompressParams {
    /// log2 of the dictionary size.
    pub dict_size_log2: u32,
    /// Compression level.
    pub level: CompressLevel,
    /// 0 for the default, otherwise 1 (best ratio) to 20 (fastest decode).
    pub table_update_rate: u32,
    /// Requested helper threads, -1 for "as many as practical".
    pub max_helper_threads: i32,
    /// Compression flags.
    pub compress_flags: CompressFlags,
    /// Number of seed bytes taken from `seed_bytes`.
    pub num_seed_bytes: u32,
    /// Seed dictionary for delta compression.
    pub seed_bytes: Option<Vec<u8>>,
    /// Overrides `table_update_rate` when this or the slow rate is nonzero.
    pub table_max_update_interval: u32,
    /// Interval growth factor scaled by 32; see `table_max_update_interval`.
    pub table_update_interval_slow_rate: u32,
    /// Parse-graph width for extreme parsing (0 for the default).
    pub extreme_parsing_max_best_arrivals: u32,
    /// Fast-bytes override (0 for the level default).
    pub fast_bytes: u32,
}

impl CompressParams {
    /// Parameters with the given dictionary size and level, everything else default.
    pub fn new(dict_size_log2: u32, level: CompressLevel) -> Self {
        Self {
            dict_size_log2,
            level,
            ..Self::default()
        }
    }

    /// Set the seed dictionary.
    pub fn with_seed_bytes(mut self, seed: impl Into<Vec<u8>>) -> Self {
        let seed = seed.into();
        self.num_seed_bytes = seed.len() as u32;
        self.seed_bytes = Some(seed);
        self
    }

    /// Add compression flags.
    pub fn with_flags(mut self, flags: CompressFlags) -> Self {
        self.compress_flags |= flags;
        self
    }
}

impl Default for CompressParams {
    fn default() -> Self {
        Self {
            dict_size_log2: 20,
            level: CompressLevel::Default,
            table_update_rate: 0,
            max_helper_threads: 0,
            compress_flags: CompressFlags::NONE,
            num_seed_bytes: 0,
            seed_bytes: None,
            table_max_update_interval: 0,
            table_update_interval_slow_rate: 0,
            extreme_parsing_max_best_arrivals: 0,
            fast_bytes: 0,
        }
    }
}

/// Validated compressor parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitParams {
    /// log2 of the dictionary size.
    pub dict_size_log2: u32,
    /// Compression level.
    pub compression_level: CompressLevel,
    /// Helper threads after clamping; the compressor forces this to 0.
    pub max_helper_threads: u32,
    /// Seed dictionary (exactly `num_seed_bytes` long, empty when unused).
    pub seed_bytes: Vec<u8>,
    /// Compression flags.
    pub compress_flags: CompressFlags,
    /// Resolved Huffman max update interval.
    pub table_max_update_interval: u32,
    /// Resolved Huffman update slow rate.
    pub table_update_interval_slow_rate: u32,
    /// Parse-graph width, in `[2, 8]`.
    pub extreme_parsing_max_best_arrivals: u32,
    /// Fast-bytes override, 0 when the level decides.
    pub fast_bytes_override: u32,
}

impl InitParams {
    /// Validate caller parameters and derive the internal settings.
    pub fn from_params(params: &CompressParams) -> Result<Self> {
        validate_dict_size_log2(params.dict_size_log2)?;

        if params.extreme_parsing_max_best_arrivals > MAX_BEST_ARRIVALS {
            return Err(LzhamError::invalid_parameter(format!(
                "extreme_parsing_max_best_arrivals {} exceeds {MAX_BEST_ARRIVALS}",
                params.extreme_parsing_max_best_arrivals
            )));
        }
        let extreme_parsing_max_best_arrivals = if params.extreme_parsing_max_best_arrivals <= 1 {
            DEFAULT_BEST_ARRIVALS
        } else {
            params.extreme_parsing_max_best_arrivals
        };

        let fast_bytes_override = if params.fast_bytes > 0 {
            params.fast_bytes.clamp(MIN_FAST_BYTES, MAX_FAST_BYTES)
        } else {
            0
        };

        let max_helper_threads = params.max_helper_threads.clamp(0, MAX_HELPER_THREADS) as u32;

        let seed_bytes = if params.num_seed_bytes > 0 {
            let dict_size = 1u64 << params.dict_size_log2;
            let seed = params.seed_bytes.as_deref().ok_or_else(|| {
                LzhamError::invalid_parameter("num_seed_bytes is set but no seed buffer was given")
            })?;
            if params.num_seed_bytes as u64 > dict_size {
                return Err(LzhamError::invalid_parameter(format!(
                    "{} seed bytes exceed the {dict_size} byte dictionary",
                    params.num_seed_bytes
                )));
            }
            let count = params.num_seed_bytes as usize;
            if seed.len() < count {
                return Err(LzhamError::invalid_parameter(format!(
                    "seed buffer holds {} bytes, {count} declared",
                    seed.len()
                )));
            }
            seed[..count].to_vec()
        } else {
            Vec::new()
        };

        if params.table_max_update_interval > MAX_TABLE_UPDATE_INTERVAL {
            return Err(LzhamError::invalid_parameter(format!(
                "table_max_update_interval {} exceeds {MAX_TABLE_UPDATE_INTERVAL}",
                params.table_max_update_interval
            )));
        }
        if params.table_update_interval_slow_rate > MAX_TABLE_UPDATE_SLOW_RATE {
            return Err(LzhamError::invalid_parameter(format!(
                "table_update_interval_slow_rate {} exceeds {MAX_TABLE_UPDATE_SLOW_RATE}",
                params.table_update_interval_slow_rate
            )));
        }

        let (table_max_update_interval, table_update_interval_slow_rate) =
            if params.table_max_update_interval > 0 || params.table_update_interval_slow_rate > 0 {
                (
                    params.table_max_update_interval,
                    params.table_update_interval_slow_rate,
                )
            } else {
                let rate = if params.table_update_rate == 0 {
                    DEFAULT_TABLE_UPDATE_RATE
                } else {
                    params.table_update_rate
                };
                let index = (rate.clamp(1, FASTEST_TABLE_UPDATE_RATE) - 1) as usize;
                let settings = TABLE_UPDATE_SETTINGS[index];
                (
                    settings.max_update_interval as u32,
                    settings.slow_rate as u32,
                )
            };

        debug!(
            dict_size_log2 = params.dict_size_log2,
            level = ?params.level,
            table_max_update_interval,
            table_update_interval_slow_rate,
            seed_bytes = seed_bytes.len(),
            "validated compression parameters"
        );

        Ok(Self {
            dict_size_log2: params.dict_size_log2,
            compression_level: params.level,
            max_helper_threads,
            seed_bytes,
            compress_flags: params.compress_flags,
            table_max_update_interval,
            table_update_interval_slow_rate,
            extreme_parsing_max_best_arrivals,
            fast_bytes_override,
        })
    }

    /// Dictionary size in bytes.
    pub fn dict_size(&self) -> u32 {
        1 << self.dict_size_log2
    }

    /// Whether extreme parsing is in effect (requested and at the highest level).
    pub fn extreme_parsing(&self) -> bool {
        self.compress_flags.contains(CompressFlags::EXTREME_PARSING)
            && self.compression_level == CompressLevel::Uber
    }

    /// Fast bytes the parser uses.
    pub fn fast_bytes(&self) -> u32 {
        if self.fast_bytes_override > 0 {
            self.fast_bytes_override
        } else if self.extreme_parsing() {
            crate::tables::EXTREME_PARSING_FAST_BYTES
        } else {
            LEVEL_SETTINGS[self.compression_level.index()].fast_bytes
        }
    }
}

/// Reject dictionary sizes outside the supported range.
pub fn validate_dict_size_log2(dict_size_log2: u32) -> Result<()> {
    if (MIN_DICT_SIZE_LOG2..=MAX_DICT_SIZE_LOG2).contains(&dict_size_log2) {
        Ok(())
    } else {
        Err(LzhamError::InvalidDictSizeLog2(dict_size_log2))
    }
}
