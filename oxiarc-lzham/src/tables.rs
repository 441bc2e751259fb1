//! Format constants, LZX-style distance slots and per-level tuning tables.
//!
//! Distances are coded as a *position slot* plus extra bits. Slot `s` covers
//! `[POSITION_BASE[s], POSITION_BASE[s] + POSITION_EXTRA_MASK[s]]` and the
//! slots partition the distance range without gaps or overlap. Three lookup
//! tables built at compile time map a distance to its slot for
//! `d < 2^24`; the remaining slots are reached arithmetically.

/// Shortest encodable match.
pub const MIN_MATCH_LEN: u32 = 2;
/// Longest match the parser emits.
pub const MAX_MATCH_LEN: u32 = 257;
/// Longest match a huge-match code can describe; also the mirror region bound.
pub const MAX_HUGE_MATCH_LEN: u32 = 65536;

/// Smallest supported dictionary (32 KiB).
pub const MIN_DICT_SIZE_LOG2: u32 = 15;
/// Largest supported dictionary.
#[cfg(target_pointer_width = "64")]
pub const MAX_DICT_SIZE_LOG2: u32 = 29;
/// Largest supported dictionary.
#[cfg(not(target_pointer_width = "64"))]
pub const MAX_DICT_SIZE_LOG2: u32 = 26;

/// Number of recent distances kept for rep matches.
pub const MATCH_HIST_SIZE: usize = 4;
/// Farthest distance a length-2 match may use.
pub const MAX_LEN2_MATCH_DIST: u32 = 2047;

/// Number of reserved `main_len` symbols below the first match length.
pub const NUM_SPECIAL_LENGTHS: u32 = 2;
/// `main_len` symbol terminating a compressed block.
pub const SPECIAL_CODE_END_OF_BLOCK: u32 = 0;
/// `main_len` symbol requesting a partial coding-state reset.
pub const SPECIAL_CODE_PARTIAL_STATE_RESET: u32 = 1;

/// Number of slot table entries.
pub const MAX_POSITION_SLOTS: usize = 128;

/// Bits used by the block type field.
pub const BLOCK_HEADER_BITS: u32 = 2;
/// Bits used by the block check field.
pub const BLOCK_CHECK_BITS: u32 = 4;
/// Bits used by the sync block flush type.
pub const BLOCK_FLUSH_TYPE_BITS: u32 = 2;

/// Number of states in the LZ coding state machine.
pub const NUM_STATES: usize = 12;
/// States below this value follow a literal.
pub const NUM_LIT_STATES: usize = 7;

/// Block kinds written in the 2-bit block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BlockType {
    /// Flush marker.
    Sync = 0,
    /// Entropy-coded LZ block.
    Comp = 1,
    /// Stored bytes.
    Raw = 2,
    /// End of stream with Adler-32 trailer.
    Eof = 3,
}

/// Default uncompressed block size (512 KiB).
pub const DEFAULT_BLOCK_SIZE: u32 = 2 << 18;

/// Fast-bytes override bounds.
pub const MIN_FAST_BYTES: u32 = 8;
/// Upper bound of the fast-bytes override.
pub const MAX_FAST_BYTES: u32 = 258;
/// Fast bytes used by extreme parsing at the highest level.
pub const EXTREME_PARSING_FAST_BYTES: u32 = 96;

/// Maximum `extreme_parsing_max_best_arrivals`.
pub const MAX_BEST_ARRIVALS: u32 = 8;
/// Best arrivals used when the caller passes 0 or 1.
pub const DEFAULT_BEST_ARRIVALS: u32 = 4;

/// Maximum helper thread count accepted from callers.
pub const MAX_HELPER_THREADS: i32 = 64;

/// Default `table_update_rate`.
pub const DEFAULT_TABLE_UPDATE_RATE: u32 = 8;
/// Fastest (largest) `table_update_rate`.
pub const FASTEST_TABLE_UPDATE_RATE: u32 = 20;
/// Largest accepted explicit `table_max_update_interval`.
pub const MAX_TABLE_UPDATE_INTERVAL: u32 = 2048;
/// Largest accepted explicit `table_update_interval_slow_rate`.
pub const MAX_TABLE_UPDATE_SLOW_RATE: u32 = 1024;

/// zlib compression method identifier for LZHAM streams.
pub const ZLIB_METHOD_LZHAM: u8 = 14;
/// zlib compression method identifier for deflate streams.
pub const ZLIB_METHOD_DEFLATED: u8 = 8;

const fn extra_bits_for_slot(slot: usize) -> u32 {
    if slot < 4 {
        0
    } else if slot < 52 {
        (slot as u32 - 2) / 2
    } else {
        25
    }
}

/// Extra (offset) bits per slot.
pub const POSITION_EXTRA_BITS: [u8; MAX_POSITION_SLOTS] = {
    let mut bits = [0u8; MAX_POSITION_SLOTS];
    let mut i = 0;
    while i < MAX_POSITION_SLOTS {
        bits[i] = extra_bits_for_slot(i) as u8;
        i += 1;
    }
    bits
};

/// Mask of the extra bits per slot.
pub const POSITION_EXTRA_MASK: [u32; MAX_POSITION_SLOTS] = {
    let mut mask = [0u32; MAX_POSITION_SLOTS];
    let mut i = 0;
    while i < MAX_POSITION_SLOTS {
        mask[i] = (1u32 << extra_bits_for_slot(i)) - 1;
        i += 1;
    }
    mask
};

/// First distance of each slot.
pub const POSITION_BASE: [u32; MAX_POSITION_SLOTS] = {
    let mut base = [0u32; MAX_POSITION_SLOTS];
    let mut i = 1;
    while i < MAX_POSITION_SLOTS {
        base[i] = base[i - 1] + (1u32 << extra_bits_for_slot(i - 1));
        i += 1;
    }
    base
};

/// Fill a slot lookup for the slots whose last distance is in `[lo_limit, hi_limit)`.
const fn fill_slot_table<const N: usize>(lo_limit: u32, hi_limit: u32, shift: u32) -> [u8; N] {
    let mut tab = [0u8; N];
    let mut slot = 0;
    while slot < MAX_POSITION_SLOTS {
        let lo = POSITION_BASE[slot];
        let hi = lo + POSITION_EXTRA_MASK[slot];
        if hi >= hi_limit {
            break;
        }
        if hi >= lo_limit {
            let mut j = lo >> shift;
            while j <= hi >> shift {
                tab[j as usize] = slot as u8;
                j += 1;
            }
        }
        slot += 1;
    }
    tab
}

/// Slot lookup for `d < 0x1000`, indexed by `d`.
const SLOT_TAB0: [u8; 4096] = fill_slot_table(0, 0x1000, 0);
/// Slot lookup for `d < 0x100000`, indexed by `d >> 11`.
const SLOT_TAB1: [u8; 512] = fill_slot_table(0x1000, 0x10_0000, 11);
/// Slot lookup for `d < 0x1000000`, indexed by `d >> 16`.
const SLOT_TAB2: [u8; 256] = fill_slot_table(0x10_0000, 0x100_0000, 16);

/// Map a match distance to `(slot, extra_offset)`.
///
/// `distance == POSITION_BASE[slot] + extra_offset` and
/// `extra_offset <= POSITION_EXTRA_MASK[slot]`.
#[inline]
pub fn compute_position_slot(distance: u32) -> (u32, u32) {
    let slot = if distance < 0x1000 {
        SLOT_TAB0[distance as usize] as u32
    } else if distance < 0x10_0000 {
        SLOT_TAB1[(distance >> 11) as usize] as u32
    } else if distance < 0x100_0000 {
        SLOT_TAB2[(distance >> 16) as usize] as u32
    } else if distance < 0x200_0000 {
        48 + ((distance - 0x100_0000) >> 23)
    } else if distance < 0x400_0000 {
        50 + ((distance - 0x200_0000) >> 24)
    } else {
        52 + ((distance - 0x400_0000) >> 25)
    };

    let offset = (distance - POSITION_BASE[slot as usize]) & POSITION_EXTRA_MASK[slot as usize];
    (slot, offset)
}

/// Number of slots needed to reach every distance below `dict_size`.
pub fn num_position_slots(dict_size: u32) -> u32 {
    compute_position_slot(dict_size - 1).0 + 1
}

/// Huffman table update cadence for one `table_update_rate` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableUpdateSettings {
    /// Upper bound of the symbols-between-rebuilds interval (scaled).
    pub max_update_interval: u16,
    /// Interval growth factor, scaled by 32.
    pub slow_rate: u16,
}

const fn tus(max_update_interval: u16, slow_rate: u16) -> TableUpdateSettings {
    TableUpdateSettings {
        max_update_interval,
        slow_rate,
    }
}

/// Indexed by `table_update_rate - 1`; index 0 adapts the slowest.
pub const TABLE_UPDATE_SETTINGS: [TableUpdateSettings; 20] = [
    tus(4, 32),
    tus(5, 33),
    tus(6, 34),
    tus(7, 35),
    tus(8, 36),
    tus(16, 48),
    tus(32, 72),
    tus(64, 64),
    tus(98, 80),
    tus(128, 96),
    tus(192, 112),
    tus(256, 128),
    tus(512, 160),
    tus(1024, 192),
    tus(2048, 224),
    tus(2048, 256),
    tus(2048, 288),
    tus(2048, 320),
    tus(2048, 352),
    tus(2048, 384),
];

/// Match search effort of one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompSettings {
    /// Match length at which the parser stops looking for better options.
    pub fast_bytes: u32,
    /// Candidates kept per position (`u32::MAX` keeps as many as probed).
    pub match_accel_max_matches_per_probe: u32,
    /// Tree nodes visited per position.
    pub match_accel_max_probes: u32,
}

/// Indexed by [`CompressLevel`](crate::params::CompressLevel).
pub const LEVEL_SETTINGS: [CompSettings; 5] = [
    CompSettings {
        fast_bytes: 8,
        match_accel_max_matches_per_probe: 1,
        match_accel_max_probes: 2,
    },
    CompSettings {
        fast_bytes: 24,
        match_accel_max_matches_per_probe: 6,
        match_accel_max_probes: 12,
    },
    CompSettings {
        fast_bytes: 32,
        match_accel_max_matches_per_probe: u32::MAX,
        match_accel_max_probes: 16,
    },
    CompSettings {
        fast_bytes: 48,
        match_accel_max_matches_per_probe: u32::MAX,
        match_accel_max_probes: 32,
    },
    CompSettings {
        fast_bytes: 64,
        match_accel_max_matches_per_probe: u32::MAX,
        match_accel_max_probes: 128,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_position_base_values() {
        assert_eq!(POSITION_BASE[4], 0x4);
        assert_eq!(POSITION_BASE[24], 0x1000);
        assert_eq!(POSITION_BASE[47], 0xC0_0000);
        assert_eq!(POSITION_BASE[48], 0x100_0000);
        assert_eq!(POSITION_BASE[53], 0x600_0000);
        assert_eq!(POSITION_BASE[127], 0x9A00_0000);
        assert_eq!(POSITION_EXTRA_BITS[48], 23);
        assert_eq!(POSITION_EXTRA_BITS[50], 24);
        assert_eq!(POSITION_EXTRA_MASK[60], 0x1FF_FFFF);
    }

    #[test]
    fn test_slots_are_contiguous() {
        for s in 1..MAX_POSITION_SLOTS {
            assert_eq!(
                POSITION_BASE[s],
                POSITION_BASE[s - 1] + POSITION_EXTRA_MASK[s - 1] + 1
            );
        }
    }

    #[test]
    fn test_slot_boundaries() {
        for s in 0..66usize {
            let lo = POSITION_BASE[s];
            let hi = lo + POSITION_EXTRA_MASK[s];
            assert_eq!(compute_position_slot(lo), (s as u32, 0), "slot {s} low");
            assert_eq!(
                compute_position_slot(hi),
                (s as u32, POSITION_EXTRA_MASK[s]),
                "slot {s} high"
            );
        }
    }

    #[test]
    fn test_small_distances_exhaustive() {
        for d in 0..0x2_0000u32 {
            let (slot, ofs) = compute_position_slot(d);
            assert_eq!(POSITION_BASE[slot as usize] + ofs, d);
            assert!(ofs <= POSITION_EXTRA_MASK[slot as usize]);
        }
    }

    #[test]
    fn test_max_slot_for_largest_dictionary() {
        assert_eq!(compute_position_slot((1 << 29) - 1).0, 65);
        assert_eq!(num_position_slots(1 << 15), 30);
        assert_eq!(num_position_slots(1 << 29), 66);
    }

    #[test]
    fn test_tuning_tables() {
        assert_eq!(TABLE_UPDATE_SETTINGS[7], tus(64, 64));
        assert_eq!(TABLE_UPDATE_SETTINGS[19], tus(2048, 384));
        assert_eq!(LEVEL_SETTINGS[2].fast_bytes, 32);
        assert_eq!(LEVEL_SETTINGS[4].match_accel_max_probes, 128);
    }

    proptest! {
        #[test]
        fn prop_slot_partition(d in 0u32..(1u32 << 29)) {
            let (slot, ofs) = compute_position_slot(d);
            prop_assert!((slot as usize) < MAX_POSITION_SLOTS);
            prop_assert!(ofs <= POSITION_EXTRA_MASK[slot as usize]);
            prop_assert_eq!(POSITION_BASE[slot as usize] + ofs, d);
        }
    }
}
