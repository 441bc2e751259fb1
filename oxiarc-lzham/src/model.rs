//! Adaptive probability models driven by the symbol codec.
//!
//! - [`AdaptiveBitModel`]: an 11-bit probability for binary decisions,
//!   coded arithmetically.
//! - [`QuasiAdaptiveHuffmanModel`]: symbol frequencies with periodically
//!   rebuilt, length-limited canonical Huffman codes. Rebuilds start
//!   frequent and slow down geometrically, so the model adapts quickly at
//!   the start of a stream and costs little to maintain later.
//!
//! Encoder and decoder update both models identically after every symbol,
//! which keeps their code tables in lockstep without transmitting them.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Bits of precision of [`AdaptiveBitModel`] probabilities.
pub const ARITH_PROB_BITS: u32 = 11;
/// Probability of one (and initial probability of zero times two).
pub const ARITH_PROB_ONE: u32 = 1 << ARITH_PROB_BITS;
/// Adaptation shift of [`AdaptiveBitModel`].
pub const ARITH_MOVE_BITS: u32 = 5;

/// Longest Huffman code the models produce.
pub const MAX_CODE_SIZE: usize = 16;

/// Frequency total that triggers halving.
const MAX_TOTAL_FREQ: u32 = 32768;
/// Upper bound of the rebuild interval.
const MAX_UPDATE_CYCLE: u32 = 32767;
/// Interval used when no explicit maximum is configured.
pub const DEFAULT_MAX_UPDATE_INTERVAL: u32 = 64;
/// Slow rate used when none is configured.
pub const DEFAULT_SLOW_RATE: u32 = 64;

/// Adaptive binary model: probability that the next bit is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveBitModel {
    prob0: u16,
}

impl AdaptiveBitModel {
    /// Model with even odds.
    pub const fn new() -> Self {
        Self {
            prob0: (ARITH_PROB_ONE / 2) as u16,
        }
    }

    /// Restore even odds.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current probability of zero, scaled by `2^11`.
    #[inline]
    pub fn prob0(&self) -> u32 {
        self.prob0 as u32
    }

    /// Adapt towards `bit`.
    #[inline]
    pub fn update(&mut self, bit: bool) {
        if bit {
            self.prob0 -= self.prob0 >> ARITH_MOVE_BITS;
        } else {
            self.prob0 += ((ARITH_PROB_ONE - self.prob0 as u32) >> ARITH_MOVE_BITS) as u16;
        }
    }

    /// Estimated cost of coding `bit` in bits.
    pub fn cost(&self, bit: bool) -> f32 {
        let p0 = self.prob0 as f32 / ARITH_PROB_ONE as f32;
        let p = if bit { 1.0 - p0 } else { p0 };
        -p.log2()
    }
}

impl Default for AdaptiveBitModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical decode tables for one code length assignment.
#[derive(Debug, Clone, Default)]
struct DecodeTables {
    first_code: [i32; MAX_CODE_SIZE + 1],
    counts: [u32; MAX_CODE_SIZE + 1],
    offsets: [u32; MAX_CODE_SIZE + 1],
    /// Symbols ordered by (code size, symbol).
    sorted: Vec<u16>,
}

/// Frequency-driven Huffman model with a growing rebuild interval.
#[derive(Debug, Clone)]
pub struct QuasiAdaptiveHuffmanModel {
    total_syms: u32,
    sym_freq: Vec<u32>,
    code_sizes: Vec<u8>,
    codes: Vec<u16>,
    decode: DecodeTables,

    total_count: u32,
    update_cycle: u32,
    symbols_until_update: u32,
    max_cycle: u32,
    slow_rate: u32,
}

impl QuasiAdaptiveHuffmanModel {
    /// Model over `total_syms` symbols.
    ///
    /// `max_update_interval` bounds the rebuild interval (scaled by the
    /// alphabet size); `slow_rate / 32` is the interval growth factor per
    /// rebuild. Zero selects the defaults.
    pub fn new(total_syms: u32, max_update_interval: u32, slow_rate: u32) -> Self {
        let interval = if max_update_interval == 0 {
            DEFAULT_MAX_UPDATE_INTERVAL
        } else {
            max_update_interval
        };
        let slow_rate = if slow_rate == 0 {
            DEFAULT_SLOW_RATE
        } else {
            slow_rate
        };
        let max_cycle = (total_syms.max(24) + 6)
            .saturating_mul(interval)
            .min(MAX_UPDATE_CYCLE);

        let mut model = Self {
            total_syms,
            sym_freq: vec![1; total_syms as usize],
            code_sizes: vec![0; total_syms as usize],
            codes: vec![0; total_syms as usize],
            decode: DecodeTables::default(),
            total_count: total_syms,
            update_cycle: 0,
            symbols_until_update: 0,
            max_cycle,
            slow_rate,
        };
        model.reset();
        model
    }

    /// Flat frequencies, fresh code tables and a restarted cadence.
    pub fn reset(&mut self) {
        self.sym_freq.fill(1);
        self.total_count = self.total_syms;
        self.rebuild_codes();
        self.reset_update_rate();
    }

    /// Restart the rebuild cadence at its most frequent setting.
    pub fn reset_update_rate(&mut self) {
        self.update_cycle = ((self.total_syms.max(24) + 7) >> 3).min(self.max_cycle);
        self.symbols_until_update = self.update_cycle;
    }

    /// Alphabet size.
    pub fn total_syms(&self) -> u32 {
        self.total_syms
    }

    /// Code and code size for `sym`.
    #[inline]
    pub fn code(&self, sym: u32) -> (u32, u32) {
        (
            self.codes[sym as usize] as u32,
            self.code_sizes[sym as usize] as u32,
        )
    }

    /// Current code size of `sym` in bits.
    #[inline]
    pub fn cost(&self, sym: u32) -> u32 {
        self.code_sizes[sym as usize] as u32
    }

    /// Symbols left before the next rebuild.
    pub fn symbols_until_update(&self) -> u32 {
        self.symbols_until_update
    }

    /// Current rebuild interval.
    pub fn update_cycle(&self) -> u32 {
        self.update_cycle
    }

    /// Record an occurrence of `sym`. Returns whether the tables were rebuilt.
    pub fn record(&mut self, sym: u32) -> bool {
        self.sym_freq[sym as usize] += 1;
        self.total_count += 1;
        self.symbols_until_update -= 1;
        if self.symbols_until_update > 0 {
            return false;
        }

        while self.total_count >= MAX_TOTAL_FREQ {
            self.total_count = 0;
            for f in &mut self.sym_freq {
                *f = (*f >> 1) + 1;
                self.total_count += *f;
            }
        }
        self.rebuild_codes();

        let grown = self.update_cycle.saturating_mul(self.slow_rate) >> 5;
        self.update_cycle = grown.max(self.update_cycle + 1).min(self.max_cycle);
        self.symbols_until_update = self.update_cycle;
        true
    }

    /// Decode one symbol, pulling code bits from `next_bit`.
    ///
    /// Returns `None` if the bits do not form a code.
    pub fn decode_with(&self, mut next_bit: impl FnMut() -> u32) -> Option<u32> {
        let d = &self.decode;
        let mut code = 0i32;
        for len in 1..=MAX_CODE_SIZE {
            code = (code << 1) | next_bit() as i32;
            let index = code - d.first_code[len];
            if index >= 0 && (index as u32) < d.counts[len] {
                return Some(d.sorted[(d.offsets[len] + index as u32) as usize] as u32);
            }
        }
        None
    }

    fn rebuild_codes(&mut self) {
        build_code_sizes(&self.sym_freq, MAX_CODE_SIZE, &mut self.code_sizes);

        let mut counts = [0u32; MAX_CODE_SIZE + 1];
        for &size in &self.code_sizes {
            counts[size as usize] += 1;
        }
        counts[0] = 0;

        let mut next_code = [0u32; MAX_CODE_SIZE + 2];
        let mut first_code = [0i32; MAX_CODE_SIZE + 1];
        let mut offsets = [0u32; MAX_CODE_SIZE + 1];
        let mut code = 0u32;
        let mut offset = 0u32;
        for len in 1..=MAX_CODE_SIZE {
            code = (code + counts[len - 1]) << 1;
            next_code[len] = code;
            first_code[len] = code as i32;
            offsets[len] = offset;
            offset += counts[len];
        }

        let mut sorted = vec![0u16; offset as usize];
        let mut fill = offsets;
        for (sym, &size) in self.code_sizes.iter().enumerate() {
            if size == 0 {
                continue;
            }
            let size = size as usize;
            self.codes[sym] = next_code[size] as u16;
            next_code[size] += 1;
            sorted[fill[size] as usize] = sym as u16;
            fill[size] += 1;
        }

        self.decode = DecodeTables {
            first_code,
            counts,
            offsets,
            sorted,
        };
    }
}

/// Compute Huffman code sizes for `freq`, limited to `max_size` bits.
///
/// Every symbol with a nonzero frequency gets a code of at least one bit.
pub fn build_code_sizes(freq: &[u32], max_size: usize, sizes: &mut [u8]) {
    sizes.fill(0);

    // Symbols by ascending frequency; ties broken by symbol index.
    let mut syms: Vec<(u32, usize)> = freq
        .iter()
        .enumerate()
        .filter(|&(_, &f)| f > 0)
        .map(|(i, &f)| (f, i))
        .collect();
    match syms.len() {
        0 => return,
        1 => {
            sizes[syms[0].1] = 1;
            return;
        }
        _ => {}
    }
    syms.sort_unstable();

    // Leaves are 0..n, internal nodes n.. in creation order.
    let n = syms.len();
    let mut parent = vec![0usize; 2 * n - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = syms
        .iter()
        .enumerate()
        .map(|(i, &(f, _))| Reverse((f as u64, i)))
        .collect();
    let mut next = n;
    while heap.len() > 1 {
        let (Some(Reverse((wa, a))), Some(Reverse((wb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((wa + wb, next)));
        next += 1;
    }

    // Depth of each node; parents are created after their children.
    let root = 2 * n - 2;
    let mut depth = vec![0usize; 2 * n - 1];
    for node in (0..root).rev() {
        depth[node] = depth[parent[node]] + 1;
    }

    let mut num_codes = [0u32; 64];
    for &d in &depth[..n] {
        num_codes[d.min(max_size)] += 1;
    }
    enforce_max_code_size(&mut num_codes, max_size);

    // Longest codes go to the least frequent symbols.
    let mut leaf = 0;
    for size in (1..=max_size).rev() {
        for _ in 0..num_codes[size] {
            sizes[syms[leaf].1] = size as u8;
            leaf += 1;
        }
    }
}

/// Lengthen codes until the Kraft sum fits after clamping to `max_size`.
fn enforce_max_code_size(num_codes: &mut [u32; 64], max_size: usize) {
    let mut total: u64 = (1..=max_size)
        .map(|i| (num_codes[i] as u64) << (max_size - i))
        .sum();
    while total > 1u64 << max_size {
        num_codes[max_size] -= 1;
        if let Some(i) = (1..max_size).rev().find(|&i| num_codes[i] != 0) {
            num_codes[i] -= 1;
            num_codes[i + 1] += 2;
        }
        total -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kraft_ok(sizes: &[u8], max: usize) -> bool {
        let sum: u64 = sizes
            .iter()
            .filter(|&&s| s > 0)
            .map(|&s| 1u64 << (max - s as usize))
            .sum();
        sum <= 1u64 << max
    }

    #[test]
    fn test_bit_model_adapts() {
        let mut model = AdaptiveBitModel::new();
        assert_eq!(model.prob0(), 1024);
        for _ in 0..100 {
            model.update(false);
        }
        assert!(model.prob0() > 1900);
        assert!(model.cost(false) < model.cost(true));
        for _ in 0..500 {
            model.update(true);
        }
        assert!(model.prob0() > 0 && model.prob0() < 100);
        model.reset();
        assert_eq!(model.prob0(), 1024);
    }

    #[test]
    fn test_code_sizes_simple() {
        let mut sizes = [0u8; 4];
        build_code_sizes(&[1, 1, 2, 4], 16, &mut sizes);
        assert_eq!(sizes, [3, 3, 2, 1]);

        let mut sizes = [0u8; 3];
        build_code_sizes(&[0, 5, 0], 16, &mut sizes);
        assert_eq!(sizes, [0, 1, 0]);
    }

    #[test]
    fn test_code_sizes_limited() {
        // Fibonacci frequencies produce a maximally deep tree.
        let mut freq = vec![1u32, 1];
        while freq.len() < 30 {
            let n = freq.len();
            freq.push(freq[n - 1] + freq[n - 2]);
        }
        let mut sizes = vec![0u8; freq.len()];
        build_code_sizes(&freq, 16, &mut sizes);
        assert!(sizes.iter().all(|&s| (1..=16).contains(&s)));
        assert!(kraft_ok(&sizes, 16));
        assert_eq!(sizes.iter().filter(|&&s| s == 16).count() % 2, 0);
    }

    #[test]
    fn test_huffman_model_extreme_tuning() {
        let mut model = QuasiAdaptiveHuffmanModel::new(256, u32::MAX, u32::MAX);
        let mut rebuilds = 0;
        for i in 0..200_000u32 {
            if model.record(i % 256) {
                rebuilds += 1;
            }
            assert!(model.update_cycle() >= 1 && model.update_cycle() <= MAX_UPDATE_CYCLE);
        }
        assert!(rebuilds > 2);
    }

    #[test]
    fn test_huffman_model_cadence() {
        let mut model = QuasiAdaptiveHuffmanModel::new(256, 64, 64);
        let first_cycle = model.update_cycle();
        assert_eq!(first_cycle, (256 + 7) >> 3);

        let mut rebuilds = 0;
        for i in 0..first_cycle {
            if model.record(i % 4) {
                rebuilds += 1;
            }
        }
        assert_eq!(rebuilds, 1);
        // Slow rate 64 doubles the interval.
        assert_eq!(model.update_cycle(), first_cycle * 2);
        // Frequent symbols got shorter codes.
        assert!(model.cost(0) < model.cost(200));

        for _ in 0..100_000 {
            model.record(7);
        }
        assert!(model.update_cycle() <= (256 + 6) * 64);
        assert!(model.cost(7) <= 2);

        model.reset_update_rate();
        assert_eq!(model.update_cycle(), first_cycle);
    }

    #[test]
    fn test_huffman_model_decode_matches_codes() {
        let mut model = QuasiAdaptiveHuffmanModel::new(40, 8, 36);
        for i in 0..500u32 {
            model.record((i * i) % 40 % 13);
        }
        for sym in 0..40 {
            let (code, size) = model.code(sym);
            let mut bit = size;
            let decoded = model.decode_with(|| {
                bit -= 1;
                (code >> bit) & 1
            });
            assert_eq!(decoded, Some(sym));
        }
    }

    #[test]
    fn test_slow_rate_32_grows_linearly() {
        let mut model = QuasiAdaptiveHuffmanModel::new(16, 4, 32);
        let cycle = model.update_cycle();
        for _ in 0..cycle {
            model.record(1);
        }
        assert_eq!(model.update_cycle(), cycle + 1);
    }
}
