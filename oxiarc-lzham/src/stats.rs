//! Optional coding statistics.
//!
//! Collected only with the `update-stats` feature; they never influence the
//! compressed output.

use crate::lzbase::LzDecision;
use crate::tables::MAX_MATCH_LEN;
use tracing::info;

/// Running count, sum, sum of squares and range of a sampled value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedStat {
    num: u64,
    total: f64,
    total2: f64,
    min: f64,
    max: f64,
}

impl Default for TrackedStat {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackedStat {
    /// Empty statistic.
    pub const fn new() -> Self {
        Self {
            num: 0,
            total: 0.0,
            total2: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    /// Forget all samples.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Add a sample.
    pub fn update(&mut self, val: f64) {
        self.num += 1;
        self.total += val;
        self.total2 += val * val;
        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    /// Number of samples.
    pub fn num(&self) -> u64 {
        self.num
    }

    /// Sum of samples.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Smallest sample, 0 when empty.
    pub fn min(&self) -> f64 {
        if self.num == 0 { 0.0 } else { self.min }
    }

    /// Largest sample, 0 when empty.
    pub fn max(&self) -> f64 {
        if self.num == 0 { 0.0 } else { self.max }
    }

    /// Arithmetic mean, 0 when empty.
    pub fn mean(&self) -> f64 {
        if self.num == 0 {
            0.0
        } else {
            self.total / self.num as f64
        }
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.num == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.total2 / self.num as f64 - mean * mean).max(0.0)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Per-decision-class cost accounting, in bits.
#[derive(Debug, Clone)]
pub struct CodingStats {
    /// Source bytes covered by recorded decisions.
    pub total_bytes: u64,
    /// Decisions recorded.
    pub total_contexts: u64,
    /// Bits spent on all decisions.
    pub total_cost: f64,
    /// Cost per decision.
    pub context_stats: TrackedStat,

    /// Literals and delta literals.
    pub total_nonmatches: u64,
    /// Full and rep matches.
    pub total_matches: u64,
    /// Bits spent on the leading is-match decision of literals.
    pub total_is_match0_bits_cost: f64,
    /// Bits spent on the leading is-match decision of matches.
    pub total_is_match1_bits_cost: f64,
    /// Bits spent on matches (including the is-match decision).
    pub total_match_bits_cost: f64,
    /// Costliest single match.
    pub worst_match_bits_cost: f64,

    /// Literals coded in literal states.
    pub lit_stats: TrackedStat,
    /// Literals coded against the rep0 byte.
    pub delta_lit_stats: TrackedStat,
    /// Single-byte rep0 matches.
    pub rep0_len1_stats: TrackedStat,
    /// Rep0 matches of two or more bytes.
    pub rep0_len2_plus_stats: TrackedStat,
    /// Rep matches by history index.
    pub rep_stats: [TrackedStat; 4],
    /// Full matches by length.
    pub full_match_stats: Vec<TrackedStat>,

    /// Length-2 full matches with distance below 512.
    pub total_near_len2_matches: u64,
    /// Length-2 full matches with distance of 512 or more.
    pub total_far_len2_matches: u64,
    /// Huffman update-rate resets (table flushes, trade-off mode).
    pub total_update_rate_resets: u64,
}

impl Default for CodingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CodingStats {
    /// Empty statistics.
    pub fn new() -> Self {
        Self {
            total_bytes: 0,
            total_contexts: 0,
            total_cost: 0.0,
            context_stats: TrackedStat::new(),
            total_nonmatches: 0,
            total_matches: 0,
            total_is_match0_bits_cost: 0.0,
            total_is_match1_bits_cost: 0.0,
            total_match_bits_cost: 0.0,
            worst_match_bits_cost: 0.0,
            lit_stats: TrackedStat::new(),
            delta_lit_stats: TrackedStat::new(),
            rep0_len1_stats: TrackedStat::new(),
            rep0_len2_plus_stats: TrackedStat::new(),
            rep_stats: [TrackedStat::new(); 4],
            full_match_stats: vec![TrackedStat::new(); MAX_MATCH_LEN as usize + 1],
            total_near_len2_matches: 0,
            total_far_len2_matches: 0,
            total_update_rate_resets: 0,
        }
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Record one coded decision.
    ///
    /// `delta_lit` tells whether a literal was coded against the rep0 byte;
    /// `cost` is the full decision cost and `is_match_cost` the share of its
    /// leading is-match bit.
    pub fn update(&mut self, decision: &LzDecision, delta_lit: bool, cost: f64, is_match_cost: f64) {
        self.total_bytes += decision.len() as u64;
        self.total_contexts += 1;
        self.total_cost += cost;
        self.context_stats.update(cost);

        match *decision {
            LzDecision::Literal => {
                self.total_nonmatches += 1;
                self.total_is_match0_bits_cost += is_match_cost;
                if delta_lit {
                    self.delta_lit_stats.update(cost);
                } else {
                    self.lit_stats.update(cost);
                }
            }
            LzDecision::Match { len, dist } => {
                self.record_match(cost, is_match_cost);
                self.full_match_stats[len as usize].update(cost);
                if len == 2 {
                    if dist < 512 {
                        self.total_near_len2_matches += 1;
                    } else {
                        self.total_far_len2_matches += 1;
                    }
                }
            }
            LzDecision::Rep { len, index } => {
                self.record_match(cost, is_match_cost);
                self.rep_stats[index].update(cost);
                if index == 0 {
                    if len == 1 {
                        self.rep0_len1_stats.update(cost);
                    } else {
                        self.rep0_len2_plus_stats.update(cost);
                    }
                }
            }
        }
    }

    fn record_match(&mut self, cost: f64, is_match_cost: f64) {
        self.total_matches += 1;
        self.total_is_match1_bits_cost += is_match_cost;
        self.total_match_bits_cost += cost;
        self.worst_match_bits_cost = self.worst_match_bits_cost.max(cost);
    }

    /// Log a summary at info level.
    pub fn print(&self) {
        if self.total_contexts == 0 {
            return;
        }
        info!(
            total_bytes = self.total_bytes,
            total_contexts = self.total_contexts,
            total_cost_bytes = self.total_cost / 8.0,
            bits_per_byte = self.total_cost / self.total_bytes.max(1) as f64,
            mean_context_cost = self.context_stats.mean(),
            context_cost_std_dev = self.context_stats.std_dev(),
            "coding statistics"
        );
        info!(
            nonmatches = self.total_nonmatches,
            matches = self.total_matches,
            is_match0_bits = self.total_is_match0_bits_cost,
            is_match1_bits = self.total_is_match1_bits_cost,
            match_bits = self.total_match_bits_cost,
            worst_match_bits = self.worst_match_bits_cost,
            "match summary"
        );
        info!(
            literals = self.lit_stats.num(),
            literal_mean_bits = self.lit_stats.mean(),
            delta_literals = self.delta_lit_stats.num(),
            delta_literal_mean_bits = self.delta_lit_stats.mean(),
            rep0_len1 = self.rep0_len1_stats.num(),
            rep0_len2_plus = self.rep0_len2_plus_stats.num(),
            rep1 = self.rep_stats[1].num(),
            rep2 = self.rep_stats[2].num(),
            rep3 = self.rep_stats[3].num(),
            near_len2 = self.total_near_len2_matches,
            far_len2 = self.total_far_len2_matches,
            update_rate_resets = self.total_update_rate_resets,
            "decision classes"
        );
        for (len, stat) in self.full_match_stats.iter().enumerate() {
            if stat.num() > 0 {
                info!(
                    len,
                    count = stat.num(),
                    mean_bits = stat.mean(),
                    min_bits = stat.min(),
                    max_bits = stat.max(),
                    "full matches"
                );
            }
        }
    }
}
