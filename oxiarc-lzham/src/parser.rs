//! Greedy parse with bounded lazy evaluation.

use crate::lzbase::LzDecision;
use crate::match_accel::SearchAccelerator;
use crate::tables::{MATCH_HIST_SIZE, MAX_MATCH_LEN, MIN_MATCH_LEN};

/// Picks one decision per lookahead position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreedyParser {
    fast_bytes: u32,
    lazy_steps: u32,
}

impl GreedyParser {
    /// Parser accepting any match of `fast_bytes` or more immediately and
    /// otherwise looking up to `lazy_steps` positions ahead.
    pub fn new(fast_bytes: u32, lazy_steps: u32) -> Self {
        Self {
            fast_bytes: fast_bytes.clamp(MIN_MATCH_LEN, MAX_MATCH_LEN),
            lazy_steps,
        }
    }

    /// Match length at which the search stops.
    pub fn fast_bytes(&self) -> u32 {
        self.fast_bytes
    }

    /// Lookahead positions considered before committing to a match.
    pub fn lazy_steps(&self) -> u32 {
        self.lazy_steps
    }

    /// Best single decision at `ofs` without looking ahead.
    ///
    /// Rep matches win ties with full matches; a lone byte equal to the
    /// rep0 byte becomes a short rep.
    pub fn best_at(
        &self,
        accel: &SearchAccelerator,
        reps: &[u32; MATCH_HIST_SIZE],
        ofs: u32,
    ) -> LzDecision {
        let remaining = accel.lookahead_size().saturating_sub(ofs);
        if remaining == 0 {
            return LzDecision::Literal;
        }
        let max_len = remaining.min(MAX_MATCH_LEN);

        let mut best_rep: Option<(usize, u32)> = None;
        for (index, &dist) in reps.iter().enumerate() {
            let len = accel.match_len_at(ofs, dist, max_len);
            if len >= MIN_MATCH_LEN && best_rep.is_none_or(|(_, l)| len > l) {
                best_rep = Some((index, len));
                if len >= self.fast_bytes {
                    break;
                }
            }
        }
        if let Some((index, len)) = best_rep.filter(|&(_, len)| len >= self.fast_bytes) {
            return LzDecision::Rep { len, index };
        }

        let mut best_match: Option<(u32, u32)> = None;
        for candidate in accel.get_match_list(ofs) {
            let len = candidate.len().min(max_len);
            if len >= MIN_MATCH_LEN && best_match.is_none_or(|(_, l)| len > l) {
                best_match = Some((candidate.dist(), len));
            }
        }
        if best_match.is_none() {
            best_match = accel.get_len2_match(ofs).map(|dist| (dist, MIN_MATCH_LEN));
        }

        match (best_rep, best_match) {
            (Some((index, rep_len)), Some((_, len)))
                if rep_len >= len || (rep_len >= 3 && index == 0) =>
            {
                LzDecision::Rep { len: rep_len, index }
            }
            (_, Some((dist, len))) => {
                // A full match against a recent distance is coded as the rep.
                match reps.iter().position(|&r| r == dist) {
                    Some(index) => LzDecision::Rep { len, index },
                    None => LzDecision::Match { len, dist },
                }
            }
            (Some((index, len)), None) => LzDecision::Rep { len, index },
            (None, None) => {
                if accel.match_len_at(ofs, reps[0], 1) == 1 {
                    LzDecision::Rep { len: 1, index: 0 }
                } else {
                    LzDecision::Literal
                }
            }
        }
    }

    /// Decision for `ofs`, deferring a match by one byte while a later
    /// position offers a strictly longer one.
    pub fn choose(
        &self,
        accel: &SearchAccelerator,
        reps: &[u32; MATCH_HIST_SIZE],
        ofs: u32,
    ) -> LzDecision {
        let best = self.best_at(accel, reps, ofs);
        let len = best.len();
        if len < MIN_MATCH_LEN || len >= self.fast_bytes {
            return best;
        }

        for step in 1..=self.lazy_steps {
            let next = self.best_at(accel, reps, ofs + step);
            // Deferring costs `step` literals; only worth it for a longer match.
            if next.len() >= MIN_MATCH_LEN && next.len() > len + step {
                return LzDecision::Literal;
            }
        }
        best
    }
}
