//! LZ coding state: the literal/match state machine, the match history and
//! the adaptive models every decision is coded with.

use crate::error::Result;
use crate::match_accel::SearchAccelerator;
use crate::model::{AdaptiveBitModel, QuasiAdaptiveHuffmanModel};
use crate::stats::CodingStats;
use crate::symbol_codec::SymbolCodec;
use crate::tables::{
    MATCH_HIST_SIZE, MAX_MATCH_LEN, MIN_MATCH_LEN, NUM_LIT_STATES, NUM_SPECIAL_LENGTHS, NUM_STATES,
    POSITION_EXTRA_BITS, SPECIAL_CODE_END_OF_BLOCK, compute_position_slot,
};

/// Literal alphabet.
pub const NUM_LIT_SYMS: u32 = 256;
/// Special codes followed by one symbol per match length.
pub const NUM_MAIN_LEN_SYMS: u32 = NUM_SPECIAL_LENGTHS + (MAX_MATCH_LEN - MIN_MATCH_LEN + 1);
/// One symbol per rep match length.
pub const NUM_REP_LEN_SYMS: u32 = MAX_MATCH_LEN - MIN_MATCH_LEN + 1;
/// Low distance bits coded through their own model.
pub const NUM_DIST_LSB_BITS: u32 = 4;
/// Alphabet of the low distance bits.
pub const NUM_DIST_LSB_SYMS: u32 = 1 << NUM_DIST_LSB_BITS;

/// Literal/match state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State(u8);

impl State {
    /// Initial state.
    pub const fn new() -> Self {
        Self(0)
    }

    /// State value, used to select models.
    pub fn value(self) -> usize {
        self.0 as usize
    }

    /// Whether the previous decisions make this a literal state.
    pub fn is_literal(self) -> bool {
        (self.0 as usize) < NUM_LIT_STATES
    }

    /// Transition after a literal.
    pub fn update_literal(&mut self) {
        self.0 = match self.0 {
            0..=3 => 0,
            4..=9 => self.0 - 3,
            10 => 6,
            _ => 5,
        };
    }

    /// Transition after a full match.
    pub fn update_match(&mut self) {
        self.0 = if self.is_literal() { 7 } else { 10 };
    }

    /// Transition after a single-byte rep0 match.
    pub fn update_short_rep(&mut self) {
        self.0 = if self.is_literal() { 9 } else { 11 };
    }

    /// Transition after a rep match of two or more bytes.
    pub fn update_long_rep(&mut self) {
        self.0 = if self.is_literal() { 8 } else { 11 };
    }
}

/// One parse decision at a lookahead position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzDecision {
    /// A single byte.
    Literal,
    /// A match at an explicit distance.
    Match {
        /// Length, `2..=257`.
        len: u32,
        /// Distance, at least 1.
        dist: u32,
    },
    /// A match at one of the recent distances.
    Rep {
        /// Length, 1 only for rep0.
        len: u32,
        /// History index, `0..4`.
        index: usize,
    },
}

impl LzDecision {
    /// Bytes covered.
    pub fn len(&self) -> u32 {
        match *self {
            Self::Literal => 1,
            Self::Match { len, .. } | Self::Rep { len, .. } => len,
        }
    }

    /// Whether this decision copies from the history.
    pub fn is_match(&self) -> bool {
        !matches!(self, Self::Literal)
    }
}

/// Per-stream LZ coding state.
#[derive(Debug, Clone)]
pub struct LzState {
    cur_state: State,
    match_hist: [u32; MATCH_HIST_SIZE],
    delta_window: u32,

    is_match_model: [AdaptiveBitModel; NUM_STATES],
    is_rep_model: [AdaptiveBitModel; NUM_STATES],
    is_rep0_model: [AdaptiveBitModel; NUM_STATES],
    is_rep0_single_byte_model: [AdaptiveBitModel; NUM_STATES],
    is_rep1_model: [AdaptiveBitModel; NUM_STATES],
    is_rep2_model: [AdaptiveBitModel; NUM_STATES],

    lit_table: QuasiAdaptiveHuffmanModel,
    delta_lit_table: QuasiAdaptiveHuffmanModel,
    main_len_table: QuasiAdaptiveHuffmanModel,
    rep_len_table: QuasiAdaptiveHuffmanModel,
    dist_slot_table: QuasiAdaptiveHuffmanModel,
    dist_lsb_table: QuasiAdaptiveHuffmanModel,
}

/// Add a bit's cost when statistics are enabled, then code it.
#[inline]
fn code_bit(
    codec: &mut SymbolCodec,
    model: &mut AdaptiveBitModel,
    bit: bool,
    cost: &mut f64,
) -> Result<()> {
    if cfg!(feature = "update-stats") {
        *cost += model.cost(bit) as f64;
    }
    codec.encode_bit(bit, model)
}

#[inline]
fn code_sym(
    codec: &mut SymbolCodec,
    model: &mut QuasiAdaptiveHuffmanModel,
    sym: u32,
    cost: &mut f64,
) -> Result<()> {
    if cfg!(feature = "update-stats") {
        *cost += model.cost(sym) as f64;
    }
    codec.encode(sym, model)
}

impl LzState {
    /// Fresh state.
    ///
    /// `delta_window` bounds the rep0 distance a literal may be coded
    /// against (the history both sides are guaranteed to hold).
    pub fn new(
        num_position_slots: u32,
        delta_window: u32,
        max_update_interval: u32,
        slow_rate: u32,
    ) -> Self {
        let table = |n: u32| QuasiAdaptiveHuffmanModel::new(n, max_update_interval, slow_rate);
        Self {
            cur_state: State::new(),
            match_hist: [1; MATCH_HIST_SIZE],
            delta_window,
            is_match_model: [AdaptiveBitModel::new(); NUM_STATES],
            is_rep_model: [AdaptiveBitModel::new(); NUM_STATES],
            is_rep0_model: [AdaptiveBitModel::new(); NUM_STATES],
            is_rep0_single_byte_model: [AdaptiveBitModel::new(); NUM_STATES],
            is_rep1_model: [AdaptiveBitModel::new(); NUM_STATES],
            is_rep2_model: [AdaptiveBitModel::new(); NUM_STATES],
            lit_table: table(NUM_LIT_SYMS),
            delta_lit_table: table(NUM_LIT_SYMS),
            main_len_table: table(NUM_MAIN_LEN_SYMS),
            rep_len_table: table(NUM_REP_LEN_SYMS),
            dist_slot_table: table(num_position_slots),
            dist_lsb_table: table(NUM_DIST_LSB_SYMS),
        }
    }

    /// Back to the start-of-stream state.
    pub fn reset(&mut self) {
        self.cur_state = State::new();
        self.match_hist = [1; MATCH_HIST_SIZE];
        for models in [
            &mut self.is_match_model,
            &mut self.is_rep_model,
            &mut self.is_rep0_model,
            &mut self.is_rep0_single_byte_model,
            &mut self.is_rep1_model,
            &mut self.is_rep2_model,
        ] {
            models.iter_mut().for_each(AdaptiveBitModel::reset);
        }
        for table in self.tables_mut() {
            table.reset();
        }
    }

    /// Restart the Huffman rebuild cadence of every table.
    pub fn reset_update_rate(&mut self) {
        for table in self.tables_mut() {
            table.reset_update_rate();
        }
    }

    fn tables_mut(&mut self) -> [&mut QuasiAdaptiveHuffmanModel; 6] {
        [
            &mut self.lit_table,
            &mut self.delta_lit_table,
            &mut self.main_len_table,
            &mut self.rep_len_table,
            &mut self.dist_slot_table,
            &mut self.dist_lsb_table,
        ]
    }

    /// Current state machine state.
    pub fn cur_state(&self) -> State {
        self.cur_state
    }

    /// Recent match distances, most recent first.
    pub fn match_hist(&self) -> &[u32; MATCH_HIST_SIZE] {
        &self.match_hist
    }

    /// Current literal Huffman table (exposed for cadence inspection).
    pub fn lit_table(&self) -> &QuasiAdaptiveHuffmanModel {
        &self.lit_table
    }

    /// Byte a literal at `ofs` is coded against, or 0 when rep0 reaches
    /// outside the shared window.
    fn delta_byte(&self, accel: &SearchAccelerator, ofs: u32) -> u8 {
        let rep0 = self.match_hist[0];
        if rep0 <= accel.history_len(ofs).min(self.delta_window) {
            accel.byte_before(ofs, rep0)
        } else {
            0
        }
    }

    /// Code `decision` for lookahead offset `ofs` and advance the state.
    pub fn encode(
        &mut self,
        codec: &mut SymbolCodec,
        accel: &SearchAccelerator,
        ofs: u32,
        decision: LzDecision,
        stats: &mut CodingStats,
    ) -> Result<()> {
        let s = self.cur_state.value();
        let mut cost = 0.0;
        code_bit(codec, &mut self.is_match_model[s], decision.is_match(), &mut cost)?;
        let is_match_cost = cost;
        let mut delta_lit = false;

        match decision {
            LzDecision::Literal => {
                let byte = accel.lookahead_byte(ofs) as u32;
                if self.cur_state.is_literal() {
                    code_sym(codec, &mut self.lit_table, byte, &mut cost)?;
                } else {
                    let match_byte = self.delta_byte(accel, ofs) as u32;
                    code_sym(codec, &mut self.delta_lit_table, byte ^ match_byte, &mut cost)?;
                    delta_lit = true;
                }
                self.cur_state.update_literal();
            }
            LzDecision::Match { len, dist } => {
                debug_assert!((MIN_MATCH_LEN..=MAX_MATCH_LEN).contains(&len));
                debug_assert!(dist >= 1);
                code_bit(codec, &mut self.is_rep_model[s], false, &mut cost)?;
                code_sym(
                    codec,
                    &mut self.main_len_table,
                    len - MIN_MATCH_LEN + NUM_SPECIAL_LENGTHS,
                    &mut cost,
                )?;

                let (slot, extra) = compute_position_slot(dist);
                code_sym(codec, &mut self.dist_slot_table, slot, &mut cost)?;
                let num_extra_bits = POSITION_EXTRA_BITS[slot as usize] as u32;
                if num_extra_bits < NUM_DIST_LSB_BITS {
                    codec.encode_bits(extra, num_extra_bits)?;
                    cost += num_extra_bits as f64;
                } else {
                    codec.encode_bits(extra >> NUM_DIST_LSB_BITS, num_extra_bits - NUM_DIST_LSB_BITS)?;
                    cost += (num_extra_bits - NUM_DIST_LSB_BITS) as f64;
                    code_sym(
                        codec,
                        &mut self.dist_lsb_table,
                        extra & (NUM_DIST_LSB_SYMS - 1),
                        &mut cost,
                    )?;
                }

                self.match_hist.copy_within(0..MATCH_HIST_SIZE - 1, 1);
                self.match_hist[0] = dist;
                self.cur_state.update_match();
            }
            LzDecision::Rep { len, index } => {
                debug_assert!(index < MATCH_HIST_SIZE);
                debug_assert!(len >= MIN_MATCH_LEN || (len == 1 && index == 0));
                code_bit(codec, &mut self.is_rep_model[s], true, &mut cost)?;

                if index == 0 {
                    code_bit(codec, &mut self.is_rep0_model[s], false, &mut cost)?;
                    let long = len > 1;
                    code_bit(codec, &mut self.is_rep0_single_byte_model[s], long, &mut cost)?;
                    if long {
                        code_sym(codec, &mut self.rep_len_table, len - MIN_MATCH_LEN, &mut cost)?;
                        self.cur_state.update_long_rep();
                    } else {
                        self.cur_state.update_short_rep();
                    }
                } else {
                    code_bit(codec, &mut self.is_rep0_model[s], true, &mut cost)?;
                    code_bit(codec, &mut self.is_rep1_model[s], index > 1, &mut cost)?;
                    if index > 1 {
                        code_bit(codec, &mut self.is_rep2_model[s], index > 2, &mut cost)?;
                    }
                    code_sym(codec, &mut self.rep_len_table, len - MIN_MATCH_LEN, &mut cost)?;

                    let dist = self.match_hist[index];
                    self.match_hist.copy_within(0..index, 1);
                    self.match_hist[0] = dist;
                    self.cur_state.update_long_rep();
                }
            }
        }

        if cfg!(feature = "update-stats") {
            stats.update(&decision, delta_lit, cost, is_match_cost);
        }
        Ok(())
    }

    /// Code the end-of-block marker. The state machine is unchanged.
    pub fn encode_eob(&mut self, codec: &mut SymbolCodec) -> Result<()> {
        let s = self.cur_state.value();
        codec.encode_bit(true, &mut self.is_match_model[s])?;
        codec.encode_bit(false, &mut self.is_rep_model[s])?;
        codec.encode(SPECIAL_CODE_END_OF_BLOCK, &mut self.main_len_table)
    }
}

/// Decoding of coded decisions, used to verify compressed blocks.
#[cfg(test)]
impl LzState {
    /// Decode one decision, appending its bytes to `out` (which holds the
    /// whole history, seed bytes included). Returns `false` at end of block.
    pub(crate) fn decode(&mut self, codec: &mut SymbolCodec, out: &mut Vec<u8>) -> Result<bool> {
        use crate::tables::POSITION_BASE;

        let s = self.cur_state.value();
        if !codec.decode_bit(&mut self.is_match_model[s])? {
            let sym = if self.cur_state.is_literal() {
                codec.decode(&mut self.lit_table)?
            } else {
                let rep0 = self.match_hist[0] as usize;
                let window = out.len().min(self.delta_window as usize);
                let match_byte = if rep0 <= window { out[out.len() - rep0] } else { 0 };
                codec.decode(&mut self.delta_lit_table)? ^ match_byte as u32
            };
            out.push(sym as u8);
            self.cur_state.update_literal();
            return Ok(true);
        }

        let (len, dist) = if !codec.decode_bit(&mut self.is_rep_model[s])? {
            let sym = codec.decode(&mut self.main_len_table)?;
            if sym == SPECIAL_CODE_END_OF_BLOCK {
                return Ok(false);
            }
            let len = sym - NUM_SPECIAL_LENGTHS + MIN_MATCH_LEN;
            let slot = codec.decode(&mut self.dist_slot_table)?;
            let num_extra_bits = POSITION_EXTRA_BITS[slot as usize] as u32;
            let extra = if num_extra_bits < NUM_DIST_LSB_BITS {
                codec.decode_bits(num_extra_bits)?
            } else {
                let hi = codec.decode_bits(num_extra_bits - NUM_DIST_LSB_BITS)?;
                (hi << NUM_DIST_LSB_BITS) | codec.decode(&mut self.dist_lsb_table)?
            };
            let dist = POSITION_BASE[slot as usize] + extra;
            self.match_hist.copy_within(0..MATCH_HIST_SIZE - 1, 1);
            self.match_hist[0] = dist;
            self.cur_state.update_match();
            (len, dist)
        } else if !codec.decode_bit(&mut self.is_rep0_model[s])? {
            if codec.decode_bit(&mut self.is_rep0_single_byte_model[s])? {
                let len = codec.decode(&mut self.rep_len_table)? + MIN_MATCH_LEN;
                self.cur_state.update_long_rep();
                (len, self.match_hist[0])
            } else {
                self.cur_state.update_short_rep();
                (1, self.match_hist[0])
            }
        } else {
            let index = if !codec.decode_bit(&mut self.is_rep1_model[s])? {
                1
            } else if !codec.decode_bit(&mut self.is_rep2_model[s])? {
                2
            } else {
                3
            };
            let len = codec.decode(&mut self.rep_len_table)? + MIN_MATCH_LEN;
            let dist = self.match_hist[index];
            self.match_hist.copy_within(0..index, 1);
            self.match_hist[0] = dist;
            self.cur_state.update_long_rep();
            (len, dist)
        };

        let dist = dist as usize;
        assert!(dist >= 1 && dist <= out.len(), "distance {dist} outside history");
        for _ in 0..len {
            out.push(out[out.len() - dist]);
        }
        Ok(true)
    }
}
