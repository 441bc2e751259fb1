//! Block-oriented LZ compressor.
//!
//! Input is cut into blocks of `min(512 KiB, dict_size / 8)` bytes. Each
//! block is one byte-aligned codec run:
//!
//! | block | layout after the 2-bit type and 4-bit check |
//! |-------|----------------------------------------------|
//! | comp  | arithmetic init, decisions, end-of-block code |
//! | raw   | align, 32-bit `len - 1`, stored bytes |
//! | sync  | 2-bit flush type, align, `0x0000`, `0xFFFF` |
//! | eof   | align, 32-bit Adler-32 of the source |
//!
//! The check field is the low four bits of the block index.

use crate::error::{LzhamError, Result};
use crate::lzbase::{LzDecision, LzState};
use crate::match_accel::{AccelConfig, AccelFlags, SearchAccelerator};
use crate::params::{CompressFlags, CompressLevel, InitParams};
use crate::parser::GreedyParser;
use crate::stats::CodingStats;
use crate::status::FlushMode;
use crate::symbol_codec::SymbolCodec;
use crate::tables::{
    BLOCK_CHECK_BITS, BLOCK_FLUSH_TYPE_BITS, BLOCK_HEADER_BITS, BlockType, CompSettings,
    DEFAULT_BLOCK_SIZE, LEVEL_SETTINGS, MIN_DICT_SIZE_LOG2, ZLIB_METHOD_LZHAM,
    num_position_slots,
};
use oxiarc_core::Adler32;
use tracing::{debug, error, trace, warn};

/// Bytes a raw block adds in front of the stored data.
const RAW_BLOCK_OVERHEAD: usize = 5;

/// Sync block flush types.
const SYNC_FLUSH: u32 = 0;
const FULL_FLUSH: u32 = 1;
const TABLE_FLUSH: u32 = 2;

/// The compressor: match finder, coding state and block bookkeeping.
#[derive(Debug)]
pub struct LzCompressor {
    params: InitParams,
    settings: CompSettings,
    parser: GreedyParser,

    accel: SearchAccelerator,
    codec: SymbolCodec,
    state: LzState,
    stats: CodingStats,

    block_size: u32,
    block_buf: Vec<u8>,
    comp_buf: Vec<u8>,
    comp_ofs: usize,

    block_index: u32,
    block_start_dict_ofs: u32,
    finished: bool,
    src_size: u64,
    src_adler32: Adler32,
}

impl LzCompressor {
    /// Build a compressor from validated parameters, prime the seed bytes
    /// and queue the zlib header.
    pub fn new(params: InitParams) -> Result<Self> {
        let dict_size = params.dict_size();
        let level = params.compression_level;
        let settings = LEVEL_SETTINGS[level.index()];

        let mut flags = AccelFlags::NONE;
        if params
            .compress_flags
            .contains(CompressFlags::DETERMINISTIC_PARSING)
        {
            flags |= AccelFlags::DETERMINISTIC;
        }
        if level > CompressLevel::Fastest {
            flags |= AccelFlags::LEN2_MATCHES;
            if !params
                .compress_flags
                .contains(CompressFlags::USE_LOW_MEMORY_MATCH_FINDER)
            {
                flags |= AccelFlags::HASH24;
            }
        }

        if params.max_helper_threads > 0 {
            debug!(
                requested = params.max_helper_threads,
                "helper threads requested, parsing single-threaded"
            );
        }

        let accel = SearchAccelerator::new(AccelConfig {
            max_helper_threads: params.max_helper_threads,
            max_dict_size: dict_size,
            max_matches: settings
                .match_accel_max_matches_per_probe
                .min(settings.match_accel_max_probes),
            all_matches: false,
            max_probes: settings.match_accel_max_probes,
            flags,
        })
        .map_err(|e| match e {
            LzhamError::FailedInitializing(_) => e,
            other => LzhamError::failed_initializing(other.to_string()),
        })?;

        let block_size = DEFAULT_BLOCK_SIZE.min(dict_size / 8);
        let state = LzState::new(
            num_position_slots(dict_size),
            dict_size - block_size,
            params.table_max_update_interval,
            params.table_update_interval_slow_rate,
        );

        let lazy_steps = if params.extreme_parsing() {
            2
        } else if level > CompressLevel::Fastest {
            1
        } else {
            0
        };
        let parser = GreedyParser::new(params.fast_bytes(), lazy_steps);

        debug!(
            dict_size,
            block_size,
            ?level,
            fast_bytes = parser.fast_bytes(),
            lazy_steps,
            max_probes = accel.max_probes(),
            max_matches = accel.max_matches(),
            "compressor initialized"
        );

        let mut comp = Self {
            params,
            settings,
            parser,
            accel,
            codec: SymbolCodec::new(),
            state,
            stats: CodingStats::new(),
            block_size,
            block_buf: Vec::with_capacity(block_size as usize),
            comp_buf: Vec::with_capacity(block_size as usize * 2),
            comp_ofs: 0,
            block_index: 0,
            block_start_dict_ofs: 0,
            finished: false,
            src_size: 0,
            src_adler32: Adler32::new(),
        };
        comp.begin_stream()?;
        Ok(comp)
    }

    /// Return to the freshly initialized state, keeping all allocations.
    pub fn reset(&mut self) -> Result<()> {
        self.accel.reset();
        self.codec.reset();
        self.stats.clear();
        self.state.reset();
        self.begin_stream()
    }

    fn begin_stream(&mut self) -> Result<()> {
        self.src_adler32 = Adler32::new();
        self.src_size = 0;
        self.block_index = 0;
        self.block_start_dict_ofs = 0;
        self.finished = false;
        self.block_buf.clear();
        self.comp_buf.clear();
        self.comp_ofs = 0;

        self.init_seed_bytes()?;
        if self
            .params
            .compress_flags
            .contains(CompressFlags::WRITE_ZLIB_STREAM)
        {
            self.send_zlib_header();
        }
        Ok(())
    }

    /// Feed the seed bytes through the match finder, block by block,
    /// without coding them.
    pub fn init_seed_bytes(&mut self) -> Result<()> {
        let seed = std::mem::take(&mut self.params.seed_bytes);
        if seed.len() as u64 > self.accel.max_dict_size() as u64 {
            error!(
                seed_bytes = seed.len(),
                dict_size = self.accel.max_dict_size(),
                "seed bytes do not fit the dictionary"
            );
            self.params.seed_bytes = seed;
            return Err(LzhamError::invalid_parameter(
                "seed bytes exceed the dictionary size",
            ));
        }

        for chunk in seed.chunks(self.block_size as usize) {
            self.accel.add_bytes_begin(chunk);
            self.accel.add_bytes_end();
            self.accel.advance_bytes(chunk.len() as u32);
        }
        if !seed.is_empty() {
            debug!(seed_bytes = seed.len(), "primed dictionary");
        }
        self.params.seed_bytes = seed;
        Ok(())
    }

    /// Queue the two-byte zlib header (CMF, FLG).
    pub fn send_zlib_header(&mut self) {
        let cmf = ZLIB_METHOD_LZHAM | (((self.params.dict_size_log2 - MIN_DICT_SIZE_LOG2) as u8) << 4);
        let mut flg = self.params.compression_level.zlib_level_hint() << 6;
        if !self.params.seed_bytes.is_empty() {
            flg |= 32;
        }
        let check = (((cmf as u16) << 8) | flg as u16) % 31;
        if check != 0 {
            flg += (31 - check) as u8;
        }
        self.comp_buf.extend_from_slice(&[cmf, flg]);
    }

    /// Append source bytes, compressing every block that fills up.
    pub fn put_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        if self.finished {
            return Err(LzhamError::invalid_parameter("stream is already finished"));
        }
        self.src_adler32.update(data);
        self.src_size += data.len() as u64;

        while !data.is_empty() {
            let room = self.block_size as usize - self.block_buf.len();
            let (head, tail) = data.split_at(room.min(data.len()));
            self.block_buf.extend_from_slice(head);
            data = tail;
            if self.block_buf.len() == self.block_size as usize {
                self.compress_block_buf()?;
            }
        }
        Ok(())
    }

    /// Compress pending input and emit a sync block for `mode`
    /// (`Sync`, `Full` or `Table`). `Finish` finishes the stream; `None`
    /// does nothing.
    pub fn flush(&mut self, mode: FlushMode) -> Result<()> {
        if mode == FlushMode::Finish {
            return self.finish();
        }
        let Some(flush_type) = mode.sync_flush_type() else {
            return Ok(());
        };
        if self.finished {
            return Err(LzhamError::invalid_parameter("stream is already finished"));
        }
        self.compress_block_buf()?;
        self.write_sync_block(flush_type)
    }

    /// Compress pending input and write the end-of-stream block.
    /// Finishing twice is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.compress_block_buf()?;
        self.write_eof_block()?;
        self.finished = true;

        debug!(
            src_size = self.src_size,
            comp_size = self.comp_buf.len(),
            blocks = self.block_index,
            model_updates = self.codec.total_model_updates(),
            adler32 = format_args!("{:#010x}", self.src_adler32.finish()),
            "stream finished"
        );
        if cfg!(feature = "update-stats") {
            self.stats.print();
        }
        Ok(())
    }

    fn compress_block_buf(&mut self) -> Result<()> {
        if self.block_buf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.block_buf);
        let result = self.compress_block(&buf);
        self.block_buf = buf;
        self.block_buf.clear();
        result
    }

    fn block_check(&self) -> u32 {
        self.block_index & ((1 << BLOCK_CHECK_BITS) - 1)
    }

    fn start_block(&mut self, block_type: BlockType, expected_size: usize) -> Result<()> {
        self.codec.start_encoding(expected_size)?;
        self.codec
            .encode_bits(block_type as u32, BLOCK_HEADER_BITS)?;
        self.codec.encode_bits(self.block_check(), BLOCK_CHECK_BITS)
    }

    fn end_block(&mut self) -> Result<usize> {
        self.codec.stop_encoding()?;
        let out = self.codec.encoding_buf();
        self.comp_buf.extend_from_slice(out);
        self.block_index += 1;
        Ok(out.len())
    }

    fn compress_block(&mut self, buf: &[u8]) -> Result<()> {
        let len = buf.len() as u32;
        self.block_start_dict_ofs = self.accel.lookahead_dict_ofs();
        self.accel.add_bytes_begin(buf);
        self.accel.add_bytes_end();

        let snapshot = self.state.clone();
        if self
            .params
            .compress_flags
            .contains(CompressFlags::TRADEOFF_DECOMPRESSION_RATE_FOR_RATIO)
            && self.block_index > 0
        {
            self.state.reset_update_rate();
            if cfg!(feature = "update-stats") {
                self.stats.total_update_rate_resets += 1;
            }
        }

        self.start_block(BlockType::Comp, buf.len())?;
        self.codec.encode_arith_init()?;
        let mut ofs = 0;
        let mut num_decisions = 0u32;
        while ofs < len {
            let decision = self.parser.choose(&self.accel, self.state.match_hist(), ofs);
            debug_assert!(
                !matches!(decision, LzDecision::Match { dist, .. } if dist > self.accel.history_len(ofs))
            );
            self.state
                .encode(&mut self.codec, &self.accel, ofs, decision, &mut self.stats)?;
            ofs += decision.len();
            num_decisions += 1;
        }
        self.state.encode_eob(&mut self.codec)?;
        self.codec.stop_encoding()?;

        let comp_len = self.codec.encoding_buf().len();
        if comp_len > buf.len() + RAW_BLOCK_OVERHEAD {
            warn!(
                block_index = self.block_index,
                src_len = buf.len(),
                comp_len,
                "block does not compress, storing raw"
            );
            self.state = snapshot;
            self.write_raw_block(buf)?;
        } else {
            trace!(
                block_index = self.block_index,
                src_len = buf.len(),
                comp_len,
                num_decisions,
                dict_ofs = self.block_start_dict_ofs,
                "compressed block"
            );
            self.comp_buf.extend_from_slice(self.codec.encoding_buf());
            self.block_index += 1;
        }

        self.accel.advance_bytes(len);
        Ok(())
    }

    fn write_raw_block(&mut self, buf: &[u8]) -> Result<()> {
        self.start_block(BlockType::Raw, RAW_BLOCK_OVERHEAD)?;
        self.codec.encode_align_to_byte()?;
        self.codec.encode_bits(buf.len() as u32 - 1, 32)?;
        self.end_block()?;
        self.comp_buf.extend_from_slice(buf);
        Ok(())
    }

    fn write_sync_block(&mut self, flush_type: u32) -> Result<()> {
        self.start_block(BlockType::Sync, 8)?;
        self.codec.encode_bits(flush_type, BLOCK_FLUSH_TYPE_BITS)?;
        self.codec.encode_align_to_byte()?;
        self.codec.encode_bits(0x0000, 16)?;
        self.codec.encode_bits(0xFFFF, 16)?;
        self.end_block()?;

        match flush_type {
            FULL_FLUSH => self.state.reset(),
            TABLE_FLUSH => {
                self.state.reset_update_rate();
                if cfg!(feature = "update-stats") {
                    self.stats.total_update_rate_resets += 1;
                }
            }
            _ => debug_assert_eq!(flush_type, SYNC_FLUSH),
        }
        trace!(block_index = self.block_index, flush_type, "sync block");
        Ok(())
    }

    fn write_eof_block(&mut self) -> Result<()> {
        self.start_block(BlockType::Eof, 8)?;
        self.codec.encode_align_to_byte()?;
        self.codec.encode_bits(self.src_adler32.finish(), 32)?;
        self.end_block()?;
        Ok(())
    }

    /// Compressed bytes not yet handed out.
    pub fn pending_output(&self) -> &[u8] {
        &self.comp_buf[self.comp_ofs..]
    }

    /// Mark `num_bytes` of the pending output as delivered.
    pub fn consume_output(&mut self, num_bytes: usize) {
        self.comp_ofs = (self.comp_ofs + num_bytes).min(self.comp_buf.len());
        if self.comp_ofs == self.comp_buf.len() {
            self.comp_buf.clear();
            self.comp_ofs = 0;
        }
    }

    /// Take all pending output.
    pub fn take_output(&mut self) -> Vec<u8> {
        let mut out = std::mem::take(&mut self.comp_buf);
        out.drain(..self.comp_ofs);
        self.comp_ofs = 0;
        out
    }

    /// Validated parameters.
    pub fn params(&self) -> &InitParams {
        &self.params
    }

    /// Search effort of the configured level.
    pub fn settings(&self) -> &CompSettings {
        &self.settings
    }

    /// Match finder.
    pub fn accel(&self) -> &SearchAccelerator {
        &self.accel
    }

    /// Uncompressed block size.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Blocks written so far.
    pub fn block_index(&self) -> u32 {
        self.block_index
    }

    /// Whether the end-of-stream block has been written.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Source bytes accepted so far.
    pub fn src_size(&self) -> u64 {
        self.src_size
    }

    /// Adler-32 of the source bytes accepted so far.
    pub fn src_adler32(&self) -> u32 {
        self.src_adler32.finish()
    }

    /// Coding statistics (populated with the `update-stats` feature).
    pub fn stats(&self) -> &CodingStats {
        &self.stats
    }
}
