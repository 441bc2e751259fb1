//! Bit-level codec interleaving raw bits, Huffman codes and arithmetic-coded
//! binary decisions in a single MSB-first stream.
//!
//! While encoding, the arithmetic coder runs eagerly into its own byte
//! buffer (carries can ripple back through already emitted bytes) and every
//! primitive is also logged as an [`OutputSymbol`] record. `stop_encoding`
//! flushes the arithmetic coder and replays the records once, in program
//! order, placing arithmetic bytes exactly where the decoder will need them
//! to renormalise. Decoding reads the stream directly; reads past the end
//! yield zero bits.

use crate::error::{LzhamError, Result};
use crate::model::{ARITH_PROB_BITS, AdaptiveBitModel, QuasiAdaptiveHuffmanModel};
use oxiarc_core::OxiArcError;

/// Width of the bit accumulator.
pub const BIT_BUF_SIZE: u32 = 64;

/// Arithmetic interval length below which the coder renormalises.
pub const ARITH_MIN_LEN: u32 = 1 << 24;
/// Arithmetic interval length after initialization.
pub const ARITH_MAX_LEN: u32 = 0xFFFF_FFFF;

/// Largest raw bit field a single record holds.
const MAX_RECORD_BITS: u32 = 16;

/// What the codec is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecMode {
    /// Idle.
    #[default]
    Null,
    /// Between `start_encoding` and `stop_encoding`.
    Encoding,
    /// Between `start_decoding` and `stop_decoding`.
    Decoding,
}

/// One deferred encoding primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSymbol {
    /// Raw bits, MSB first.
    Bits {
        /// Value, already masked to `num_bits`.
        bits: u32,
        /// Field width, 1 to 16.
        num_bits: u8,
    },
    /// Arithmetic-coded decision with the probability it was coded under.
    Arith {
        /// Decision value.
        bit: bool,
        /// Probability of zero at coding time.
        prob0: u16,
    },
    /// Zero padding to the next byte boundary.
    AlignToByte,
    /// Start of an arithmetic run: four code bytes follow.
    ArithInit,
}

/// Bit-exact symbol encoder/decoder.
#[derive(Debug, Default)]
pub struct SymbolCodec {
    mode: CodecMode,

    bit_buf: u64,
    bit_count: u32,

    total_model_updates: u32,
    total_bits_written: u64,

    output_buf: Vec<u8>,
    arith_output_buf: Vec<u8>,
    output_syms: Vec<OutputSymbol>,

    arith_base: u32,
    arith_value: u32,
    arith_length: u32,
    arith_active: bool,

    decode_buf: Vec<u8>,
    decode_ofs: usize,
}

impl SymbolCodec {
    /// Idle codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all buffers and state; the codec returns to `Null` mode.
    pub fn reset(&mut self) {
        self.mode = CodecMode::Null;
        self.bit_buf = 0;
        self.bit_count = 0;
        self.total_model_updates = 0;
        self.total_bits_written = 0;
        self.output_buf.clear();
        self.arith_output_buf.clear();
        self.output_syms.clear();
        self.arith_base = 0;
        self.arith_value = 0;
        self.arith_length = 0;
        self.arith_active = false;
        self.decode_buf.clear();
        self.decode_ofs = 0;
    }

    /// Current mode.
    pub fn mode(&self) -> CodecMode {
        self.mode
    }

    /// Huffman table rebuilds triggered through this codec.
    pub fn total_model_updates(&self) -> u32 {
        self.total_model_updates
    }

    /// Bits logged since `start_encoding`, excluding arithmetic output.
    pub fn total_bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Number of deferred records logged since `start_encoding`.
    pub fn num_output_syms(&self) -> usize {
        self.output_syms.len()
    }

    fn require(&self, expected: CodecMode) -> Result<()> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(LzhamError::InvalidCodecState {
                expected,
                actual: self.mode,
            })
        }
    }

    // ------------------------------------------------------------------
    // Encoding
    // ------------------------------------------------------------------

    /// Begin an encoding session, discarding any previous output.
    pub fn start_encoding(&mut self, expected_file_size: usize) -> Result<()> {
        if self.mode == CodecMode::Decoding {
            return Err(LzhamError::InvalidCodecState {
                expected: CodecMode::Null,
                actual: self.mode,
            });
        }
        let updates = self.total_model_updates;
        self.reset();
        self.total_model_updates = updates;
        self.output_buf.reserve(expected_file_size);
        self.arith_output_buf.reserve(expected_file_size / 2 + 4);
        self.mode = CodecMode::Encoding;
        Ok(())
    }

    /// Log `num_bits` (at most 32) raw bits of `bits`.
    pub fn encode_bits(&mut self, bits: u32, num_bits: u32) -> Result<()> {
        self.require(CodecMode::Encoding)?;
        debug_assert!(num_bits <= 32);
        if num_bits == 0 {
            return Ok(());
        }
        let bits = if num_bits == 32 {
            bits
        } else {
            bits & ((1 << num_bits) - 1)
        };
        if num_bits > MAX_RECORD_BITS {
            self.push_bits(bits >> MAX_RECORD_BITS, num_bits - MAX_RECORD_BITS);
            self.push_bits(bits & 0xFFFF, MAX_RECORD_BITS);
        } else {
            self.push_bits(bits, num_bits);
        }
        Ok(())
    }

    fn push_bits(&mut self, bits: u32, num_bits: u32) {
        self.output_syms.push(OutputSymbol::Bits {
            bits,
            num_bits: num_bits as u8,
        });
        self.total_bits_written += num_bits as u64;
    }

    /// Pad with zero bits to the next byte boundary of the assembled stream.
    pub fn encode_align_to_byte(&mut self) -> Result<()> {
        self.require(CodecMode::Encoding)?;
        self.output_syms.push(OutputSymbol::AlignToByte);
        Ok(())
    }

    /// Start an arithmetic run. A session holds at most one run.
    pub fn encode_arith_init(&mut self) -> Result<()> {
        self.require(CodecMode::Encoding)?;
        debug_assert!(!self.arith_active, "one arithmetic run per session");
        self.output_syms.push(OutputSymbol::ArithInit);
        self.arith_base = 0;
        self.arith_length = ARITH_MAX_LEN;
        self.arith_active = true;
        Ok(())
    }

    /// Code `bit` under `model` and adapt the model.
    pub fn encode_bit(&mut self, bit: bool, model: &mut AdaptiveBitModel) -> Result<()> {
        self.require(CodecMode::Encoding)?;
        debug_assert!(self.arith_active, "encode_arith_init must come first");

        let prob0 = model.prob0();
        self.output_syms.push(OutputSymbol::Arith {
            bit,
            prob0: prob0 as u16,
        });

        let x = (self.arith_length >> ARITH_PROB_BITS) * prob0;
        if bit {
            let orig_base = self.arith_base;
            self.arith_base = self.arith_base.wrapping_add(x);
            self.arith_length -= x;
            if orig_base > self.arith_base {
                self.arith_propagate_carry();
            }
        } else {
            self.arith_length = x;
        }

        if self.arith_length < ARITH_MIN_LEN {
            self.arith_renorm_enc_interval();
        }

        model.update(bit);
        Ok(())
    }

    /// Code `sym` with the model's current Huffman code and record it.
    pub fn encode(&mut self, sym: u32, model: &mut QuasiAdaptiveHuffmanModel) -> Result<()> {
        self.require(CodecMode::Encoding)?;
        let (code, size) = model.code(sym);
        self.push_bits(code, size);
        if model.record(sym) {
            self.total_model_updates += 1;
        }
        Ok(())
    }

    fn arith_propagate_carry(&mut self) {
        for byte in self.arith_output_buf.iter_mut().rev() {
            if *byte == 0xFF {
                *byte = 0;
            } else {
                *byte += 1;
                break;
            }
        }
    }

    fn arith_renorm_enc_interval(&mut self) {
        loop {
            self.arith_output_buf.push((self.arith_base >> 24) as u8);
            self.arith_base <<= 8;
            self.arith_length <<= 8;
            if self.arith_length >= ARITH_MIN_LEN {
                break;
            }
        }
    }

    fn arith_stop_encoding(&mut self) {
        let orig_base = self.arith_base;
        if self.arith_length > 2 * ARITH_MIN_LEN {
            self.arith_base = self.arith_base.wrapping_add(ARITH_MIN_LEN);
            self.arith_length = ARITH_MIN_LEN >> 1;
        } else {
            self.arith_base = self.arith_base.wrapping_add(ARITH_MIN_LEN >> 1);
            self.arith_length = ARITH_MIN_LEN >> 9;
        }
        if orig_base > self.arith_base {
            self.arith_propagate_carry();
        }
        self.arith_renorm_enc_interval();
        while self.arith_output_buf.len() < 4 {
            self.arith_output_buf.push(0);
        }
        self.arith_active = false;
    }

    /// Flush the arithmetic coder and assemble the final byte stream.
    pub fn stop_encoding(&mut self) -> Result<()> {
        self.require(CodecMode::Encoding)?;
        if self.arith_active {
            self.arith_stop_encoding();
        }
        self.assemble_output_buf();
        self.mode = CodecMode::Null;
        Ok(())
    }

    #[inline]
    fn put_bits(&mut self, bits: u32, num_bits: u32) {
        debug_assert!(num_bits <= 32 && self.bit_count < 8);
        self.bit_buf |= (bits as u64) << (BIT_BUF_SIZE - num_bits - self.bit_count);
        self.bit_count += num_bits;
        while self.bit_count >= 8 {
            self.output_buf.push((self.bit_buf >> 56) as u8);
            self.bit_buf <<= 8;
            self.bit_count -= 8;
        }
    }

    fn assemble_output_buf(&mut self) {
        self.output_buf.clear();
        self.bit_buf = 0;
        self.bit_count = 0;

        let syms = std::mem::take(&mut self.output_syms);
        let mut arith_ofs = 0usize;
        let mut length = 0u32;

        for &sym in &syms {
            match sym {
                OutputSymbol::Bits { bits, num_bits } => self.put_bits(bits, num_bits as u32),
                OutputSymbol::AlignToByte => {
                    if self.bit_count > 0 {
                        self.put_bits(0, 8 - self.bit_count);
                    }
                }
                OutputSymbol::ArithInit => {
                    for _ in 0..4 {
                        let c = self.arith_output_buf.get(arith_ofs).copied().unwrap_or(0);
                        arith_ofs += 1;
                        self.put_bits(c as u32, 8);
                    }
                    length = ARITH_MAX_LEN;
                }
                OutputSymbol::Arith { bit, prob0 } => {
                    // Same renormalisation points as the decoder.
                    while length < ARITH_MIN_LEN {
                        let c = self.arith_output_buf.get(arith_ofs).copied().unwrap_or(0);
                        arith_ofs += 1;
                        self.put_bits(c as u32, 8);
                        length <<= 8;
                    }
                    let x = (length >> ARITH_PROB_BITS) * prob0 as u32;
                    if bit {
                        length -= x;
                    } else {
                        length = x;
                    }
                }
            }
        }

        if self.bit_count > 0 {
            self.put_bits(0, 8 - self.bit_count);
        }
        self.output_syms = syms;
    }

    /// Assembled output of the last encoding session.
    pub fn encoding_buf(&self) -> &[u8] {
        &self.output_buf
    }

    /// Take the assembled output of the last encoding session.
    pub fn take_encoding_buf(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output_buf)
    }

    // ------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------

    /// Begin decoding `buf`.
    pub fn start_decoding(&mut self, buf: &[u8]) -> Result<()> {
        if self.mode == CodecMode::Encoding {
            return Err(LzhamError::InvalidCodecState {
                expected: CodecMode::Null,
                actual: self.mode,
            });
        }
        self.reset();
        self.decode_buf.extend_from_slice(buf);
        self.mode = CodecMode::Decoding;
        Ok(())
    }

    /// Bits consumed so far.
    pub fn decode_bit_position(&self) -> u64 {
        self.decode_ofs as u64 * 8 - self.bit_count as u64
    }

    #[inline]
    fn get_bits(&mut self, num_bits: u32) -> u32 {
        if num_bits == 0 {
            return 0;
        }
        while self.bit_count < num_bits {
            let c = self.decode_buf.get(self.decode_ofs).copied().unwrap_or(0);
            self.decode_ofs += 1;
            self.bit_buf |= (c as u64) << (BIT_BUF_SIZE - 8 - self.bit_count);
            self.bit_count += 8;
        }
        let result = (self.bit_buf >> (BIT_BUF_SIZE - num_bits)) as u32;
        self.bit_buf <<= num_bits;
        self.bit_count -= num_bits;
        result
    }

    /// Read `num_bits` (at most 32) raw bits.
    pub fn decode_bits(&mut self, num_bits: u32) -> Result<u32> {
        self.require(CodecMode::Decoding)?;
        debug_assert!(num_bits <= 32);
        if num_bits > MAX_RECORD_BITS {
            let hi = self.get_bits(num_bits - MAX_RECORD_BITS);
            let lo = self.get_bits(MAX_RECORD_BITS);
            Ok((hi << MAX_RECORD_BITS) | lo)
        } else {
            Ok(self.get_bits(num_bits))
        }
    }

    /// Skip to the next byte boundary.
    pub fn decode_align_to_byte(&mut self) -> Result<()> {
        self.require(CodecMode::Decoding)?;
        let partial = self.bit_count & 7;
        self.get_bits(partial);
        Ok(())
    }

    /// Start an arithmetic run by reading four code bytes.
    pub fn start_arith_decoding(&mut self) -> Result<()> {
        self.require(CodecMode::Decoding)?;
        self.arith_length = ARITH_MAX_LEN;
        self.arith_value = 0;
        for _ in 0..4 {
            self.arith_value = (self.arith_value << 8) | self.get_bits(8);
        }
        Ok(())
    }

    /// Decode one decision under `model` and adapt the model.
    pub fn decode_bit(&mut self, model: &mut AdaptiveBitModel) -> Result<bool> {
        self.require(CodecMode::Decoding)?;
        while self.arith_length < ARITH_MIN_LEN {
            self.arith_value = (self.arith_value << 8) | self.get_bits(8);
            self.arith_length <<= 8;
        }

        let x = (self.arith_length >> ARITH_PROB_BITS) * model.prob0();
        let bit = self.arith_value >= x;
        if bit {
            self.arith_value -= x;
            self.arith_length -= x;
        } else {
            self.arith_length = x;
        }
        model.update(bit);
        Ok(bit)
    }

    /// Decode one Huffman-coded symbol under `model` and record it.
    pub fn decode(&mut self, model: &mut QuasiAdaptiveHuffmanModel) -> Result<u32> {
        self.require(CodecMode::Decoding)?;
        let bit_position = self.decode_bit_position();
        let sym = model
            .decode_with(|| self.get_bits(1))
            .ok_or_else(|| OxiArcError::invalid_huffman(bit_position))?;
        if model.record(sym) {
            self.total_model_updates += 1;
        }
        Ok(sym)
    }

    /// End the decoding session.
    pub fn stop_decoding(&mut self) -> Result<()> {
        self.require(CodecMode::Decoding)?;
        self.mode = CodecMode::Null;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic xorshift stream for test inputs.
    fn xorshift(seed: &mut u32) -> u32 {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 17;
        *seed ^= *seed << 5;
        *seed
    }

    #[test]
    fn test_raw_bits_roundtrip() {
        let mut codec = SymbolCodec::new();
        codec.start_encoding(16).unwrap();
        codec.encode_bits(0b101, 3).unwrap();
        codec.encode_bits(0xDEAD_BEEF, 32).unwrap();
        codec.encode_align_to_byte().unwrap();
        codec.encode_bits(0x3F, 6).unwrap();
        codec.stop_encoding().unwrap();
        let buf = codec.take_encoding_buf();
        assert_eq!(buf.len(), 6);
        assert_eq!(buf[0], 0b1011_1011);

        codec.start_decoding(&buf).unwrap();
        assert_eq!(codec.decode_bits(3).unwrap(), 0b101);
        assert_eq!(codec.decode_bits(32).unwrap(), 0xDEAD_BEEF);
        codec.decode_align_to_byte().unwrap();
        assert_eq!(codec.decode_bits(6).unwrap(), 0x3F);
        // Past the end reads zeros.
        assert_eq!(codec.decode_bits(16).unwrap(), 0);
        codec.stop_decoding().unwrap();
    }

    #[test]
    fn test_invalid_huffman_code() {
        // A one-symbol table only has the code `0`.
        let mut model = QuasiAdaptiveHuffmanModel::new(1, 0, 0);
        let mut codec = SymbolCodec::new();
        codec.start_decoding(&[0x7F, 0xFF, 0xFF]).unwrap();
        assert_eq!(codec.decode(&mut model).unwrap(), 0);
        assert!(matches!(
            codec.decode(&mut model),
            Err(LzhamError::Core(OxiArcError::InvalidHuffmanCode { bit_position: 1 }))
        ));
    }

    #[test]
    fn test_mixed_symbols_roundtrip() {
        let mut seed = 0x1234_5678;
        let ops: Vec<(u32, u32)> = (0..5000)
            .map(|_| {
                let r = xorshift(&mut seed);
                (r % 4, r >> 8)
            })
            .collect();

        let mut enc_models = vec![AdaptiveBitModel::new(); 3];
        let mut enc_huff = QuasiAdaptiveHuffmanModel::new(64, 64, 64);
        let mut codec = SymbolCodec::new();
        codec.start_encoding(4096).unwrap();
        codec.encode_bits(0x2, 2).unwrap();
        codec.encode_arith_init().unwrap();
        for &(kind, value) in &ops {
            match kind {
                0 => codec.encode_bits(value & 0x1FF, 9).unwrap(),
                1 => {
                    // Skewed decisions so the models adapt.
                    let bit = value % 7 == 0;
                    codec.encode_bit(bit, &mut enc_models[(value % 3) as usize]).unwrap();
                }
                2 => codec.encode((value % 17) * 3 % 64, &mut enc_huff).unwrap(),
                _ => codec.encode_bit(value & 1 == 1, &mut enc_models[0]).unwrap(),
            }
        }
        codec.encode_align_to_byte().unwrap();
        codec.encode_bits(0xABCD, 16).unwrap();
        codec.stop_encoding().unwrap();
        let enc_updates = codec.total_model_updates();
        let buf = codec.take_encoding_buf();
        assert!(enc_updates > 0);

        let mut dec_models = vec![AdaptiveBitModel::new(); 3];
        let mut dec_huff = QuasiAdaptiveHuffmanModel::new(64, 64, 64);
        codec.start_decoding(&buf).unwrap();
        assert_eq!(codec.decode_bits(2).unwrap(), 0x2);
        codec.start_arith_decoding().unwrap();
        for (i, &(kind, value)) in ops.iter().enumerate() {
            match kind {
                0 => assert_eq!(codec.decode_bits(9).unwrap(), value & 0x1FF, "op {i}"),
                1 => {
                    let bit = codec.decode_bit(&mut dec_models[(value % 3) as usize]).unwrap();
                    assert_eq!(bit, value % 7 == 0, "op {i}");
                }
                2 => assert_eq!(codec.decode(&mut dec_huff).unwrap(), (value % 17) * 3 % 64, "op {i}"),
                _ => assert_eq!(codec.decode_bit(&mut dec_models[0]).unwrap(), value & 1 == 1, "op {i}"),
            }
        }
        codec.decode_align_to_byte().unwrap();
        assert_eq!(codec.decode_bits(16).unwrap(), 0xABCD);
        assert_eq!(codec.total_model_updates(), enc_updates);
        assert_eq!(dec_models, enc_models);
    }

    #[test]
    fn test_long_run_of_certain_bits() {
        // Drives the probability to its extremes and exercises carries.
        let mut model = AdaptiveBitModel::new();
        let mut codec = SymbolCodec::new();
        codec.start_encoding(0).unwrap();
        codec.encode_arith_init().unwrap();
        for i in 0..20_000 {
            codec.encode_bit(i % 1000 != 999, &mut model).unwrap();
        }
        codec.stop_encoding().unwrap();
        let buf = codec.take_encoding_buf();

        let mut model = AdaptiveBitModel::new();
        codec.start_decoding(&buf).unwrap();
        codec.start_arith_decoding().unwrap();
        for i in 0..20_000 {
            assert_eq!(codec.decode_bit(&mut model).unwrap(), i % 1000 != 999, "bit {i}");
        }
    }

    #[test]
    fn test_mode_errors() {
        let mut codec = SymbolCodec::new();
        let mut model = AdaptiveBitModel::new();
        assert!(matches!(
            codec.encode_bits(1, 1),
            Err(LzhamError::InvalidCodecState {
                expected: CodecMode::Encoding,
                actual: CodecMode::Null
            })
        ));
        assert!(codec.decode_bits(1).is_err());
        assert!(codec.stop_encoding().is_err());

        codec.start_encoding(0).unwrap();
        assert!(codec.decode_bit(&mut model).is_err());
        assert!(codec.start_decoding(&[0]).is_err());
        codec.stop_encoding().unwrap();

        codec.start_decoding(&[0xFF]).unwrap();
        assert!(matches!(
            codec.encode_align_to_byte(),
            Err(LzhamError::InvalidCodecState {
                expected: CodecMode::Encoding,
                actual: CodecMode::Decoding
            })
        ));
        assert!(codec.start_encoding(0).is_err());
    }

    #[test]
    fn test_reset_clears_state() {
        let mut codec = SymbolCodec::new();
        codec.start_encoding(0).unwrap();
        codec.encode_bits(7, 3).unwrap();
        codec.reset();
        assert_eq!(codec.mode(), CodecMode::Null);
        assert_eq!(codec.total_bits_written(), 0);
        assert_eq!(codec.num_output_syms(), 0);
        assert!(codec.encoding_buf().is_empty());
    }
}
