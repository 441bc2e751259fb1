//! Integration tests for the LZHAM compressor through its public API.

use oxiarc_core::Adler32;
use oxiarc_lzham::{
    CompressFlags, CompressLevel, CompressParams, CompressState, CompressStatus, FlushMode,
    LzhamError, compress_memory, compress_to_vec,
};
use proptest::prelude::*;

fn text_data(len: usize) -> Vec<u8> {
    b"Lorem ipsum dolor sit amet, consectetur adipiscing elit. Sed do eiusmod tempor. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 16) as u8
        })
        .collect()
}

fn stream_all(state: &mut CompressState, data: &[u8], chunk: usize, out_buf: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; out_buf];
    for piece in data.chunks(chunk) {
        let mut input = piece;
        loop {
            let (consumed, written, status) = state.compress(input, &mut buf, FlushMode::None);
            out.extend_from_slice(&buf[..written]);
            input = &input[consumed..];
            if status == CompressStatus::NeedsMoreInput {
                break;
            }
            assert_eq!(status, CompressStatus::HasMoreOutput);
        }
    }
    loop {
        let (_, written, status) = state.compress(&[], &mut buf, FlushMode::Finish);
        out.extend_from_slice(&buf[..written]);
        if status == CompressStatus::Success {
            return out;
        }
        assert_eq!(status, CompressStatus::HasMoreOutput);
    }
}

fn trailer(comp: &[u8]) -> u32 {
    let n = comp.len();
    u32::from_be_bytes([comp[n - 4], comp[n - 3], comp[n - 2], comp[n - 1]])
}

// ============================================================================
// Stream framing
// ============================================================================

#[test]
fn test_empty_stream() {
    let params = CompressParams::new(15, CompressLevel::Default);
    let out = compress_to_vec(&params, &[]).unwrap();
    assert_eq!(out, [0xC0, 0x00, 0x00, 0x00, 0x01]);
}

#[test]
fn test_adler32_trailer() {
    for data in [text_data(12_345), noise(3000, 7), vec![0u8; 70_000]] {
        let params = CompressParams::new(16, CompressLevel::Faster);
        let out = compress_to_vec(&params, &data).unwrap();
        assert_eq!(trailer(&out), Adler32::checksum(&data));
    }
}

#[test]
fn test_zlib_header() {
    let data = text_data(1000);
    for level in CompressLevel::ALL {
        for log2 in [15u32, 18, 22] {
            let params = CompressParams::new(log2, level).with_flags(
                CompressFlags::WRITE_ZLIB_STREAM | CompressFlags::USE_LOW_MEMORY_MATCH_FINDER,
            );
            let out = compress_to_vec(&params, &data).unwrap();
            let (cmf, flg) = (out[0], out[1]);
            assert_eq!(cmf & 0x0F, 14);
            assert_eq!(u32::from(cmf >> 4), log2 - 15);
            assert_eq!(((u16::from(cmf) << 8) | u16::from(flg)) % 31, 0);
            assert_eq!(flg & 32, 0);
            assert_eq!(flg >> 6, level.zlib_level_hint());
        }
    }
}

#[test]
fn test_zlib_header_marks_seeded_stream() {
    let seed = text_data(2000);
    let params = CompressParams::new(15, CompressLevel::Default)
        .with_flags(CompressFlags::WRITE_ZLIB_STREAM)
        .with_seed_bytes(seed);
    let out = compress_to_vec(&params, b"consectetur adipiscing").unwrap();
    assert_eq!(out[1] & 32, 32);
    assert_eq!(((u16::from(out[0]) << 8) | u16::from(out[1])) % 31, 0);
}

// ============================================================================
// Compression behaviour
// ============================================================================

#[test]
fn test_repetitive_data_compresses() {
    let data = text_data(100_000);
    for level in CompressLevel::ALL {
        let params = CompressParams::new(17, level);
        let out = compress_to_vec(&params, &data).unwrap();
        assert!(
            out.len() < data.len() / 20,
            "{level:?}: {} -> {}",
            data.len(),
            out.len()
        );
    }
}

#[test]
fn test_incompressible_data_is_bounded() {
    let data = noise(4000, 99);
    let params = CompressParams::new(15, CompressLevel::Uber);
    let out = compress_to_vec(&params, &data).unwrap();
    // One block of at most len + 5 bytes, then the 5-byte trailer block.
    assert!(out.len() <= data.len() + 10, "{}", out.len());
}

#[test]
fn test_output_is_deterministic() {
    let mut data = text_data(40_000);
    data.extend(noise(10_000, 3));
    data.extend(text_data(40_000));
    let params = CompressParams::new(18, CompressLevel::Better)
        .with_flags(CompressFlags::DETERMINISTIC_PARSING);
    let a = compress_to_vec(&params, &data).unwrap();
    let b = compress_to_vec(&params, &data).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_seed_bytes_shrink_output() {
    let data = noise(8000, 1234);
    let plain = CompressParams::new(15, CompressLevel::Default);
    let seeded = plain.clone().with_seed_bytes(data.clone());

    let without = compress_to_vec(&plain, &data).unwrap();
    let with = compress_to_vec(&seeded, &data).unwrap();
    assert!(with.len() * 10 < without.len(), "{} vs {}", with.len(), without.len());
    assert_eq!(trailer(&with), Adler32::checksum(&data));
}

#[test]
fn test_extreme_parsing_and_tradeoff() {
    let data = text_data(60_000);
    let params = CompressParams::new(16, CompressLevel::Uber).with_flags(
        CompressFlags::EXTREME_PARSING | CompressFlags::TRADEOFF_DECOMPRESSION_RATE_FOR_RATIO,
    );
    let out = compress_to_vec(&params, &data).unwrap();
    assert!(out.len() < data.len() / 20);
    assert_eq!(trailer(&out), Adler32::checksum(&data));
}

// ============================================================================
// Streaming
// ============================================================================

#[test]
fn test_streaming_equals_one_shot() {
    let mut data = text_data(30_000);
    data.extend(noise(5000, 42));
    let params = CompressParams::new(15, CompressLevel::Default);
    let expected = compress_to_vec(&params, &data).unwrap();

    for (chunk, out_buf) in [(1, 64), (777, 1), (4096, 4096), (30_000, 13)] {
        let mut state = CompressState::init(&params).unwrap();
        assert_eq!(stream_all(&mut state, &data, chunk, out_buf), expected);
    }
}

#[test]
fn test_terminal_status_is_sticky() {
    let params = CompressParams::new(15, CompressLevel::Fastest);
    let mut state = CompressState::init(&params).unwrap();
    let _ = stream_all(&mut state, b"abc", 3, 64);
    assert_eq!(state.status(), CompressStatus::Success);

    let mut buf = [0u8; 16];
    let (consumed, written, status) = state.compress(b"def", &mut buf, FlushMode::Finish);
    assert_eq!((consumed, written, status), (0, 0, CompressStatus::Success));
}

#[test]
fn test_flush_modes_between_chunks() {
    let data = text_data(20_000);
    let params = CompressParams::new(15, CompressLevel::Default);
    let mut state = CompressState::init(&params).unwrap();
    let mut out = Vec::new();
    let mut buf = vec![0u8; 32_768];
    let modes = [FlushMode::Sync, FlushMode::Full, FlushMode::Table, FlushMode::None];
    for (piece, mode) in data.chunks(5000).zip(modes) {
        let (consumed, written, status) = state.compress(piece, &mut buf, mode);
        assert_eq!(consumed, piece.len());
        assert_eq!(status, CompressStatus::NeedsMoreInput);
        out.extend_from_slice(&buf[..written]);
    }
    let (_, written, status) = state.compress(&[], &mut buf, FlushMode::Finish);
    assert_eq!(status, CompressStatus::Success);
    out.extend_from_slice(&buf[..written]);

    // Each flush ends on a byte boundary with the 0x0000FFFF marker.
    let markers = out.windows(4).filter(|w| *w == [0x00, 0x00, 0xFF, 0xFF]).count();
    assert!(markers >= 3);
    assert_eq!(trailer(&out), Adler32::checksum(&data));
}

#[test]
fn test_reinit_reproduces_stream() {
    let data = text_data(9000);
    let params = CompressParams::new(15, CompressLevel::Better)
        .with_flags(CompressFlags::WRITE_ZLIB_STREAM);
    let mut state = CompressState::init(&params).unwrap();
    let first = stream_all(&mut state, &data, 1000, 100);

    let mut state = CompressState::reinit(Some(state)).unwrap();
    let second = stream_all(&mut state, &data, 3000, 7);
    assert_eq!(first, second);
}

#[test]
fn test_reinit_without_state() {
    let err = CompressState::reinit(None).unwrap_err();
    assert!(matches!(err, LzhamError::NilCompressState));
    assert_eq!(err.status(), CompressStatus::InvalidParameter);
}

// ============================================================================
// Parameter validation and buffers
// ============================================================================

#[test]
fn test_invalid_parameters() {
    for log2 in [14, 30] {
        let params = CompressParams::new(log2, CompressLevel::Default);
        assert!(matches!(
            CompressState::init(&params),
            Err(LzhamError::InvalidDictSizeLog2(l)) if l == log2
        ));
    }

    let mut params = CompressParams::new(15, CompressLevel::Default);
    params.extreme_parsing_max_best_arrivals = 9;
    let err = CompressState::init(&params).unwrap_err();
    assert_eq!(err.status(), CompressStatus::InvalidParameter);

    let mut params = CompressParams::new(15, CompressLevel::Default);
    params.num_seed_bytes = 16;
    let err = compress_to_vec(&params, b"data").unwrap_err();
    assert_eq!(err.status(), CompressStatus::InvalidParameter);

    let params = CompressParams::new(15, CompressLevel::Default).with_seed_bytes(vec![0u8; 40_000]);
    assert!(CompressState::init(&params).is_err());
}

#[test]
fn test_compress_memory() {
    let data = text_data(10_000);
    let params = CompressParams::new(15, CompressLevel::Default);
    let expected = compress_to_vec(&params, &data).unwrap();

    let mut dst = vec![0u8; expected.len()];
    assert_eq!(compress_memory(&params, &mut dst, &data).unwrap(), expected.len());
    assert_eq!(dst, expected);

    let mut small = vec![0u8; expected.len() - 1];
    let err = compress_memory(&params, &mut small, &data).unwrap_err();
    assert!(matches!(
        err,
        LzhamError::OutputBufTooSmall { available, .. } if available == expected.len() - 1
    ));
    assert_eq!(err.status(), CompressStatus::OutputBufTooSmall);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_trailer_and_bound(data in proptest::collection::vec(any::<u8>(), 0..2000), level in 0u32..5) {
        let level = CompressLevel::try_from(level).unwrap();
        let params = CompressParams::new(15, level);
        let out = compress_to_vec(&params, &data).unwrap();
        prop_assert!(out.len() <= data.len() + 10);
        prop_assert_eq!(trailer(&out), Adler32::checksum(&data));
    }

    #[test]
    fn prop_streaming_matches(data in proptest::collection::vec(0u8..4, 0..3000), chunk in 1usize..500) {
        let params = CompressParams::new(15, CompressLevel::Faster);
        let expected = compress_to_vec(&params, &data).unwrap();
        let mut state = CompressState::init(&params).unwrap();
        prop_assert_eq!(stream_all(&mut state, &data, chunk, 33), expected);
    }
}
