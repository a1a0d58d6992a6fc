//! Tests for the block codec
//!
//! These tests verify:
//! - Alignment rounding
//! - Header packing of length and type
//! - Trailer computation
//! - File header encoding and magic validation

use sndo::block::{
    align_up, decode_file_header, decode_header, encode_file_header, encode_header,
    encode_trailer, trailer, trailer_matches, BlockType, FILE_HEADER_SIZE, MAGIC,
    MAX_PERSISTED_SIZE,
};
use sndo::SndoError;

// =============================================================================
// Alignment Tests
// =============================================================================

#[test]
fn test_align_up_range() {
    for n in 0..1000u64 {
        let aligned = align_up(n);
        assert_eq!(aligned % 8, 0, "align_up({}) = {}", n, aligned);
        assert!(aligned >= n && aligned <= n + 7, "align_up({}) = {}", n, aligned);
    }
}

#[test]
fn test_align_up_fixed_points() {
    assert_eq!(align_up(0), 0);
    assert_eq!(align_up(1), 8);
    assert_eq!(align_up(8), 8);
    assert_eq!(align_up(9), 16);
    assert_eq!(align_up(4 * 1024 * 1024 - 1), 4 * 1024 * 1024);
}

// =============================================================================
// Block Type Tests
// =============================================================================

#[test]
fn test_block_type_range() {
    for tag in 0..=7u8 {
        assert_eq!(BlockType::new(tag).unwrap().get(), tag);
    }
    assert!(BlockType::new(8).is_none());
    assert!(BlockType::FILLER.is_filler());
    assert!(!BlockType::new(1).unwrap().is_filler());
}

#[test]
fn test_block_type_try_from() {
    assert_eq!(BlockType::try_from(3u8).unwrap(), BlockType::new(3).unwrap());
    assert!(matches!(BlockType::try_from(200u8), Err(SndoError::Config(_))));
}

// =============================================================================
// Header / Trailer Tests
// =============================================================================

#[test]
fn test_header_round_trip_all_types() {
    for tag in 0..=7u8 {
        let block_type = BlockType::new(tag).unwrap();
        for len in [0u32, 8, 16, 4096, 4 * 1024 * 1024 - 8] {
            let raw = encode_header(len, block_type);
            assert_eq!(decode_header(raw), (len, block_type));
        }
    }
}

#[test]
fn test_header_is_little_endian() {
    let raw = encode_header(16, BlockType::new(5).unwrap());
    assert_eq!(raw, [21, 0, 0, 0]);
}

#[test]
fn test_trailer_xor() {
    assert_eq!(trailer(16, 28), 16 ^ 28);
    assert_eq!(u32::from_le_bytes(encode_trailer(16, 28)), 12);
    assert!(trailer_matches(encode_trailer(24, 60), 24, 60));
}

#[test]
fn test_trailer_depends_on_position() {
    // Same length at a different address must not validate
    let raw = encode_trailer(32, 1000);
    assert!(!trailer_matches(raw, 32, 1008));
    assert!(!trailer_matches(raw, 40, 1000));
}

#[test]
fn test_trailer_truncates_address() {
    let far = (1u64 << 32) + 100;
    assert_eq!(trailer(8, far), trailer(8, 100));
}

// =============================================================================
// File Header Tests
// =============================================================================

#[test]
fn test_file_header_round_trip() {
    for size in [FILE_HEADER_SIZE, 64, 4 * 1024 * 1024, MAX_PERSISTED_SIZE] {
        let raw = encode_file_header(size);
        assert_eq!(&raw[0..4], MAGIC);
        assert_eq!(decode_file_header(&raw).unwrap(), size);
    }
}

#[test]
fn test_file_header_stores_size_shifted() {
    let raw = encode_file_header(64);
    assert_eq!(&raw, b"Sndo\x10\x00\x00\x00");
}

#[test]
fn test_file_header_bad_magic() {
    let mut raw = encode_file_header(64);
    raw[0] = b'X';

    let result = decode_file_header(&raw);
    assert!(matches!(result, Err(SndoError::InvalidFile(_))));
}

#[test]
fn test_max_persisted_size_fits_field() {
    assert_eq!(MAX_PERSISTED_SIZE % 8, 0);
    assert!(MAX_PERSISTED_SIZE >> 2 <= u32::MAX as u64);
    assert!(MAX_PERSISTED_SIZE < 16 * 1024 * 1024 * 1024);
}
