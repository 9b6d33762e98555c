/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use trpx::codec::{prolix_frame, significant_bits, skip_frame, terse_frame};
use trpx::cursor::BitCursor;
use trpx::error::Error;
use trpx::traits::Element;

/// Encode a frame, decode it back, compare, and return the encoded length
/// in bits.
fn roundtrip<T: Element + Default>(values: &[T], block: usize) -> u64 {
    let bound_bits = values.len() * T::BITS as usize + 12 * values.len().div_ceil(block) + 64;
    let mut words = vec![0u64; bound_bits.div_ceil(64)];
    let mut cursor = BitCursor::new(&mut words[..]);
    terse_frame(&mut cursor, values, block);
    let bits = cursor.position();

    let mut out = vec![T::default(); values.len()];
    let mut cursor = BitCursor::new(&words[..]);
    prolix_frame(
        &mut cursor,
        &mut out,
        block,
        T::IS_SIGNED,
        words.len() as u64 * 64,
    )
    .unwrap();
    assert_eq!(out, values);
    assert_eq!(cursor.position(), (bits + 7) & !7, "frame end is byte-aligned");
    bits
}

#[test]
fn test_significant_bits() {
    assert_eq!(significant_bits::<u16>(&[]), 0);
    assert_eq!(significant_bits(&[0u16; 8]), 0);
    assert_eq!(significant_bits(&[0u16, 1]), 1);
    assert_eq!(significant_bits(&[3u8, 4, 2]), 3);
    assert_eq!(significant_bits(&[40000u16]), 16);
    assert_eq!(significant_bits(&[u64::MAX]), 64);

    // signed: one extra bit for the sign
    assert_eq!(significant_bits(&[0i16; 8]), 0);
    assert_eq!(significant_bits(&[-1i16; 8]), 2);
    assert_eq!(significant_bits(&[-3i8, 4, 2]), 4);
    assert_eq!(significant_bits(&[255i16]), 9);

    // the most negative value is its own width in two's complement
    assert_eq!(significant_bits(&[i8::MIN]), 8);
    assert_eq!(significant_bits(&[i8::MIN, 127]), 8);
    assert_eq!(significant_bits(&[i16::MIN]), 16);
    assert_eq!(significant_bits(&[i64::MIN]), 64);
}

/// 1024 zeros: the width starts at zero, so every block reuses it for a
/// single header bit.
#[test]
fn test_all_zeros() {
    let bits = roundtrip(&[0u16; 1024], 8);
    assert_eq!(bits, 128);
}

/// A single spike: the first block pays a 12-bit header and a full-width
/// body, the second drops back to zero with a 4-bit header and no body.
#[test]
fn test_sparse_spike() {
    let mut values = [0u16; 16];
    values[7] = 40000;
    let bits = roundtrip(&values, 8);
    assert_eq!(bits, 12 + 8 * 16 + 4);
}

/// Block size one: no reuse savings, a fresh header per value.
#[test]
fn test_block_size_one() {
    let values = [3u8, 4, 2, 1, 0];
    // widths 2, 3, 2, 1, 0: all different from their predecessor
    let bits = roundtrip(&values, 1);
    assert_eq!(bits, 5 * 4 + (2 + 3 + 2 + 1 + 0));
}

/// A block of -1s needs two bits per value: one magnitude bit, one sign.
#[test]
fn test_signed_minus_one() {
    let bits = roundtrip(&[-1i16; 8], 8);
    assert_eq!(bits, 4 + 8 * 2);
}

#[test]
fn test_most_negative_values() {
    roundtrip(&[i8::MIN; 8], 8);
    roundtrip(&[i16::MIN; 8], 8);
    roundtrip(&[i32::MIN; 8], 8);
    roundtrip(&[i64::MIN; 8], 8);
    roundtrip(&[i64::MIN, i64::MAX, -1, 0, 1, 42, -42, i64::MIN], 8);
}

/// Consecutive blocks of equal width cost one header bit each after the
/// first.
#[test]
fn test_reuse_compactness() {
    // 64 values, all needing exactly 5 bits, in 8 blocks
    let values = [16u8; 64];
    let bits = roundtrip(&values, 8);
    assert_eq!(bits, 4 + 7 + 64 * 5);
}

#[test]
fn test_header_tiers() {
    // one-block frames exercising each header tier
    for (value, s, header_bits) in [
        (1u64 << 5, 6u64, 4u64), // 0 + 3-bit tier
        (1 << 6, 7, 6),          // 0 111 + 2-bit tier
        (1 << 8, 9, 6),
        (1 << 9, 10, 12), // 0 111 11 + 6-bit tier
        (1 << 63, 64, 12),
    ] {
        let bits = roundtrip(&[value; 4], 4);
        assert_eq!(bits, header_bits + 4 * s, "value {:#x}", value);
    }
}

fn random_roundtrip<T: Element + Default>(gen: impl Fn(&mut SmallRng) -> T) {
    let mut r = SmallRng::seed_from_u64(0xbeef);
    for block in [1usize, 7, 8, 12, 64] {
        for len in [0usize, 1, 7, 64, 1000] {
            // mostly-zero data with occasional spikes, like a diffraction frame
            let values: Vec<T> = (0..len)
                .map(|_| {
                    if r.gen_ratio(1, 10) {
                        gen(&mut r)
                    } else {
                        T::default()
                    }
                })
                .collect();
            let bits = roundtrip(&values, block);
            let bound = len as u64 * (T::BITS as u64 + 1) + 12 * len.div_ceil(block) as u64;
            assert!(bits <= bound, "{} bits exceeds bound {}", bits, bound);
        }
    }
}

#[test]
fn test_random_roundtrips() {
    random_roundtrip::<u8>(|r| r.gen());
    random_roundtrip::<i8>(|r| r.gen());
    random_roundtrip::<u16>(|r| r.gen());
    random_roundtrip::<i16>(|r| r.gen());
    random_roundtrip::<u32>(|r| r.gen());
    random_roundtrip::<i32>(|r| r.gen());
    random_roundtrip::<u64>(|r| r.gen());
    random_roundtrip::<i64>(|r| r.gen());
}

#[test]
fn test_skip_frame_matches_decode() {
    let mut r = SmallRng::seed_from_u64(7);
    let values: Vec<u16> = (0..999).map(|_| r.gen::<u16>() >> (r.gen::<u32>() % 16)).collect();
    let mut words = vec![0u64; (999usize * 16 + 84 * 12 + 64).div_ceil(64)];
    let mut cursor = BitCursor::new(&mut words[..]);
    terse_frame(&mut cursor, &values, 12);

    let end_bit = words.len() as u64 * 64;
    let mut out = vec![0u16; 999];
    let mut decode_cursor = BitCursor::new(&words[..]);
    prolix_frame(&mut decode_cursor, &mut out, 12, false, end_bit).unwrap();

    let mut skip_cursor = BitCursor::new(&words[..]);
    skip_frame(&mut skip_cursor, 999, 12, end_bit).unwrap();
    assert_eq!(skip_cursor.position(), decode_cursor.position());
}

/// A 12-bit header escape can declare up to 73 significant bits; anything
/// above 64 is corrupt.
#[test]
fn test_corrupt_width() {
    // header: escape 0, 111, 11, then 63 -> s = 73
    let words = vec![0b111110u64 | (63 << 6)];
    let mut out = vec![0u64; 1];
    let mut cursor = BitCursor::new(&words[..]);
    let result = prolix_frame(&mut cursor, &mut out, 8, false, 64);
    assert!(matches!(result, Err(Error::Corrupt { .. })));
}

/// A frame whose body runs past the end of the payload is corrupt.
#[test]
fn test_corrupt_truncated_body() {
    let values = [40000u16; 16];
    let mut words = vec![0u64; 8];
    let mut cursor = BitCursor::new(&mut words[..]);
    terse_frame(&mut cursor, &values, 8);
    let bits = cursor.position();

    let mut out = vec![0u16; 16];
    let mut cursor = BitCursor::new(&words[..]);
    assert!(prolix_frame(&mut cursor, &mut out, 8, false, bits).is_ok());

    let mut cursor = BitCursor::new(&words[..]);
    let result = prolix_frame(&mut cursor, &mut out, 8, false, bits - 8);
    assert!(matches!(result, Err(Error::Corrupt { .. })));

    // ... and so is one that ends in the middle of a header
    let mut cursor = BitCursor::new(&words[..]);
    let result = prolix_frame(&mut cursor, &mut out, 8, false, 6);
    assert!(matches!(result, Err(Error::Corrupt { .. })));
}
