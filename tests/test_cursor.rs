/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use trpx::cursor::BitCursor;
use trpx::traits::Word;

/// Write a pseudorandom sequence of fields of pseudorandom widths, then
/// read it back.
fn write_read_roundtrip<W: Word>() {
    const N: usize = 10_000;
    let mut widths = SmallRng::seed_from_u64(0);
    let mut values = SmallRng::seed_from_u64(1);

    let mut buffer = vec![W::ZERO; N * 64 / W::BITS + 2];
    let mut cursor = BitCursor::new(&mut buffer[..]);
    for _ in 0..N {
        let n = widths.gen_range(1..=64usize);
        let value = values.gen::<u64>() & (u64::MAX >> (64 - n));
        cursor.write_bits(value, n);
    }
    let written = cursor.position();

    let mut widths = SmallRng::seed_from_u64(0);
    let mut values = SmallRng::seed_from_u64(1);
    let mut cursor = BitCursor::new(&buffer[..]);
    for _ in 0..N {
        let n = widths.gen_range(1..=64usize);
        let value = values.gen::<u64>() & (u64::MAX >> (64 - n));
        assert_eq!(cursor.read_bits(n), value, "width {}", n);
    }
    assert_eq!(cursor.position(), written);
}

#[test]
fn test_write_read_roundtrip() {
    write_read_roundtrip::<u8>();
    write_read_roundtrip::<u16>();
    write_read_roundtrip::<u32>();
    write_read_roundtrip::<u64>();
}

/// The bit layout must not depend on the word width: the same writes into
/// `u8` words and into `u64` words produce the same octets.
#[test]
fn test_word_width_equivalence() {
    let mut bytes = vec![0u8; 64];
    let mut words = vec![0u64; 8];
    let mut byte_cursor = BitCursor::new(&mut bytes[..]);
    let mut word_cursor = BitCursor::new(&mut words[..]);

    let mut r = SmallRng::seed_from_u64(42);
    while byte_cursor.position() < 64 * 8 - 64 {
        let n = r.gen_range(1..=64usize);
        let value = r.gen::<u64>() & (u64::MAX >> (64 - n));
        byte_cursor.write_bits(value, n);
        word_cursor.write_bits(value, n);
    }

    let serialized: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
    assert_eq!(bytes, serialized);
}

#[test]
fn test_single_bits() {
    let mut words = vec![0u32; 2];
    let mut cursor = BitCursor::new(&mut words[..]);
    for bit in [true, false, true, true, false, true] {
        cursor.write_bit(bit);
        assert_eq!(cursor.read_bit(), bit);
        cursor.advance(1);
    }
    cursor.write_bit(true);
    cursor.write_bit(false); // overwrite, same position
    assert!(!cursor.read_bit());
    assert_eq!(cursor.position(), 6);

    cursor.set_position(0);
    assert_eq!(cursor.read_bits(6), 0b101101);
}

#[test]
fn test_signed_fields() {
    let mut words = vec![0u16; 8];
    let mut cursor = BitCursor::new(&mut words[..]);
    cursor.write_bits(-1i64 as u64, 2);
    cursor.write_bits(-3i64 as u64, 5);
    cursor.write_bits(2, 5);
    cursor.write_bits(i64::MIN as u64, 64);

    let mut cursor = BitCursor::new(&words[..]);
    assert_eq!(cursor.read_signed_bits(2), -1);
    assert_eq!(cursor.read_signed_bits(5), -3);
    assert_eq!(cursor.read_signed_bits(5), 2);
    assert_eq!(cursor.read_signed_bits(64), i64::MIN);
}

#[test]
fn test_set_bits_overwrites() {
    // fill a stretch with ones, then punch fields of known values into it
    let mut words = vec![0u8; 16];
    let mut cursor = BitCursor::new(&mut words[..]);
    cursor.write_bits(u64::MAX, 64);
    cursor.write_bits(u64::MAX, 64);

    cursor.set_position(3);
    cursor.set_bits(0b0110, 4);
    cursor.set_bits(0, 13);
    cursor.set_bits(0x5a5a, 16);

    cursor.set_position(0);
    assert_eq!(cursor.read_bits(3), 0b111);
    assert_eq!(cursor.read_bits(4), 0b0110);
    assert_eq!(cursor.read_bits(13), 0);
    assert_eq!(cursor.read_bits(16), 0x5a5a);
    assert_eq!(cursor.read_bits(12), 0xfff);
}

#[test]
fn test_align_up_to_byte() {
    let mut words = vec![0u64; 1];
    let mut cursor = BitCursor::new(&mut words[..]);
    cursor.align_up_to_byte();
    assert_eq!(cursor.position(), 0); // already aligned: no-op
    cursor.write_bits(1, 1);
    cursor.align_up_to_byte();
    assert_eq!(cursor.position(), 8);
    cursor.write_bits(0x7f, 7);
    cursor.align_up_to_byte();
    assert_eq!(cursor.position(), 16);
}

#[test]
fn test_series_roundtrip() {
    let values: Vec<i16> = vec![-300, 300, -1, 0, 1, i16::MIN, i16::MAX];
    let mut words = vec![0u32; 8];
    let mut cursor = BitCursor::new(&mut words[..]);
    cursor.append_series(&values, 16);
    assert_eq!(cursor.position(), 16 * values.len() as u64);

    let mut out = vec![0i16; values.len()];
    let mut cursor = BitCursor::new(&words[..]);
    cursor.extract_series(&mut out, 16, true);
    assert_eq!(out, values);
}

#[test]
fn test_extract_series_saturates() {
    // 12-bit unsigned fields into u8: values above 255 clamp to 255
    let values: Vec<u16> = vec![0, 255, 256, 4095];
    let mut words = vec![0u64; 2];
    let mut cursor = BitCursor::new(&mut words[..]);
    cursor.append_series(&values, 12);

    let mut out = vec![0u8; 4];
    let mut cursor = BitCursor::new(&words[..]);
    cursor.extract_series(&mut out, 12, false);
    assert_eq!(out, vec![0, 255, 255, 255]);

    // 12-bit signed fields into i8: clamp at both bounds
    let values: Vec<i16> = vec![-2048, -128, 127, 2047];
    let mut words = vec![0u64; 2];
    let mut cursor = BitCursor::new(&mut words[..]);
    cursor.append_series(&values, 12);

    let mut out = vec![0i8; 4];
    let mut cursor = BitCursor::new(&words[..]);
    cursor.extract_series(&mut out, 12, true);
    assert_eq!(out, vec![-128, -128, 127, 127]);

    // signed fields into a signed type wide enough: no clamping
    let mut out = vec![0i32; 4];
    let mut cursor = BitCursor::new(&words[..]);
    cursor.extract_series(&mut out, 12, true);
    assert_eq!(out, vec![-2048, -128, 127, 2047]);
}

#[test]
fn test_two_s_complement_fields() {
    // -1 as a 2-bit field is 0b11
    let mut words = vec![0u8; 1];
    let mut cursor = BitCursor::new(&mut words[..]);
    cursor.append_series(&[-1i8], 2);
    assert_eq!(words[0], 0b11);
}
