/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The TERSE/PROLIX block code.
//!
//! Values are consumed in blocks of a fixed size (the last block of a frame
//! may be shorter). Each block is stored as a header declaring how many
//! bits every value of the block needs, followed by the values packed at
//! exactly that width. The header is a three-tier escape code:
//!
//! - `1` — reuse the width of the previous block (1 bit);
//! - `0` + 3-bit `s`, for `s < 7` (4 bits);
//! - `0 111` + 2-bit `s − 7`, for `s < 10` (6 bits);
//! - `0 111 11` + 6-bit `s − 10`, for `s ≤ 64` (12 bits).
//!
//! A width of zero has no body: the block decodes to all zeros. Since
//! diffraction frames are mostly empty, long zero runs cost one bit per
//! block.
//!
//! For signed elements the width includes one sign bit, and each value is
//! stored as its `s`-bit two's complement. The width of a block is reset at
//! every frame start, and every frame starts on a byte boundary.

use crate::cursor::BitCursor;
use crate::error::Error;
use crate::traits::*;

/// The number of significant bits needed by every value of `block`.
///
/// For unsigned elements this is the position of the highest bit set in any
/// value; for signed elements, one more than the highest bit set in any
/// magnitude, for the sign. The most negative value of a signed type is its
/// own `Element::BITS`-bit two's complement, so the result is capped at the
/// element width.
#[inline]
pub fn significant_bits<T: Element>(block: &[T]) -> u32 {
    let mut set_bits = 0u64;
    for v in block {
        set_bits |= v.magnitude();
    }
    if set_bits == 0 {
        0
    } else if T::IS_SIGNED {
        (65 - set_bits.leading_zeros()).min(T::BITS)
    } else {
        64 - set_bits.leading_zeros()
    }
}

/// Encode one frame of `values` onto `cursor`, in blocks of `block` values.
///
/// The cursor must be byte-aligned and the backing buffer must have room
/// for the worst case, `T::BITS` bits per value plus 12 header bits per
/// block; the buffer bits at and beyond the cursor must be zero. On return
/// the cursor is one past the last encoded bit.
pub fn terse_frame<T, W, B>(cursor: &mut BitCursor<W, B>, values: &[T], block: usize)
where
    T: Element,
    W: Word,
    B: AsRef<[W]> + AsMut<[W]>,
{
    debug_assert!((1..=64).contains(&block));
    debug_assert!(cursor.position() % 8 == 0);
    let mut prev = 0u32;
    for chunk in values.chunks(block) {
        let s = significant_bits(chunk);
        if s == prev {
            cursor.write_bits(1, 1);
        } else {
            if s < 7 {
                cursor.write_bits((s as u64) << 1, 4);
            } else if s < 10 {
                cursor.write_bits(0b1110 | (((s - 7) as u64) << 4), 6);
            } else {
                cursor.write_bits(0b111110 | (((s - 10) as u64) << 6), 12);
            }
            prev = s;
        }
        if s != 0 {
            cursor.append_series(chunk, s as usize);
        }
    }
}

/// Read one block header off `cursor`, updating the running width `s`.
#[inline]
fn read_header<W: Word, B: AsRef<[W]>>(
    cursor: &mut BitCursor<W, B>,
    s: &mut u32,
    end_bit: u64,
) -> Result<(), Error> {
    ensure(cursor, 1, end_bit)?;
    if cursor.read_bits(1) == 1 {
        return Ok(());
    }
    ensure(cursor, 3, end_bit)?;
    *s = cursor.read_bits(3) as u32;
    if *s == 7 {
        ensure(cursor, 2, end_bit)?;
        *s += cursor.read_bits(2) as u32;
        if *s == 10 {
            ensure(cursor, 6, end_bit)?;
            *s += cursor.read_bits(6) as u32;
            if *s > 64 {
                return Err(Error::Corrupt {
                    bit_pos: cursor.position(),
                });
            }
        }
    }
    Ok(())
}

#[inline(always)]
fn ensure<W: Word, B: AsRef<[W]>>(
    cursor: &BitCursor<W, B>,
    bits: u64,
    end_bit: u64,
) -> Result<(), Error> {
    if cursor.position() + bits > end_bit {
        Err(Error::Corrupt {
            bit_pos: cursor.position(),
        })
    } else {
        Ok(())
    }
}

/// Decode one frame of `out.len()` values from `cursor`, in blocks of
/// `block` values, and align the cursor up to the next byte boundary.
///
/// `signed` states how the frame was encoded and must match the container
/// descriptor; the signed-into-unsigned contract is checked by the caller.
/// Values wider than `T` saturate at the bounds of `T`. Reading past
/// `end_bit` or meeting a header width above 64 fails with
/// [`Error::Corrupt`].
pub fn prolix_frame<T, W, B>(
    cursor: &mut BitCursor<W, B>,
    out: &mut [T],
    block: usize,
    signed: bool,
    end_bit: u64,
) -> Result<(), Error>
where
    T: Element,
    W: Word,
    B: AsRef<[W]>,
{
    debug_assert!((1..=64).contains(&block));
    let mut s = 0u32;
    for chunk in out.chunks_mut(block) {
        read_header(cursor, &mut s, end_bit)?;
        if s == 0 {
            chunk.fill(T::from_u64_sat(0));
        } else {
            ensure(cursor, (chunk.len() * s as usize) as u64, end_bit)?;
            cursor.extract_series(chunk, s as usize, signed);
        }
    }
    cursor.align_up_to_byte();
    Ok(())
}

/// Advance `cursor` past one frame of `number_of_values` values without
/// materializing it, and align it up to the next byte boundary.
///
/// This reads only the block headers, so discovering the byte offsets of
/// the frames of a container costs a small fraction of decoding them.
pub fn skip_frame<W, B>(
    cursor: &mut BitCursor<W, B>,
    number_of_values: u64,
    block: usize,
    end_bit: u64,
) -> Result<(), Error>
where
    W: Word,
    B: AsRef<[W]>,
{
    debug_assert!((1..=64).contains(&block));
    let mut s = 0u32;
    let mut from = 0u64;
    while from < number_of_values {
        let n = block.min((number_of_values - from) as usize);
        read_header(cursor, &mut s, end_bit)?;
        if s != 0 {
            let body = (n * s as usize) as u64;
            ensure(cursor, body, end_bit)?;
            cursor.advance(body as i64);
        }
        from += n as u64;
    }
    cursor.align_up_to_byte();
    Ok(())
}
