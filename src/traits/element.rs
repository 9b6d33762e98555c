/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

/// An integer type whose values can be packed into, and unpacked from, a
/// bitstream field.
///
/// The codec is parameterized over this trait; it is implemented for the
/// eight primitive integer types up to 64 bits. Floating-point sources are
/// cast to `i64` before encoding, so no implementation for `f32`/`f64` is
/// provided.
///
/// All conversions go through `u64` bit patterns or `i64` values:
/// [`raw_bits`](Element::raw_bits) yields the two's-complement pattern to
/// store, [`magnitude`](Element::magnitude) the absolute value used to size
/// a block, and the two `from_*_sat` constructors rebuild an element from a
/// decoded field, saturating at the bounds of the destination type instead
/// of wrapping.
pub trait Element: Copy + PartialEq + core::fmt::Debug + Send + Sync + 'static {
    /// The width of the type in bits.
    const BITS: u32;
    /// Whether the type is signed.
    const IS_SIGNED: bool;

    /// The two's-complement bit pattern of `self`, sign-extended to 64 bits.
    ///
    /// Masking the result to `n` bits yields the `n`-bit two's-complement
    /// encoding of `self`, for any `n` large enough to represent it.
    fn raw_bits(self) -> u64;

    /// The absolute value of `self` as a `u64`.
    ///
    /// Well-defined for the most negative value too: `(-128i8).magnitude()`
    /// is 128.
    fn magnitude(self) -> u64;

    /// The element closest to the unsigned value `v`.
    fn from_u64_sat(v: u64) -> Self;

    /// The element closest to the signed value `v`.
    fn from_i64_sat(v: i64) -> Self;
}

macro_rules! impl_element_unsigned {
    ($($ty:ty),*) => {$(
        impl Element for $ty {
            const BITS: u32 = <$ty>::BITS;
            const IS_SIGNED: bool = false;

            #[inline(always)]
            fn raw_bits(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn magnitude(self) -> u64 {
                self as u64
            }

            #[inline(always)]
            fn from_u64_sat(v: u64) -> Self {
                v.min(<$ty>::MAX as u64) as $ty
            }

            #[inline(always)]
            fn from_i64_sat(v: i64) -> Self {
                if v < 0 {
                    0
                } else {
                    Self::from_u64_sat(v as u64)
                }
            }
        }
    )*};
}

macro_rules! impl_element_signed {
    ($($ty:ty),*) => {$(
        impl Element for $ty {
            const BITS: u32 = <$ty>::BITS;
            const IS_SIGNED: bool = true;

            #[inline(always)]
            fn raw_bits(self) -> u64 {
                self as i64 as u64
            }

            #[inline(always)]
            fn magnitude(self) -> u64 {
                (self as i64).unsigned_abs()
            }

            #[inline(always)]
            fn from_u64_sat(v: u64) -> Self {
                v.min(<$ty>::MAX as u64) as $ty
            }

            #[inline(always)]
            fn from_i64_sat(v: i64) -> Self {
                v.clamp(<$ty>::MIN as i64, <$ty>::MAX as i64) as $ty
            }
        }
    )*};
}

impl_element_unsigned!(u8, u16, u32, u64);
impl_element_signed!(i8, i16, i32, i64);
