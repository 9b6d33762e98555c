/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use common_traits::*;

/// This is a trait alias for all the properties we need from the unsigned
/// words backing a [`BitCursor`](crate::cursor::BitCursor): bitwise
/// arithmetic, and lossless round trips through `u64`, in which all field
/// extraction and assembly happens.
///
/// It is implemented by `u8`, `u16`, `u32`, and `u64`. The word width is an
/// implementation choice of the layer that owns the buffer; the serialized
/// form is always an octet stream, whatever the word width.
pub trait Word:
    UnsignedInt + FiniteRangeNumber + CastableInto<u64> + CastableFrom<u64> + AsBytes
{
}
impl<W: UnsignedInt + FiniteRangeNumber + CastableInto<u64> + CastableFrom<u64> + AsBytes> Word
    for W
{
}
