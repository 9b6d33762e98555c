/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

/// The error type of the crate.
///
/// The codec neither retries nor logs: every failure surfaces as one of
/// these variants. I/O errors from the underlying byte source or sink are
/// wrapped in [`Error::Io`] and can be recovered via
/// [`source`](std::error::Error::source).
#[derive(Debug)]
pub enum Error {
    /// The payload ended in the middle of a field, a block header declared
    /// more than 64 significant bits, or `memory_size` is shorter than the
    /// bits consumed during decoding.
    Corrupt { bit_pos: u64 },
    /// No `<Terse …/>` element was found, a mandatory attribute is missing,
    /// or an attribute does not parse as the expected integer.
    DescriptorMalformed(String),
    /// The caller asked for an impossible conversion, such as decoding
    /// signed data into an unsigned destination, or supplied parameters
    /// that do not match the container.
    ParameterMismatch(String),
    /// An error bubbled up from the byte source or sink.
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Corrupt { bit_pos } => {
                write!(f, "corrupt payload (at bit {})", bit_pos)
            }
            Error::DescriptorMalformed(msg) => {
                write!(f, "malformed descriptor: {}", msg)
            }
            Error::ParameterMismatch(msg) => {
                write!(f, "parameter mismatch: {}", msg)
            }
            Error::Io(e) => {
                write!(f, "I/O error: {}", e)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
