/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]

pub mod codec;
pub mod container;
pub mod cursor;
pub mod error;
pub mod tiff;
pub mod traits;
pub mod xml;

/// Prelude module to import everything from this crate
pub mod prelude {
    pub use crate::codec::*;
    pub use crate::container::*;
    pub use crate::cursor::*;
    pub use crate::error::Error;
    pub use crate::tiff::*;
    pub use crate::traits::*;
    pub use crate::xml::*;
}
