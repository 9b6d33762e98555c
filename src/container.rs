/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The self-describing container wrapping one or more compressed frames.
//!
//! A serialized container is an ASCII XML descriptor followed by
//! `memory_size` octets of bit-packed payload. The descriptor records
//! everything needed to decode: the width and signedness of the original
//! integers, the block size, the payload size, the number of values per
//! frame, and optionally the number of frames and the frame dimensions.
//!
//! The payload is an octet sequence, not a native word sequence: words are
//! serialized least-significant byte first, so big- and little-endian hosts
//! produce identical files for identical inputs.

use std::io::{Read, Write};

use crate::codec;
use crate::cursor::BitCursor;
use crate::error::Error;
use crate::traits::Element;
use crate::xml::XmlElement;

/// The block size used when none is given: 12 original values per block.
///
/// Legacy single-frame `.trs` files were written with a block size of 8;
/// the descriptor is authoritative either way.
pub const DEFAULT_BLOCK: u32 = 12;

/// The word width the container packs bits into. The serialized form is
/// independent of this choice.
type PayloadWord = u64;

/// A compressed sequence of integer frames (TERSE is the encoding pass,
/// PROLIX the decoding pass).
///
/// A container is created either from uncompressed values ([`Terse::new`],
/// [`Terse::with_block`], then optionally [`Terse::append_frame`]) or from
/// a serialized byte stream ([`Terse::read_from`]). It is immutable apart
/// from appending frames.
///
/// # Example
/// ```
/// use trpx::container::Terse;
///
/// let numbers: Vec<i32> = (-500..500).collect();
/// let compressed = Terse::new(&numbers);
/// // less than 30% of the 4000 input bytes
/// assert!(compressed.terse_size() < 1200);
///
/// let mut file = Vec::new();
/// compressed.write_to(&mut file).unwrap();
///
/// let parsed = Terse::read_from(&mut file.as_slice()).unwrap();
/// let mut prolix = vec![0i32; 1000];
/// parsed.prolix(&mut prolix).unwrap();
/// assert_eq!(prolix, numbers);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "mem_dbg", derive(mem_dbg::MemDbg, mem_dbg::MemSize))]
pub struct Terse {
    prolix_bits: u32,
    signed: bool,
    block: u32,
    values_per_frame: u64,
    frames: u64,
    dimensions: Option<Vec<u64>>,
    words: Vec<PayloadWord>,
    payload_bits: u64,
    /// Byte offset of the start of each frame within the payload.
    frame_offsets: Vec<u64>,
}

impl Terse {
    /// Compress `values` into a single-frame container with the default
    /// block size.
    pub fn new<T: Element>(values: &[T]) -> Self {
        Self::with_block(values, DEFAULT_BLOCK)
    }

    /// Compress `values` into a single-frame container, `block` values per
    /// block; `block` must be in `1..=64`.
    pub fn with_block<T: Element>(values: &[T], block: u32) -> Self {
        assert!((1..=64).contains(&block), "block size must be in 1..=64");
        let mut container = Terse {
            prolix_bits: T::BITS,
            signed: T::IS_SIGNED,
            block,
            values_per_frame: values.len() as u64,
            frames: 0,
            dimensions: None,
            words: Vec::new(),
            payload_bits: 0,
            frame_offsets: Vec::new(),
        };
        container.push_frame(values);
        container
    }

    /// Append one more frame, encoded with the parameters of the existing
    /// frames.
    ///
    /// The element type and the number of values must match the container,
    /// else the frame is rejected with [`Error::ParameterMismatch`].
    pub fn append_frame<T: Element>(&mut self, values: &[T]) -> Result<(), Error> {
        if T::BITS != self.prolix_bits || T::IS_SIGNED != self.signed {
            return Err(Error::ParameterMismatch(format!(
                "cannot append {}-bit {} values to a container of {}-bit {} values",
                T::BITS,
                sign_name(T::IS_SIGNED),
                self.prolix_bits,
                sign_name(self.signed),
            )));
        }
        if values.len() as u64 != self.values_per_frame {
            return Err(Error::ParameterMismatch(format!(
                "frame has {} values, container frames have {}",
                values.len(),
                self.values_per_frame
            )));
        }
        self.push_frame(values);
        Ok(())
    }

    /// Declare the frame dimensions, 1 to 3 extents whose product must be
    /// the number of values per frame.
    pub fn set_dimensions(&mut self, dimensions: &[u64]) -> Result<(), Error> {
        if dimensions.is_empty() || dimensions.len() > 3 {
            return Err(Error::ParameterMismatch(format!(
                "{} dimensions given, 1 to 3 supported",
                dimensions.len()
            )));
        }
        if dimensions.iter().product::<u64>() != self.values_per_frame {
            return Err(Error::ParameterMismatch(format!(
                "dimensions {:?} do not multiply to {} values",
                dimensions, self.values_per_frame
            )));
        }
        self.dimensions = Some(dimensions.to_vec());
        Ok(())
    }

    /// Decompress frame 0 into `out`. See
    /// [`prolix_frame`](Terse::prolix_frame).
    pub fn prolix<T: Element>(&self, out: &mut [T]) -> Result<(), Error> {
        self.prolix_frame(out, 0)
    }

    /// Decompress the frame with the given index into `out`, which must
    /// hold exactly [`number_of_values`](Terse::number_of_values) elements.
    ///
    /// The destination type must be able to represent every value of the
    /// source type: at least [`prolix_bits`](Terse::prolix_bits) wide (one
    /// more for a signed destination receiving unsigned data), and signed
    /// if the container is. Otherwise the call fails with
    /// [`Error::ParameterMismatch`] before writing anything; to narrow with
    /// saturation instead, use
    /// [`prolix_frame_clamped`](Terse::prolix_frame_clamped).
    pub fn prolix_frame<T: Element>(&self, out: &mut [T], frame: usize) -> Result<(), Error> {
        let needed = self.prolix_bits + (!self.signed && T::IS_SIGNED) as u32;
        if T::BITS < needed {
            return Err(Error::ParameterMismatch(format!(
                "{}-bit {} destination cannot hold every {}-bit {} value; \
                 use a clamped decode to narrow",
                T::BITS,
                sign_name(T::IS_SIGNED),
                self.prolix_bits,
                sign_name(self.signed),
            )));
        }
        self.prolix_frame_clamped(out, frame)
    }

    /// Decompress the frame with the given index into `out`, saturating
    /// values the destination type cannot represent at the destination's
    /// bounds.
    ///
    /// Decoding signed data into an unsigned destination is still an
    /// error: a sign cannot be clamped away.
    pub fn prolix_frame_clamped<T: Element>(
        &self,
        out: &mut [T],
        frame: usize,
    ) -> Result<(), Error> {
        if self.signed && !T::IS_SIGNED {
            return Err(Error::ParameterMismatch(
                "cannot decode signed data into an unsigned destination".into(),
            ));
        }
        if out.len() as u64 != self.values_per_frame {
            return Err(Error::ParameterMismatch(format!(
                "output holds {} values, frames have {}",
                out.len(),
                self.values_per_frame
            )));
        }
        let Some(&offset) = self.frame_offsets.get(frame) else {
            return Err(Error::ParameterMismatch(format!(
                "no frame {} in a container of {} frames",
                frame, self.frames
            )));
        };
        let mut cursor = BitCursor::new_at(&self.words[..], offset * 8);
        codec::prolix_frame(
            &mut cursor,
            out,
            self.block as usize,
            self.signed,
            self.terse_size() * 8,
        )
    }

    /// The number of values per frame.
    pub fn number_of_values(&self) -> u64 {
        self.values_per_frame
    }

    /// The number of frames.
    pub fn number_of_frames(&self) -> u64 {
        self.frames
    }

    /// Whether the encoded values are signed. Signed data cannot be
    /// decompressed into unsigned values.
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// The width in bits of the original values; decoding needs a
    /// destination type at least this wide.
    pub fn prolix_bits(&self) -> u32 {
        self.prolix_bits
    }

    /// The block size the payload was encoded with.
    pub fn block(&self) -> u32 {
        self.block
    }

    /// The size of the compressed payload in bytes (the `memory_size`
    /// descriptor attribute).
    pub fn terse_size(&self) -> u64 {
        self.payload_bits.div_ceil(8)
    }

    /// The frame dimensions: the extents declared on the container or in
    /// the descriptor or, failing that, square 2-D dimensions whenever the
    /// number of values per frame is a perfect square.
    pub fn dimensions(&self) -> Option<Vec<u64>> {
        if let Some(d) = &self.dimensions {
            return Some(d.clone());
        }
        let side = (self.values_per_frame as f64).sqrt() as u64;
        // the cast rounds toward zero, so check the neighbor too
        for side in [side, side + 1] {
            if side * side == self.values_per_frame && side != 0 {
                return Some(vec![side, side]);
            }
        }
        None
    }

    /// Serialize the descriptor and the payload.
    ///
    /// The payload is written word by word, least-significant byte first,
    /// truncated to `memory_size` octets, so the output does not depend on
    /// the byte order of the host.
    pub fn write_to<S: Write>(&self, sink: &mut S) -> Result<(), Error> {
        let mut descriptor = XmlElement::new("Terse")
            .with_attribute("prolix_bits", self.prolix_bits)
            .with_attribute("signed", self.signed as u8)
            .with_attribute("block", self.block)
            .with_attribute("memory_size", self.terse_size())
            .with_attribute("number_of_values", self.values_per_frame);
        if self.frames > 1 {
            descriptor = descriptor.with_attribute("number_of_frames", self.frames);
        }
        if let Some(dimensions) = &self.dimensions {
            let list = dimensions
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            descriptor = descriptor.with_attribute("dimensions", list);
        }
        descriptor.write_to(sink)?;

        let mut payload = Vec::with_capacity(self.terse_size() as usize);
        for word in &self.words {
            payload.extend_from_slice(&word.to_le_bytes());
        }
        payload.truncate(self.terse_size() as usize);
        sink.write_all(&payload)?;
        sink.flush()?;
        Ok(())
    }

    /// Parse a container from a byte stream: the `<Terse …/>` descriptor,
    /// then exactly `memory_size` payload octets.
    ///
    /// Attribute order is free; `number_of_frames` defaults to 1 when
    /// absent. The frame offsets are recovered by walking the payload one
    /// frame at a time, which also validates that no frame runs past the
    /// end of the payload.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Self, Error> {
        let descriptor = XmlElement::scan(source, "Terse")?;
        let prolix_bits = required(&descriptor, "prolix_bits")?;
        let signed = required(&descriptor, "signed")?;
        let block = required(&descriptor, "block")?;
        let memory_size = required(&descriptor, "memory_size")?;
        let values_per_frame = required(&descriptor, "number_of_values")?;
        let frames = match descriptor.attribute("number_of_frames") {
            Some(_) => required(&descriptor, "number_of_frames")?,
            None => 1,
        };
        if !(1..=64).contains(&prolix_bits) {
            return Err(Error::DescriptorMalformed(format!(
                "prolix_bits is {}, not in 1..=64",
                prolix_bits
            )));
        }
        if !(1..=64).contains(&block) {
            return Err(Error::DescriptorMalformed(format!(
                "block is {}, not in 1..=64",
                block
            )));
        }
        if signed > 1 {
            return Err(Error::DescriptorMalformed(format!(
                "signed is {}, not 0 or 1",
                signed
            )));
        }
        if frames == 0 {
            return Err(Error::DescriptorMalformed("number_of_frames is 0".into()));
        }
        let dimensions = match descriptor.attribute("dimensions") {
            None => None,
            Some(list) => {
                let extents = list
                    .split_whitespace()
                    .map(|d| {
                        d.parse::<u64>().map_err(|_| {
                            Error::DescriptorMalformed(format!(
                                "dimensions value {:?} is not an integer",
                                d
                            ))
                        })
                    })
                    .collect::<Result<Vec<u64>, Error>>()?;
                if extents.is_empty() || extents.len() > 3 {
                    return Err(Error::DescriptorMalformed(format!(
                        "{} dimensions given, 1 to 3 supported",
                        extents.len()
                    )));
                }
                if extents.iter().product::<u64>() != values_per_frame {
                    return Err(Error::DescriptorMalformed(format!(
                        "dimensions {:?} do not multiply to {} values",
                        extents, values_per_frame
                    )));
                }
                Some(extents)
            }
        };

        let mut payload = vec![0u8; memory_size as usize];
        source.read_exact(&mut payload)?;
        let mut words = vec![0 as PayloadWord; payload.len().div_ceil(8)];
        for (index, byte) in payload.iter().enumerate() {
            words[index / 8] |= (*byte as PayloadWord) << (8 * (index % 8));
        }

        let mut container = Terse {
            prolix_bits: prolix_bits as u32,
            signed: signed == 1,
            block: block as u32,
            values_per_frame,
            frames,
            dimensions,
            words,
            payload_bits: memory_size * 8,
            frame_offsets: Vec::with_capacity(frames as usize),
        };

        // Frame offsets are not stored in the descriptor: walk the frames,
        // recording the byte-aligned position of each.
        let mut cursor = BitCursor::new_at(&container.words[..], 0);
        for _ in 0..frames {
            container.frame_offsets.push(cursor.position() / 8);
            codec::skip_frame(
                &mut cursor,
                values_per_frame,
                block as usize,
                memory_size * 8,
            )?;
        }
        Ok(container)
    }

    /// Encode one frame at the next byte-aligned position, growing the
    /// word buffer to a worst-case bound first and trimming it after.
    fn push_frame<T: Element>(&mut self, values: &[T]) {
        let start = (self.payload_bits + 7) & !7;
        let blocks = (values.len() as u64).div_ceil(self.block as u64);
        let bound = start + values.len() as u64 * T::BITS as u64 + 12 * blocks;
        self.words.resize(bound.div_ceil(64) as usize, 0);

        let mut cursor = BitCursor::new_at(&mut self.words[..], start);
        codec::terse_frame(&mut cursor, values, self.block as usize);
        self.payload_bits = cursor.position();

        self.words.truncate(self.payload_bits.div_ceil(64) as usize);
        self.frame_offsets.push(start / 8);
        self.frames += 1;
    }
}

fn sign_name(signed: bool) -> &'static str {
    if signed {
        "signed"
    } else {
        "unsigned"
    }
}

fn required(descriptor: &XmlElement, name: &str) -> Result<u64, Error> {
    let value = descriptor.attribute(name).ok_or_else(|| {
        Error::DescriptorMalformed(format!("missing mandatory attribute {}", name))
    })?;
    value.parse().map_err(|_| {
        Error::DescriptorMalformed(format!("attribute {}={:?} is not an integer", name, value))
    })
}
