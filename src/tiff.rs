/*
 * SPDX-FileCopyrightText: 2023 Tommaso Fontana
 * SPDX-FileCopyrightText: 2023 Inria
 * SPDX-FileCopyrightText: 2023 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A reader and writer for scientific grayscale TIFF files and stacks.
//!
//! This is not a general-purpose TIFF library. It handles exactly the
//! files produced by detectors and by this crate's own tools: baseline
//! grayscale, uncompressed, one strip per image (consecutive strips are
//! tolerated), 8-, 16-, or 32-bit integer samples, or 32/64-bit
//! floating-point samples. Multi-image files ("stacks") map one-to-one to
//! multi-frame containers.
//!
//! Both byte orders are read; files are always written little-endian.

use std::io::{Read, Write};

use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

const WIDTH: u16 = 0x0100;
const HEIGHT: u16 = 0x0101;
const BITS_PER_SAMPLE: u16 = 0x0102;
const COMPRESSION: u16 = 0x0103;
const PHOTOMETRIC: u16 = 0x0106;
const STRIP_OFFSETS: u16 = 0x0111;
const ROWS_PER_STRIP: u16 = 0x0116;
const STRIP_BYTE_COUNTS: u16 = 0x0117;
const SAMPLE_FORMAT: u16 = 0x0153;

/// The error type of the TIFF collaborator.
#[derive(Debug)]
pub enum TiffError {
    /// The file is not a TIFF file, or ends in the middle of a structure.
    Malformed(String),
    /// The file is a TIFF file, but uses a feature outside the grayscale
    /// baseline handled here (compression, color, fragmented strips, …).
    Unsupported(String),
    /// An error bubbled up from the byte source or sink.
    Io(std::io::Error),
}

impl Display for TiffError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TiffError::Malformed(msg) => write!(f, "malformed TIFF file: {}", msg),
            TiffError::Unsupported(msg) => write!(f, "unsupported TIFF file: {}", msg),
            TiffError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl StdError for TiffError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TiffError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TiffError {
    fn from(e: std::io::Error) -> Self {
        TiffError::Io(e)
    }
}

fn malformed(msg: impl Into<String>) -> TiffError {
    TiffError::Malformed(msg.into())
}

fn unsupported(msg: impl Into<String>) -> TiffError {
    TiffError::Unsupported(msg.into())
}

/// The pixel values of one image, tagged by sample type.
///
/// This is the runtime counterpart of the generic codec entry points: the
/// tools match on it once and then call the generic core.
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Pixels {
    /// The number of pixels.
    pub fn len(&self) -> usize {
        match self {
            Pixels::U8(v) => v.len(),
            Pixels::I8(v) => v.len(),
            Pixels::U16(v) => v.len(),
            Pixels::I16(v) => v.len(),
            Pixels::U32(v) => v.len(),
            Pixels::I32(v) => v.len(),
            Pixels::F32(v) => v.len(),
            Pixels::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample width in bits (the BitsPerSample tag).
    pub fn bits_per_sample(&self) -> u16 {
        match self {
            Pixels::U8(_) | Pixels::I8(_) => 8,
            Pixels::U16(_) | Pixels::I16(_) => 16,
            Pixels::U32(_) | Pixels::I32(_) | Pixels::F32(_) => 32,
            Pixels::F64(_) => 64,
        }
    }

    /// The SampleFormat tag value: 1 unsigned, 2 signed, 3 float.
    pub fn sample_format(&self) -> u16 {
        match self {
            Pixels::U8(_) | Pixels::U16(_) | Pixels::U32(_) => 1,
            Pixels::I8(_) | Pixels::I16(_) | Pixels::I32(_) => 2,
            Pixels::F32(_) | Pixels::F64(_) => 3,
        }
    }

    /// A short human-readable name of the sample type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Pixels::U8(_) => "u8",
            Pixels::I8(_) => "i8",
            Pixels::U16(_) => "u16",
            Pixels::I16(_) => "i16",
            Pixels::U32(_) => "u32",
            Pixels::I32(_) => "i32",
            Pixels::F32(_) => "f32",
            Pixels::F64(_) => "f64",
        }
    }

    fn decode(
        bits: u16,
        format: u16,
        little: bool,
        bytes: &[u8],
    ) -> Result<Pixels, TiffError> {
        macro_rules! samples {
            ($ty:ty) => {
                bytes
                    .chunks_exact(std::mem::size_of::<$ty>())
                    .map(|c| {
                        let c = c.try_into().unwrap();
                        if little {
                            <$ty>::from_le_bytes(c)
                        } else {
                            <$ty>::from_be_bytes(c)
                        }
                    })
                    .collect()
            };
        }
        Ok(match (bits, format) {
            (8, 1) => Pixels::U8(bytes.to_vec()),
            (8, 2) => Pixels::I8(samples!(i8)),
            (16, 1) => Pixels::U16(samples!(u16)),
            (16, 2) => Pixels::I16(samples!(i16)),
            (32, 1) => Pixels::U32(samples!(u32)),
            (32, 2) => Pixels::I32(samples!(i32)),
            (32, 3) => Pixels::F32(samples!(f32)),
            (64, 3) => Pixels::F64(samples!(f64)),
            _ => {
                return Err(unsupported(format!(
                    "{}-bit samples of format {}",
                    bits, format
                )))
            }
        })
    }

    fn encode_le(&self, out: &mut Vec<u8>) {
        macro_rules! bytes {
            ($v:expr) => {
                for sample in $v {
                    out.extend_from_slice(&sample.to_le_bytes());
                }
            };
        }
        match self {
            Pixels::U8(v) => out.extend_from_slice(v),
            Pixels::I8(v) => bytes!(v),
            Pixels::U16(v) => bytes!(v),
            Pixels::I16(v) => bytes!(v),
            Pixels::U32(v) => bytes!(v),
            Pixels::I32(v) => bytes!(v),
            Pixels::F32(v) => bytes!(v),
            Pixels::F64(v) => bytes!(v),
        }
    }
}

/// One grayscale image: its dimensions and its pixels, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GreyTiffImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Pixels,
}

impl GreyTiffImage {
    /// Bundle pixels with their dimensions; the pixel count must be
    /// `width · height`.
    pub fn new(width: u32, height: u32, pixels: Pixels) -> Self {
        assert_eq!(
            pixels.len() as u64,
            width as u64 * height as u64,
            "pixel count does not match dimensions"
        );
        GreyTiffImage {
            width,
            height,
            pixels,
        }
    }
}

/// A grayscale TIFF file: one image, or a stack of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GreyTiff {
    pub images: Vec<GreyTiffImage>,
}

impl GreyTiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an image to the stack.
    pub fn push_image(&mut self, image: GreyTiffImage) {
        self.images.push(image);
    }

    /// Read a TIFF file, in either byte order, into a stack of images.
    pub fn read_from<R: Read>(source: &mut R) -> Result<Self, TiffError> {
        let mut raw = Vec::new();
        source.read_to_end(&mut raw)?;
        Self::parse(&raw)
    }

    /// Parse an in-memory TIFF file.
    pub fn parse(raw: &[u8]) -> Result<Self, TiffError> {
        if raw.len() < 8 {
            return Err(malformed("shorter than the 8-byte header"));
        }
        let little = match &raw[0..2] {
            b"II" => true,
            b"MM" => false,
            _ => return Err(malformed("no II or MM byte-order mark")),
        };
        let file = RawFile { raw, little };
        if file.read_u16(2)? != 42 {
            return Err(malformed("magic number is not 42"));
        }
        let mut tiff = GreyTiff::new();
        let mut ifd_offset = file.read_u32(4)? as usize;
        while ifd_offset != 0 {
            if tiff.images.len() > u16::MAX as usize {
                return Err(malformed("unterminated image directory chain"));
            }
            ifd_offset = file.read_ifd(ifd_offset, &mut tiff)?;
        }
        Ok(tiff)
    }

    /// Write the stack as a little-endian TIFF file, one strip per image,
    /// each image's directory placed after its pixel data.
    pub fn write_to<S: Write>(&self, sink: &mut S) -> Result<(), TiffError> {
        let mut raw: Vec<u8> = Vec::new();
        raw.extend_from_slice(b"II");
        raw.extend_from_slice(&42u16.to_le_bytes());
        raw.extend_from_slice(&0u32.to_le_bytes());
        let mut last_ifd_link = 4usize;

        for image in &self.images {
            let data_start = raw.len() as u32;
            image.pixels.encode_le(&mut raw);
            let byte_count = raw.len() as u32 - data_start;
            if raw.len() % 2 == 1 {
                raw.push(0);
            }

            let ifd_start = (raw.len() as u32).to_le_bytes();
            raw[last_ifd_link..last_ifd_link + 4].copy_from_slice(&ifd_start);

            let entries: [(u16, u16, u32); 9] = [
                (WIDTH, 4, image.width),
                (HEIGHT, 4, image.height),
                (BITS_PER_SAMPLE, 3, image.pixels.bits_per_sample() as u32),
                (COMPRESSION, 3, 1),
                (PHOTOMETRIC, 3, 1),
                (STRIP_OFFSETS, 4, data_start),
                (ROWS_PER_STRIP, 4, image.height),
                (STRIP_BYTE_COUNTS, 4, byte_count),
                (SAMPLE_FORMAT, 3, image.pixels.sample_format() as u32),
            ];
            raw.extend_from_slice(&(entries.len() as u16).to_le_bytes());
            for (tag, field_type, value) in entries {
                raw.extend_from_slice(&tag.to_le_bytes());
                raw.extend_from_slice(&field_type.to_le_bytes());
                raw.extend_from_slice(&1u32.to_le_bytes());
                if field_type == 3 {
                    raw.extend_from_slice(&(value as u16).to_le_bytes());
                    raw.extend_from_slice(&0u16.to_le_bytes());
                } else {
                    raw.extend_from_slice(&value.to_le_bytes());
                }
            }
            last_ifd_link = raw.len();
            raw.extend_from_slice(&0u32.to_le_bytes());
        }

        sink.write_all(&raw)?;
        sink.flush()?;
        Ok(())
    }
}

struct RawFile<'a> {
    raw: &'a [u8],
    little: bool,
}

impl RawFile<'_> {
    fn read_u16(&self, offset: usize) -> Result<u16, TiffError> {
        let bytes: [u8; 2] = self
            .raw
            .get(offset..offset + 2)
            .ok_or_else(|| malformed("file ends inside a structure"))?
            .try_into()
            .unwrap();
        Ok(if self.little {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    fn read_u32(&self, offset: usize) -> Result<u32, TiffError> {
        let bytes: [u8; 4] = self
            .raw
            .get(offset..offset + 4)
            .ok_or_else(|| malformed("file ends inside a structure"))?
            .try_into()
            .unwrap();
        Ok(if self.little {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    /// The inline value of a SHORT or LONG directory entry, or the
    /// `index`-th member of its offsetted value array.
    fn entry_value(
        &self,
        field_type: u16,
        count: u32,
        value_offset: usize,
        index: u32,
    ) -> Result<u32, TiffError> {
        match (field_type, count) {
            (3, 0..=2) => Ok(self.read_u16(value_offset + 2 * index as usize)? as u32),
            (3, _) => {
                let array = self.read_u32(value_offset)? as usize;
                Ok(self.read_u16(array + 2 * index as usize)? as u32)
            }
            (4, 0..=1) => self.read_u32(value_offset),
            (4, _) => {
                let array = self.read_u32(value_offset)? as usize;
                self.read_u32(array + 4 * index as usize)
            }
            _ => Err(unsupported(format!(
                "directory entry of type {}",
                field_type
            ))),
        }
    }

    /// Parse one image file directory, push the image it describes, and
    /// return the offset of the next directory (0 at the end of the chain).
    fn read_ifd(&self, offset: usize, tiff: &mut GreyTiff) -> Result<usize, TiffError> {
        let entry_count = self.read_u16(offset)? as usize;
        let mut width = 0u32;
        let mut height = 0u32;
        let mut bits = 1u16;
        let mut sample_format = 1u16;
        let mut strip_offsets: Vec<u32> = Vec::new();
        let mut strip_counts: Vec<u32> = Vec::new();

        for entry in 0..entry_count {
            let at = offset + 2 + 12 * entry;
            let tag = self.read_u16(at)?;
            let field_type = self.read_u16(at + 2)?;
            let count = self.read_u32(at + 4)?;
            let value_at = at + 8;
            let value = |index: u32| self.entry_value(field_type, count, value_at, index);
            match tag {
                WIDTH => width = value(0)?,
                HEIGHT => height = value(0)?,
                BITS_PER_SAMPLE => bits = value(0)? as u16,
                COMPRESSION => {
                    if value(0)? != 1 {
                        return Err(unsupported("compressed image data"));
                    }
                }
                PHOTOMETRIC => {
                    if value(0)? > 1 {
                        return Err(unsupported("color image data"));
                    }
                }
                STRIP_OFFSETS => {
                    for index in 0..count {
                        strip_offsets.push(value(index)?);
                    }
                }
                STRIP_BYTE_COUNTS => {
                    for index in 0..count {
                        strip_counts.push(value(index)?);
                    }
                }
                SAMPLE_FORMAT => sample_format = value(0)? as u16,
                ROWS_PER_STRIP => {} // implied by the single-strip layout
                _ => {}              // private and informational tags are ignored
            }
        }

        if strip_offsets.is_empty() {
            return Err(malformed("image has no strip offsets"));
        }
        // Fragmented images are not handled, but consecutive strips are a
        // single strip in all but name.
        for (index, pair) in strip_offsets.windows(2).enumerate() {
            let length = strip_counts
                .get(index)
                .ok_or_else(|| malformed("missing strip byte counts"))?;
            if pair[0] + length != pair[1] {
                return Err(unsupported("non-consecutive image strips"));
            }
        }

        let pixel_count = width as u64 * height as u64;
        let byte_len = (pixel_count * bits as u64 / 8) as usize;
        let start = strip_offsets[0] as usize;
        let data = self
            .raw
            .get(start..start + byte_len)
            .ok_or_else(|| malformed("pixel data runs past the end of the file"))?;
        let pixels = Pixels::decode(bits, sample_format, self.little, data)?;
        tiff.images.push(GreyTiffImage::new(width, height, pixels));

        self.read_u32(offset + 2 + 12 * entry_count).map(|o| o as usize)
    }
}
