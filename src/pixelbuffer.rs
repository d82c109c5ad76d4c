// Copyright 2026 V2H Tools Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Typed, contiguous, row-major pixel storage tagged with its color format.
//!
//! Sub-byte formats (1/2/4-bit paletted) are stored one logical pixel per
//! byte in memory; packing to the wire width only happens at emit time
//! (`crate::palette::prune_indices` and the emitters).

use crate::color::{
    xrgb8888_to_gray, xrgb8888_to_lch, xrgb8888_to_rgb565, xrgb8888_to_xrgb1555,
    rgb565_to_xrgb8888, xrgb1555_to_xrgb8888, ColorFormat, Lch, Xrgb8888,
};
use crate::error::{Error, Result};

/// Backing storage for a `PixelBuffer`, one variant per scalar component type
/// used by the supported color formats.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Paletted1/2/4/8: one index per byte, unpacked.
    Indices(Vec<u8>),
    /// Xrgb1555 / Rgb565: one packed word per pixel.
    Words(Vec<u16>),
    /// Xrgb8888: one packed channel triple per pixel (top byte unused).
    Truecolor(Vec<Xrgb8888>),
    /// Grayf: one luma value in `[0,255]` stored as float for pipeline
    /// symmetry with `LChf`.
    Gray(Vec<f32>),
    /// LChf: planar L/C/h per pixel.
    Lch(Vec<Lch>),
}

impl PixelData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Indices(v) => v.len(),
            Self::Words(v) => v.len(),
            Self::Truecolor(v) => v.len(),
            Self::Gray(v) => v.len(),
            Self::Lch(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A typed pixel container: a format tag plus the matching `PixelData`.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub format: ColorFormat,
    pub width: u32,
    pub height: u32,
    pub data: PixelData,
}

impl PixelBuffer {
    /// Builds a buffer, validating that the data's element count matches
    /// `width * height` and that the variant matches the format's scalar
    /// type.
    pub fn new(format: ColorFormat, width: u32, height: u32, data: PixelData) -> Result<Self> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(Error::Invariant(format!(
                "pixel buffer element count {} does not match {}x{}={}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Self::check_variant(format, &data)?;
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    fn check_variant(format: ColorFormat, data: &PixelData) -> Result<()> {
        let ok = matches!(
            (format, data),
            (
                ColorFormat::Paletted1
                    | ColorFormat::Paletted2
                    | ColorFormat::Paletted4
                    | ColorFormat::Paletted8,
                PixelData::Indices(_)
            ) | (ColorFormat::Xrgb1555 | ColorFormat::Rgb565, PixelData::Words(_))
                | (ColorFormat::Xrgb8888, PixelData::Truecolor(_))
                | (ColorFormat::Grayf, PixelData::Gray(_))
                | (ColorFormat::LChf, PixelData::Lch(_))
        );
        if ok {
            Ok(())
        } else {
            Err(Error::Invariant(format!(
                "pixel data variant does not match declared format {format:?}"
            )))
        }
    }

    /// Raw-byte view of the buffer in its current, unpacked, in-memory
    /// layout (little-endian for multi-byte element types).
    #[must_use]
    pub fn as_raw_bytes(&self) -> Vec<u8> {
        match &self.data {
            PixelData::Indices(v) => v.clone(),
            PixelData::Words(v) => v.iter().flat_map(|w| w.to_le_bytes()).collect(),
            PixelData::Truecolor(v) => v
                .iter()
                .flat_map(|c| [c.r, c.g, c.b, 0])
                .collect(),
            PixelData::Gray(v) => v.iter().flat_map(|g| g.to_le_bytes()).collect(),
            PixelData::Lch(v) => v
                .iter()
                .flat_map(|c| {
                    let mut bytes = Vec::with_capacity(12);
                    bytes.extend_from_slice(&c.l.to_le_bytes());
                    bytes.extend_from_slice(&c.c.to_le_bytes());
                    bytes.extend_from_slice(&c.h.to_le_bytes());
                    bytes
                })
                .collect(),
        }
    }

    /// Converts this buffer to a new format, producing a fresh buffer.
    /// Deterministic and bit-exact for a given pair of formats (§4.1).
    pub fn convert_to(&self, target: ColorFormat) -> Result<Self> {
        if target == self.format {
            return Ok(self.clone());
        }
        let truecolor = self.to_truecolor()?;
        let data = match target {
            ColorFormat::Xrgb8888 => PixelData::Truecolor(truecolor),
            ColorFormat::Xrgb1555 => {
                PixelData::Words(truecolor.iter().map(|c| xrgb8888_to_xrgb1555(*c)).collect())
            }
            ColorFormat::Rgb565 => {
                PixelData::Words(truecolor.iter().map(|c| xrgb8888_to_rgb565(*c)).collect())
            }
            ColorFormat::Grayf => PixelData::Gray(
                truecolor
                    .iter()
                    .map(|c| f32::from(xrgb8888_to_gray(*c)))
                    .collect(),
            ),
            ColorFormat::LChf => {
                PixelData::Lch(truecolor.iter().map(|c| xrgb8888_to_lch(*c)).collect())
            }
            ColorFormat::Paletted1
            | ColorFormat::Paletted2
            | ColorFormat::Paletted4
            | ColorFormat::Paletted8
            | ColorFormat::Unknown => {
                return Err(Error::Validation(format!(
                    "cannot convert truecolor buffer directly to {target:?}; use a quantizer"
                )))
            }
        };
        Self::new(target, self.width, self.height, data)
    }

    /// Expands this buffer into XRGB8888, the crate's pivot format for
    /// cross-format conversion. Paletted formats require the caller to have
    /// already resolved indices elsewhere; this direct conversion only
    /// covers direct color formats.
    fn to_truecolor(&self) -> Result<Vec<Xrgb8888>> {
        match (&self.format, &self.data) {
            (ColorFormat::Xrgb8888, PixelData::Truecolor(v)) => Ok(v.clone()),
            (ColorFormat::Xrgb1555, PixelData::Words(v)) => {
                Ok(v.iter().map(|w| xrgb1555_to_xrgb8888(*w)).collect())
            }
            (ColorFormat::Rgb565, PixelData::Words(v)) => {
                Ok(v.iter().map(|w| rgb565_to_xrgb8888(*w)).collect())
            }
            _ => Err(Error::Validation(format!(
                "no direct truecolor conversion from {:?}",
                self.format
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_truecolor(w: u32, h: u32) -> PixelBuffer {
        let data: Vec<Xrgb8888> = (0..(w * h))
            .map(|i| Xrgb8888::new(i as u8, (i * 2) as u8, (i * 3) as u8))
            .collect();
        PixelBuffer::new(ColorFormat::Xrgb8888, w, h, PixelData::Truecolor(data)).unwrap()
    }

    #[test]
    fn new_rejects_mismatched_size() {
        let data = PixelData::Truecolor(vec![Xrgb8888::default(); 3]);
        assert!(PixelBuffer::new(ColorFormat::Xrgb8888, 2, 2, data).is_err());
    }

    #[test]
    fn new_rejects_mismatched_variant() {
        let data = PixelData::Indices(vec![0; 4]);
        assert!(PixelBuffer::new(ColorFormat::Xrgb8888, 2, 2, data).is_err());
    }

    #[test]
    fn convert_to_self_is_identity() {
        let pb = sample_truecolor(4, 4);
        let same = pb.convert_to(ColorFormat::Xrgb8888).unwrap();
        assert_eq!(pb, same);
    }

    #[test]
    fn round_trip_through_xrgb1555() {
        let pb = sample_truecolor(4, 4);
        let as1555 = pb.convert_to(ColorFormat::Xrgb1555).unwrap();
        let back = as1555.convert_to(ColorFormat::Xrgb8888).unwrap();
        if let (PixelData::Truecolor(a), PixelData::Truecolor(b)) = (&pb.data, &back.data) {
            for (x, y) in a.iter().zip(b.iter()) {
                assert!((i32::from(x.r) - i32::from(y.r)).abs() <= 9);
            }
        } else {
            panic!("expected truecolor data");
        }
    }

    #[test]
    fn as_raw_bytes_len_matches_words() {
        let pb = sample_truecolor(2, 2).convert_to(ColorFormat::Rgb565).unwrap();
        assert_eq!(pb.as_raw_bytes().len(), 2 * 4);
    }
}
