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

//! Image frames: a pixel buffer plus optional color map, geometry, and
//! data-type flags, as they flow through the pipeline engine.

use bitflags::bitflags;

use crate::color::Xrgb8888;
use crate::pixelbuffer::PixelBuffer;

bitflags! {
    /// Data-type flags attached to an `ImageFrame`. A bitmap may additionally
    /// be tiles, sprites, and/or compressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataType: u8 {
        const BITMAP     = 0b0001;
        const SPRITES    = 0b0010;
        const TILES      = 0b0100;
        const COMPRESSED = 0b1000;
    }
}

/// An ordered sequence of up to 256 XRGB8888 colors. Index 0 has no
/// privileged meaning except as imposed by operations that explicitly
/// manipulate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMap {
    colors: Vec<Xrgb8888>,
}

impl ColorMap {
    #[must_use]
    pub fn new(colors: Vec<Xrgb8888>) -> Self {
        Self { colors }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Xrgb8888] {
        &self.colors
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [Xrgb8888] {
        &mut self.colors
    }

    pub fn push(&mut self, color: Xrgb8888) {
        self.colors.push(color);
    }

    pub fn position_of(&self, color: Xrgb8888) -> Option<usize> {
        self.colors.iter().position(|&c| c == color)
    }

    pub fn swap(&mut self, a: usize, b: usize) {
        self.colors.swap(a, b);
    }
}

/// Pixel buffer + optional color map + geometry + flags, as produced and
/// mutated by pipeline steps. Each step returns a new frame; the last
/// stage's output is owned by the emitter until flushed.
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub pixels: PixelBuffer,
    pub color_map: Option<ColorMap>,
    pub width: u32,
    pub height: u32,
    pub data_type: DataType,
    pub source_filename: String,
    pub source_index: usize,
    /// Set by the pipeline engine as it tracks the largest intermediate
    /// chunk size seen for this frame across all steps after the first
    /// (§4.7); copied into the container header.
    pub max_memory_needed: u32,
}

impl ImageFrame {
    #[must_use]
    pub fn new(pixels: PixelBuffer, source_filename: impl Into<String>, source_index: usize) -> Self {
        let width = pixels.width;
        let height = pixels.height;
        Self {
            pixels,
            color_map: None,
            width,
            height,
            data_type: DataType::BITMAP,
            source_filename: source_filename.into(),
            source_index,
            max_memory_needed: 0,
        }
    }

    #[must_use]
    pub fn with_color_map(mut self, color_map: ColorMap) -> Self {
        self.color_map = Some(color_map);
        self
    }

    #[must_use]
    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorFormat;
    use crate::pixelbuffer::PixelData;

    #[test]
    fn data_type_bitmap_may_combine_with_tiles() {
        let dt = DataType::BITMAP | DataType::TILES;
        assert!(dt.contains(DataType::BITMAP));
        assert!(dt.contains(DataType::TILES));
        assert!(!dt.contains(DataType::SPRITES));
    }

    #[test]
    fn color_map_position_and_swap() {
        let mut cm = ColorMap::new(vec![
            Xrgb8888::new(1, 1, 1),
            Xrgb8888::new(2, 2, 2),
            Xrgb8888::new(3, 3, 3),
        ]);
        assert_eq!(cm.position_of(Xrgb8888::new(3, 3, 3)), Some(2));
        cm.swap(0, 2);
        assert_eq!(cm.as_slice()[0], Xrgb8888::new(3, 3, 3));
    }

    #[test]
    fn image_frame_tracks_geometry_from_pixels() {
        let pb = PixelBuffer::new(
            ColorFormat::Paletted8,
            4,
            2,
            PixelData::Indices(vec![0; 8]),
        )
        .unwrap();
        let frame = ImageFrame::new(pb, "test.png", 0);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.max_memory_needed, 0);
    }
}
