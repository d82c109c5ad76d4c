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

//! DXTG: an intra-frame, DXT1-style 4x4 block codec (§4.6.3).
//!
//! Two 16-bit XRGB1555 endpoints per block plus a 32-bit 2-bit-per-pixel
//! index stream. Layout on disk de-interleaves all endpoint pairs first
//! (block-raster order), then all index streams, for locality and entropy
//! coder friendliness.

use crate::color::{xrgb1555_to_xrgb8888, Rgb555DistanceTable};
use crate::error::{Error, Result};

/// Derives the two DXT1-style interior colors `(c2, c3)` from endpoints
/// `c0, c1`. 3-interior mode (`c0 > c1` as 16-bit integers) interpolates at
/// 1/3 and 2/3; 2-interior mode averages and zeroes the fourth slot.
#[must_use]
pub fn interior_colors(c0: u16, c1: u16) -> (u16, u16) {
    let (r0, g0, b0) = unpack555(c0);
    let (r1, g1, b1) = unpack555(c1);
    if c0 > c1 {
        let c2 = pack555(
            round_third(2 * u32::from(r0) + u32::from(r1)),
            round_third(2 * u32::from(g0) + u32::from(g1)),
            round_third(2 * u32::from(b0) + u32::from(b1)),
        );
        let c3 = pack555(
            round_third(u32::from(r0) + 2 * u32::from(r1)),
            round_third(u32::from(g0) + 2 * u32::from(g1)),
            round_third(u32::from(b0) + 2 * u32::from(b1)),
        );
        (c2, c3)
    } else {
        let c2 = pack555(
            round_half(u32::from(r0) + u32::from(r1)),
            round_half(u32::from(g0) + u32::from(g1)),
            round_half(u32::from(b0) + u32::from(b1)),
        );
        (c2, 0)
    }
}

fn unpack555(c: u16) -> (u8, u8, u8) {
    (
        (c & 0x1f) as u8,
        ((c >> 5) & 0x1f) as u8,
        ((c >> 10) & 0x1f) as u8,
    )
}

fn pack555(r: u32, g: u32, b: u32) -> u16 {
    (r as u16) | ((g as u16) << 5) | ((b as u16) << 10)
}

fn round_third(sum: u32) -> u32 {
    (f64::from(sum) / 3.0).round_ties_even() as u32
}

fn round_half(sum: u32) -> u32 {
    (f64::from(sum) / 2.0).round_ties_even() as u32
}

/// Returns `[c0, c1, c2, c3]` as XRGB1555 words for a block's endpoints.
#[must_use]
pub fn palette(c0: u16, c1: u16) -> [u16; 4] {
    let (c2, c3) = interior_colors(c0, c1);
    [c0, c1, c2, c3]
}

/// One encoded 4x4 block: endpoints plus 16 two-bit indices packed into a
/// 32-bit word (raster order, lowest 2 bits first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub c0: u16,
    pub c1: u16,
    pub indices: u32,
}

/// Encodes a width×height image (both multiples of 4) of XRGB1555 pixels
/// into a sequence of DXTG blocks, raster order of blocks.
///
/// For each block, enumerates all ordered pairs of the block's own 16
/// colors as `(c0, c1)` candidates, picks the pair minimizing the sum of
/// per-pixel minimum squared distance (via the precomputed distance
/// table), and records the resulting indices. Ties favor the first pair
/// encountered in enumeration order.
pub fn encode(pixels: &[u16], width: usize, height: usize) -> Result<Vec<Block>> {
    if width % 4 != 0 || height % 4 != 0 {
        return Err(Error::Validation(
            "dxtg: width and height must be multiples of 4".to_string(),
        ));
    }
    if pixels.len() != width * height {
        return Err(Error::Invariant(
            "dxtg: pixel count does not match width*height".to_string(),
        ));
    }

    let mut blocks = Vec::with_capacity((width / 4) * (height / 4));
    for by in (0..height).step_by(4) {
        for bx in (0..width).step_by(4) {
            let mut block_pixels = [0u16; 16];
            for y in 0..4 {
                for x in 0..4 {
                    block_pixels[y * 4 + x] = pixels[(by + y) * width + bx + x];
                }
            }
            blocks.push(encode_block(&block_pixels));
        }
    }
    Ok(blocks)
}

fn encode_block(block_pixels: &[u16; 16]) -> Block {
    let mut candidates: Vec<u16> = block_pixels.to_vec();
    candidates.dedup();

    let mut best_cost = u64::MAX;
    let mut best = Block {
        c0: block_pixels[0],
        c1: block_pixels[0],
        indices: 0,
    };

    for &c0 in &candidates {
        for &c1 in &candidates {
            let pal = palette(c0, c1);
            let mut cost: u64 = 0;
            let mut indices = 0u32;
            for (i, &p) in block_pixels.iter().enumerate() {
                let mut best_idx = 0usize;
                let mut best_d = u32::MAX;
                for (idx, &pc) in pal.iter().enumerate() {
                    let d = u32::from(Rgb555DistanceTable::get(p, pc));
                    if d < best_d {
                        best_d = d;
                        best_idx = idx;
                    }
                }
                cost += u64::from(best_d);
                indices |= (best_idx as u32) << (i * 2);
            }
            if cost < best_cost {
                best_cost = cost;
                best = Block { c0, c1, indices };
            }
        }
    }
    best
}

/// Decodes a sequence of DXTG blocks back into a width×height XRGB1555
/// pixel buffer.
pub fn decode(blocks: &[Block], width: usize, height: usize) -> Result<Vec<u16>> {
    if width % 4 != 0 || height % 4 != 0 {
        return Err(Error::Validation(
            "dxtg: width and height must be multiples of 4".to_string(),
        ));
    }
    let expected = (width / 4) * (height / 4);
    if blocks.len() != expected {
        return Err(Error::Invariant(format!(
            "dxtg: expected {expected} blocks, got {}",
            blocks.len()
        )));
    }

    let mut out = vec![0u16; width * height];
    let mut block_idx = 0;
    for by in (0..height).step_by(4) {
        for bx in (0..width).step_by(4) {
            let block = &blocks[block_idx];
            block_idx += 1;
            let pal = palette(block.c0, block.c1);
            for i in 0..16 {
                let idx = (block.indices >> (i * 2)) & 0x3;
                let (x, y) = (i % 4, i / 4);
                out[(by + y) * width + bx + x] = pal[idx as usize];
            }
        }
    }
    Ok(out)
}

/// Serializes blocks to the on-disk de-interleaved layout: all endpoint
/// pairs (block-raster order) first, then all index streams.
#[must_use]
pub fn serialize(blocks: &[Block]) -> Vec<u8> {
    let mut out = Vec::with_capacity(blocks.len() * 8);
    for b in blocks {
        out.extend_from_slice(&b.c0.to_le_bytes());
        out.extend_from_slice(&b.c1.to_le_bytes());
    }
    for b in blocks {
        out.extend_from_slice(&b.indices.to_le_bytes());
    }
    out
}

/// Inverse of [`serialize`]. `count` is the number of blocks to read.
pub fn deserialize(data: &[u8], count: usize) -> Result<Vec<Block>> {
    let endpoints_len = count * 4;
    let indices_len = count * 4;
    if data.len() < endpoints_len + indices_len {
        return Err(Error::Input("dxtg: truncated block stream".to_string()));
    }
    let mut blocks = Vec::with_capacity(count);
    for i in 0..count {
        let off = i * 4;
        let c0 = u16::from_le_bytes([data[off], data[off + 1]]);
        let c1 = u16::from_le_bytes([data[off + 2], data[off + 3]]);
        let ioff = endpoints_len + i * 4;
        let indices = u32::from_le_bytes([
            data[ioff],
            data[ioff + 1],
            data[ioff + 2],
            data[ioff + 3],
        ]);
        blocks.push(Block { c0, c1, indices });
    }
    Ok(blocks)
}
