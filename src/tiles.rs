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

//! Row/tile/sprite geometry reordering and unique-tile deduplication.
//!
//! `to_sprites` is specified by the prose as "`to-width(Sw)` then
//! `to-tiles(8,8)`"; applied literally across the full image that
//! composition does not yield spatially coherent sprites once `height`
//! exceeds `Sh` for an `Sh < height` sprite grid, so this module instead
//! partitions the image into an `Sw×Sh` sprite grid first and applies the
//! two reorderings within each sprite — matching the GBA "1-D tile mapping"
//! order referenced in the glossary (each sprite's own tiles stored
//! contiguously, tile-raster order). See `DESIGN.md`.

use crate::error::{Error, Result};

/// `to-width(W)`: lay all columns of width `W` out top-to-bottom before the
/// next horizontal group. Requires `width % w == 0` and `height % 8 == 0`.
pub fn to_width<T: Copy>(data: &[T], width: usize, height: usize, w: usize) -> Result<Vec<T>> {
    require(width * height == data.len(), "to_width: size mismatch")?;
    require(w != 0 && width % w == 0, "to_width: width not divisible by W")?;
    require(height % 8 == 0, "to_width: height not divisible by 8")?;
    to_tiles(data, width, height, w, height)
}

/// Inverse of `to_width`.
pub fn from_width<T: Copy + Default>(
    data: &[T],
    width: usize,
    height: usize,
    w: usize,
) -> Result<Vec<T>> {
    require(width * height == data.len(), "from_width: size mismatch")?;
    require(w != 0 && width % w == 0, "from_width: width not divisible by W")?;
    require(height % 8 == 0, "from_width: height not divisible by 8")?;
    from_tiles(data, width, height, w, height)
}

/// `to-tiles(Tw,Th)`: hierarchical reorder. First split into horizontal
/// strips of height `Th`, within each strip into blocks of width `Tw`,
/// within each block traverse `Tw` columns per scanline for `Th` scanlines.
pub fn to_tiles<T: Copy>(
    data: &[T],
    width: usize,
    height: usize,
    tw: usize,
    th: usize,
) -> Result<Vec<T>> {
    require(width * height == data.len(), "to_tiles: size mismatch")?;
    require(tw != 0 && width % tw == 0, "to_tiles: width not divisible by Tw")?;
    require(th != 0 && height % th == 0, "to_tiles: height not divisible by Th")?;

    let mut out = Vec::with_capacity(data.len());
    for sy in (0..height).step_by(th) {
        for sx in (0..width).step_by(tw) {
            for y in 0..th {
                let row = (sy + y) * width;
                for x in 0..tw {
                    out.push(data[row + sx + x]);
                }
            }
        }
    }
    Ok(out)
}

/// Inverse of `to_tiles`.
pub fn from_tiles<T: Copy + Default>(
    data: &[T],
    width: usize,
    height: usize,
    tw: usize,
    th: usize,
) -> Result<Vec<T>> {
    require(width * height == data.len(), "from_tiles: size mismatch")?;
    require(tw != 0 && width % tw == 0, "from_tiles: width not divisible by Tw")?;
    require(th != 0 && height % th == 0, "from_tiles: height not divisible by Th")?;

    let mut out = vec![T::default(); width * height];
    let mut idx = 0;
    for sy in (0..height).step_by(th) {
        for sx in (0..width).step_by(tw) {
            for y in 0..th {
                let row = (sy + y) * width;
                for x in 0..tw {
                    out[row + sx + x] = data[idx];
                    idx += 1;
                }
            }
        }
    }
    Ok(out)
}

/// `to-sprites(Sw,Sh)`: partitions into an `Sw×Sh` sprite grid (row-major),
/// and within each sprite applies `to_tiles(8,8)`. Requires `W%Sw==0`,
/// `H%Sh==0`, and both `Sw,Sh` divisible by 8.
pub fn to_sprites<T: Copy>(
    data: &[T],
    width: usize,
    height: usize,
    sw: usize,
    sh: usize,
) -> Result<Vec<T>> {
    require(width * height == data.len(), "to_sprites: size mismatch")?;
    require(sw != 0 && width % sw == 0, "to_sprites: width not divisible by Sw")?;
    require(sh != 0 && height % sh == 0, "to_sprites: height not divisible by Sh")?;
    require(sw % 8 == 0 && sh % 8 == 0, "to_sprites: Sw/Sh must be multiples of 8")?;

    let mut out = Vec::with_capacity(data.len());
    for sprite_y in (0..height).step_by(sh) {
        for sprite_x in (0..width).step_by(sw) {
            let mut block = Vec::with_capacity(sw * sh);
            for y in 0..sh {
                let row = (sprite_y + y) * width;
                for x in 0..sw {
                    block.push(data[row + sprite_x + x]);
                }
            }
            out.extend(to_tiles(&block, sw, sh, 8, 8)?);
        }
    }
    Ok(out)
}

/// Inverse of `to_sprites`.
pub fn from_sprites<T: Copy + Default>(
    data: &[T],
    width: usize,
    height: usize,
    sw: usize,
    sh: usize,
) -> Result<Vec<T>> {
    require(width * height == data.len(), "from_sprites: size mismatch")?;
    require(sw != 0 && width % sw == 0, "from_sprites: width not divisible by Sw")?;
    require(sh != 0 && height % sh == 0, "from_sprites: height not divisible by Sh")?;
    require(sw % 8 == 0 && sh % 8 == 0, "from_sprites: Sw/Sh must be multiples of 8")?;

    let mut out = vec![T::default(); width * height];
    let sprite_len = sw * sh;
    let mut idx = 0;
    for sprite_y in (0..height).step_by(sh) {
        for sprite_x in (0..width).step_by(sw) {
            let block = from_tiles(&data[idx..idx + sprite_len], sw, sh, 8, 8)?;
            idx += sprite_len;
            for y in 0..sh {
                let row = (sprite_y + y) * width;
                for x in 0..sw {
                    out[row + sprite_x + x] = block[y * sw + x];
                }
            }
        }
    }
    Ok(out)
}

fn require(cond: bool, msg: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(Error::Validation(msg.to_string()))
    }
}

/// FNV-1a over a byte slice, used to hash tile blocks cheaply.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Flip orientation recorded alongside a screen-map tile reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flip {
    pub h: bool,
    pub v: bool,
}

impl Flip {
    const NONE: Self = Self { h: false, v: false };
    const H: Self = Self { h: true, v: false };
    const V: Self = Self { h: false, v: true };
    const HV: Self = Self { h: true, v: true };
}

/// One screen-map entry: a reference into the tile store plus flip bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRef {
    pub index: u16,
    pub flip: Flip,
}

impl TileRef {
    /// Packs as `index | (h << log2(max_tiles)) | (v << (log2(max_tiles)+1))`.
    #[must_use]
    pub fn pack(self, log2_max_tiles: u32) -> u16 {
        let mut v = self.index;
        if self.flip.h {
            v |= 1 << log2_max_tiles;
        }
        if self.flip.v {
            v |= 1 << (log2_max_tiles + 1);
        }
        v
    }
}

/// Screen-map plus deduplicated tile store, as produced by
/// `UniqueTileMap::build`.
#[derive(Debug, Clone)]
pub struct TileMap {
    pub screen_map: Vec<TileRef>,
    /// Unique tile pixel bytes, concatenated in first-occurrence order.
    pub tile_store: Vec<u8>,
    pub tile_w: usize,
    pub tile_h: usize,
    pub bytes_per_tile: usize,
}

const PER_FRAME_CAP: usize = 1024;
const GLOBAL_CAP: usize = 16384;

fn flip_h(block: &[u8], tw: usize, th: usize, bpp: usize) -> Vec<u8> {
    let mut out = vec![0u8; block.len()];
    for y in 0..th {
        for x in 0..tw {
            let src = (y * tw + x) * bpp;
            let dst = (y * tw + (tw - 1 - x)) * bpp;
            out[dst..dst + bpp].copy_from_slice(&block[src..src + bpp]);
        }
    }
    out
}

fn flip_v(block: &[u8], tw: usize, th: usize, bpp: usize) -> Vec<u8> {
    let mut out = vec![0u8; block.len()];
    for y in 0..th {
        let src = y * tw * bpp;
        let dst = (th - 1 - y) * tw * bpp;
        out[dst..dst + tw * bpp].copy_from_slice(&block[src..src + tw * bpp]);
    }
    out
}

/// Builds a unique-tile screen-map/store pair over one or more same-sized
/// source images given as raw byte buffers (row-major, `bpp` bytes/pixel).
///
/// Deterministic tie-break: earlier occurrence wins; among flipped matches,
/// no-flip is preferred, then H-flip, then V-flip, then both.
pub fn build_tile_map(
    frames: &[&[u8]],
    width: usize,
    height: usize,
    tw: usize,
    th: usize,
    bpp: usize,
    detect_flips: bool,
) -> Result<TileMap> {
    require(width % tw == 0 && height % th == 0, "tile size must divide image size")?;
    let bytes_per_tile = tw * th * bpp;
    let cap = if frames.len() > 1 { GLOBAL_CAP } else { PER_FRAME_CAP };

    let mut hash_to_index: std::collections::HashMap<u64, (usize, Flip)> =
        std::collections::HashMap::new();
    let mut tile_store = Vec::new();
    let mut screen_map = Vec::new();

    for frame in frames {
        require(frame.len() == width * height * bpp, "frame byte length mismatch")?;
        let tiled = to_tiles(frame, width * bpp, height, tw * bpp, th)?;
        let n_tiles = (width / tw) * (height / th);
        for t in 0..n_tiles {
            let block = &tiled[t * bytes_per_tile..(t + 1) * bytes_per_tile];

            let variants: Vec<(Flip, Vec<u8>)> = if detect_flips {
                vec![
                    (Flip::NONE, block.to_vec()),
                    (Flip::H, flip_h(block, tw, th, bpp)),
                    (Flip::V, flip_v(block, tw, th, bpp)),
                    (Flip::HV, flip_v(&flip_h(block, tw, th, bpp), tw, th, bpp)),
                ]
            } else {
                vec![(Flip::NONE, block.to_vec())]
            };

            let mut found = None;
            for (flip, variant) in &variants {
                let h = fnv1a(variant);
                if let Some(&(idx, _)) = hash_to_index.get(&h) {
                    // Confirm against actual bytes to avoid hash collisions.
                    let stored = &tile_store[idx * bytes_per_tile..(idx + 1) * bytes_per_tile];
                    if stored == variant.as_slice() {
                        found = Some((idx, *flip));
                        break;
                    }
                }
            }

            if let Some((idx, flip)) = found {
                screen_map.push(TileRef {
                    index: idx as u16,
                    flip,
                });
            } else {
                let idx = tile_store.len() / bytes_per_tile;
                if idx >= cap {
                    return Err(Error::Invariant(format!(
                        "tile store exceeded cap of {cap} unique tiles"
                    )));
                }
                tile_store.extend_from_slice(block);
                hash_to_index.insert(fnv1a(block), (idx, Flip::NONE));
                screen_map.push(TileRef {
                    index: idx as u16,
                    flip: Flip::NONE,
                });
            }
        }
    }

    Ok(TileMap {
        screen_map,
        tile_store,
        tile_w: tw,
        tile_h: th,
        bytes_per_tile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_tiles_then_from_tiles_round_trips() {
        let data: Vec<u8> = (0..64u8).collect();
        let tiled = to_tiles(&data, 8, 8, 4, 4).unwrap();
        let back: Vec<u8> = from_tiles(&tiled, 8, 8, 4, 4).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn to_width_then_from_width_round_trips() {
        let data: Vec<u8> = (0..(16 * 8)).map(|i| i as u8).collect();
        let w = to_width(&data, 16, 8, 4).unwrap();
        let back = from_width(&w, 16, 8, 4).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn to_sprites_then_from_sprites_round_trips() {
        let data: Vec<u8> = (0..(16 * 16)).map(|i| i as u8).collect();
        let s = to_sprites(&data, 16, 16, 16, 8).unwrap();
        let back = from_sprites(&s, 16, 16, 16, 8).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn to_tiles_rejects_non_divisible_size() {
        let data = vec![0u8; 10 * 10];
        assert!(to_tiles(&data, 10, 10, 3, 3).is_err());
    }

    #[test]
    fn tile_map_deduplicates_identical_tiles() {
        // Two identical 4x4 tiles laid side-by-side horizontally.
        let mut frame = vec![0u8; 8 * 4];
        for y in 0..4 {
            for x in 0..4 {
                frame[y * 8 + x] = (x + y) as u8;
                frame[y * 8 + 4 + x] = (x + y) as u8;
            }
        }
        let map = build_tile_map(&[&frame], 8, 4, 4, 4, 1, false).unwrap();
        assert_eq!(map.tile_store.len(), 16); // one unique tile
        assert_eq!(map.screen_map.len(), 2);
        assert_eq!(map.screen_map[0].index, map.screen_map[1].index);
    }

    #[test]
    fn tile_map_detects_horizontal_flip() {
        let mut frame = vec![0u8; 8 * 4];
        for y in 0..4 {
            for x in 0..4 {
                frame[y * 8 + x] = x as u8;
                frame[y * 8 + 4 + (3 - x)] = x as u8;
            }
        }
        let map = build_tile_map(&[&frame], 8, 4, 4, 4, 1, true).unwrap();
        assert_eq!(map.tile_store.len(), 16);
        assert!(map.screen_map[1].flip.h);
    }

    #[test]
    fn tile_ref_pack_sets_flip_bits_above_index_bits() {
        let r = TileRef {
            index: 5,
            flip: Flip::HV,
        };
        let packed = r.pack(10);
        assert_eq!(packed & 0x3ff, 5);
        assert_eq!((packed >> 10) & 1, 1);
        assert_eq!((packed >> 11) & 1, 1);
    }
}
