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

//! Color-map manipulation: prepend/move-to-0, similarity reordering, index
//! shifting, and bit-depth pruning.

use crate::color::{distance_xrgb8888, xrgb8888_to_lch, Xrgb8888};
use crate::error::{Error, Result};
use crate::image::ColorMap;

/// Prepends `color` to the palette and shifts every pixel index up by one.
/// Fails if the palette already has 256 entries.
pub fn add_color_at_0(
    color_map: &ColorMap,
    indices: &[u8],
    color: Xrgb8888,
) -> Result<(ColorMap, Vec<u8>)> {
    if color_map.len() >= 256 {
        return Err(Error::Invariant(
            "add-color-at-0: palette already has 256 entries".to_string(),
        ));
    }
    let mut colors = vec![color];
    colors.extend_from_slice(color_map.as_slice());
    let new_indices: Result<Vec<u8>> = indices
        .iter()
        .map(|&i| {
            u16::from(i)
                .checked_add(1)
                .filter(|&v| v <= 255)
                .map(|v| v as u8)
                .ok_or_else(|| {
                    Error::Invariant("add-color-at-0: index would overflow 255".to_string())
                })
        })
        .collect();
    Ok((ColorMap::new(colors), new_indices?))
}

/// Finds `color` in the palette and swaps it with index 0, updating both the
/// palette and every pixel index that referenced either slot. Fails if the
/// color is absent.
pub fn move_color_to_0(
    color_map: &ColorMap,
    indices: &[u8],
    color: Xrgb8888,
) -> Result<(ColorMap, Vec<u8>)> {
    let pos = color_map.position_of(color).ok_or_else(|| {
        Error::Validation(format!("move-color-to-0: color {color:?} not in palette"))
    })?;
    if pos == 0 {
        return Ok((color_map.clone(), indices.to_vec()));
    }
    let mut cm = color_map.clone();
    cm.swap(0, pos);

    let new_indices = indices
        .iter()
        .map(|&i| {
            if usize::from(i) == 0 {
                pos as u8
            } else if usize::from(i) == pos {
                0
            } else {
                i
            }
        })
        .collect();
    Ok((cm, new_indices))
}

/// Converts a color to HSL, used only to seed the similarity-reorder
/// heuristic's initial ordering.
fn hsl_key(c: Xrgb8888) -> (u8, i32, i32) {
    let r = f64::from(c.r) / 255.0;
    let g = f64::from(c.g) / 255.0;
    let b = f64::from(c.b) / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let delta = max - min;
    let h = if delta.abs() < 1e-9 {
        0.0
    } else if (max - r).abs() < 1e-9 {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if (max - g).abs() < 1e-9 {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    ((h / 360.0 * 255.0) as u8, (l * 1_000_000.0) as i32, 0)
}

/// Computes a permutation of the palette that minimizes the RMS of
/// successive-color squared distances, via greedy nearest-neighbor
/// insertion seeded by an HSL-sorted index, and applies it to both the
/// palette and the pixel data.
pub fn reorder_for_similarity(color_map: &ColorMap, indices: &[u8]) -> Result<(ColorMap, Vec<u8>)> {
    let colors = color_map.as_slice();
    if colors.is_empty() {
        return Ok((color_map.clone(), indices.to_vec()));
    }

    let mut seed_order: Vec<usize> = (0..colors.len()).collect();
    seed_order.sort_by_key(|&i| hsl_key(colors[i]));

    let mut remaining: Vec<usize> = seed_order;
    let mut order = vec![remaining.remove(0)];

    while !remaining.is_empty() {
        let last = colors[*order.last().unwrap()];
        let mut best_pos = 0usize;
        let mut best_d = f64::INFINITY;
        for (ri, &cand) in remaining.iter().enumerate() {
            let d = distance_xrgb8888(last, colors[cand]);
            if d < best_d {
                best_d = d;
                best_pos = ri;
            }
        }
        order.push(remaining.remove(best_pos));
    }

    // order[new_pos] = old_pos; build old->new mapping.
    let mut old_to_new = vec![0u8; colors.len()];
    for (new_pos, &old_pos) in order.iter().enumerate() {
        old_to_new[old_pos] = new_pos as u8;
    }

    let new_colors: Vec<Xrgb8888> = order.iter().map(|&old| colors[old]).collect();
    let new_indices: Vec<u8> = indices
        .iter()
        .map(|&i| old_to_new[usize::from(i)])
        .collect();

    Ok((ColorMap::new(new_colors), new_indices))
}

/// LCh-distance variant of the same heuristic, used when a caller wants
/// perceptual rather than weighted-RGB similarity.
pub fn reorder_for_similarity_lch(color_map: &ColorMap, indices: &[u8]) -> Result<(ColorMap, Vec<u8>)> {
    let colors = color_map.as_slice();
    if colors.is_empty() {
        return Ok((color_map.clone(), indices.to_vec()));
    }
    let lch: Vec<_> = colors.iter().map(|&c| xrgb8888_to_lch(c)).collect();

    let mut seed_order: Vec<usize> = (0..colors.len()).collect();
    seed_order.sort_by(|&a, &b| lch[a].h.partial_cmp(&lch[b].h).unwrap());

    let mut remaining: Vec<usize> = seed_order;
    let mut order = vec![remaining.remove(0)];
    while !remaining.is_empty() {
        let last = lch[*order.last().unwrap()];
        let mut best_pos = 0usize;
        let mut best_d = f64::INFINITY;
        for (ri, &cand) in remaining.iter().enumerate() {
            let d = crate::color::distance_lch(last, lch[cand]);
            if d < best_d {
                best_d = d;
                best_pos = ri;
            }
        }
        order.push(remaining.remove(best_pos));
    }

    let mut old_to_new = vec![0u8; colors.len()];
    for (new_pos, &old_pos) in order.iter().enumerate() {
        old_to_new[old_pos] = new_pos as u8;
    }
    let new_colors: Vec<Xrgb8888> = order.iter().map(|&old| colors[old]).collect();
    let new_indices: Vec<u8> = indices
        .iter()
        .map(|&i| old_to_new[usize::from(i)])
        .collect();
    Ok((ColorMap::new(new_colors), new_indices))
}

/// Adds `n` to every non-zero index, clamping is not performed: the
/// operation fails outright if any resulting index would exceed 255.
pub fn shift_indices(indices: &[u8], n: u8) -> Result<Vec<u8>> {
    let max = indices.iter().copied().max().unwrap_or(0);
    if u16::from(max) + u16::from(n) > 255 {
        return Err(Error::Invariant(format!(
            "shift-indices: max index {max} + {n} exceeds 255"
        )));
    }
    Ok(indices
        .iter()
        .map(|&i| if i == 0 { 0 } else { i + n })
        .collect())
}

/// Packs 8-bit indices into 1, 2, or 4 bits per pixel. Fails if any index
/// does not fit in `bits` bits.
pub fn prune_indices(indices: &[u8], bits: u32) -> Result<Vec<u8>> {
    if !matches!(bits, 1 | 2 | 4) {
        return Err(Error::Validation(format!(
            "prune-indices: unsupported bit depth {bits}"
        )));
    }
    let max = (1u32 << bits) - 1;
    for &i in indices {
        if u32::from(i) > max {
            return Err(Error::Invariant(format!(
                "prune-indices: index {i} does not fit in {bits} bits"
            )));
        }
    }

    let per_byte = 8 / bits as usize;
    let mut out = Vec::with_capacity((indices.len() + per_byte - 1) / per_byte);
    for chunk in indices.chunks(per_byte) {
        let mut byte = 0u8;
        for (slot, &idx) in chunk.iter().enumerate() {
            byte |= idx << (slot as u32 * bits);
        }
        out.push(byte);
    }
    Ok(out)
}

/// Inverse of `prune_indices`: unpacks `bits`-wide indices back to one byte
/// per logical pixel. `count` is the number of logical pixels to emit.
pub fn unprune_indices(packed: &[u8], bits: u32, count: usize) -> Result<Vec<u8>> {
    if !matches!(bits, 1 | 2 | 4) {
        return Err(Error::Validation(format!(
            "unprune-indices: unsupported bit depth {bits}"
        )));
    }
    let per_byte = 8 / bits as usize;
    let mask = (1u8 << bits) - 1;
    let mut out = Vec::with_capacity(count);
    'outer: for &byte in packed {
        for slot in 0..per_byte {
            if out.len() == count {
                break 'outer;
            }
            out.push((byte >> (slot as u32 * bits)) & mask);
        }
    }
    if out.len() != count {
        return Err(Error::Invariant(
            "unprune-indices: packed data too short for requested count".to_string(),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(colors: &[(u8, u8, u8)]) -> ColorMap {
        ColorMap::new(colors.iter().map(|&(r, g, b)| Xrgb8888::new(r, g, b)).collect())
    }

    #[test]
    fn add_color_at_0_shifts_indices() {
        let c = cm(&[(1, 1, 1), (2, 2, 2)]);
        let (new_cm, idx) = add_color_at_0(&c, &[0, 1], Xrgb8888::new(9, 9, 9)).unwrap();
        assert_eq!(new_cm.as_slice()[0], Xrgb8888::new(9, 9, 9));
        assert_eq!(idx, vec![1, 2]);
    }

    #[test]
    fn add_color_at_0_fails_when_full() {
        let colors: Vec<Xrgb8888> = (0..256).map(|i| Xrgb8888::new(i as u8, 0, 0)).collect();
        let c = ColorMap::new(colors);
        assert!(add_color_at_0(&c, &[0], Xrgb8888::new(1, 1, 1)).is_err());
    }

    #[test]
    fn move_color_to_0_swaps_and_remaps() {
        let c = cm(&[(1, 1, 1), (2, 2, 2), (3, 3, 3)]);
        let (new_cm, idx) = move_color_to_0(&c, &[0, 2, 1], Xrgb8888::new(3, 3, 3)).unwrap();
        assert_eq!(new_cm.as_slice()[0], Xrgb8888::new(3, 3, 3));
        assert_eq!(new_cm.as_slice()[2], Xrgb8888::new(1, 1, 1));
        assert_eq!(idx, vec![2, 0, 1]);
    }

    #[test]
    fn move_color_to_0_fails_when_absent() {
        let c = cm(&[(1, 1, 1)]);
        assert!(move_color_to_0(&c, &[0], Xrgb8888::new(9, 9, 9)).is_err());
    }

    #[test]
    fn shift_indices_leaves_zero_alone() {
        let shifted = shift_indices(&[0, 1, 2], 10).unwrap();
        assert_eq!(shifted, vec![0, 11, 12]);
    }

    #[test]
    fn shift_indices_fails_on_overflow() {
        assert!(shift_indices(&[250], 10).is_err());
    }

    #[test]
    fn prune_and_unprune_round_trip_4bit() {
        let indices: Vec<u8> = (0..16).collect();
        let packed = prune_indices(&indices, 4).unwrap();
        assert_eq!(packed.len(), 8);
        let back = unprune_indices(&packed, 4, 16).unwrap();
        assert_eq!(back, indices);
    }

    #[test]
    fn prune_rejects_oversized_index() {
        assert!(prune_indices(&[16], 4).is_err());
        assert!(prune_indices(&[2], 1).is_err());
    }

    #[test]
    fn reorder_for_similarity_is_a_permutation() {
        let c = cm(&[(0, 0, 0), (10, 10, 10), (255, 255, 255), (250, 250, 250)]);
        let indices: Vec<u8> = vec![0, 1, 2, 3];
        let (new_cm, new_idx) = reorder_for_similarity(&c, &indices).unwrap();
        assert_eq!(new_cm.len(), 4);
        let mut sorted_idx = new_idx.clone();
        sorted_idx.sort_unstable();
        assert_eq!(sorted_idx, vec![0, 1, 2, 3]);
        // Similar colors end up adjacent in the new palette.
        let mut pos_of = [0usize; 4];
        for (orig, &new_i) in indices.iter().zip(new_idx.iter()) {
            pos_of[*orig as usize] = new_i as usize;
        }
        assert!((pos_of[2] as i32 - pos_of[3] as i32).abs() == 1);
    }
}
