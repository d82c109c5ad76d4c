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

//! Quantizers: threshold, closest-color cluster-fit, and Atkinson
//! error-diffusion dithering against a fixed target palette.

use std::collections::HashMap;

use crate::color::{distance_xrgb8888, xrgb8888_to_gray, Xrgb8888};
use crate::error::{Error, Result};

/// Threshold (black/white) quantization: convert to grayscale, emit a
/// 2-color paletted image. `threshold` is in `[0.0, 1.0]`.
///
/// Palette is always `{0x000000, 0xFFFFFF}`.
pub fn threshold_quantize(pixels: &[Xrgb8888], threshold: f32) -> Result<(Vec<u8>, [Xrgb8888; 2])> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::Validation(format!(
            "threshold quantize: threshold {threshold} out of [0,1]"
        )));
    }
    let cut = (threshold * 255.0).round() as u8;
    let indices = pixels
        .iter()
        .map(|&p| u8::from(xrgb8888_to_gray(p) >= cut))
        .collect();
    Ok((indices, [Xrgb8888::new(0, 0, 0), Xrgb8888::new(255, 255, 255)]))
}

/// Closest-color cluster-fit quantization. Builds a color histogram over
/// `pixels`, greedily clusters the histogram entries to the `k` closest
/// colors in `target`, then returns the reduced palette and the per-pixel
/// index buffer.
///
/// `k` must be in `[1, 255]`; unused target slots beyond `k` are not
/// emitted.
pub fn closest_color_quantize(
    pixels: &[Xrgb8888],
    target: &[Xrgb8888],
    k: usize,
) -> Result<(Vec<u8>, Vec<Xrgb8888>)> {
    if k == 0 || k > 255 {
        return Err(Error::Validation(format!(
            "closest-color quantize: k={k} out of [1,255]"
        )));
    }
    if target.is_empty() {
        return Err(Error::Validation(
            "closest-color quantize: target color map is empty".to_string(),
        ));
    }

    let mut histogram: HashMap<Xrgb8888, u32> = HashMap::new();
    for &p in pixels {
        *histogram.entry(p).or_insert(0) += 1;
    }

    // Greedily pick the k target colors that best serve the histogram: for
    // each candidate target color, its "weight" is the histogram mass of
    // pixels for which it is currently the closest among chosen candidates.
    // We iteratively add the candidate that reduces total weighted error
    // the most, which is equivalent in spirit to a k-center / k-medoid
    // greedy build seeded from the full target set.
    let mut remaining: Vec<usize> = (0..target.len()).collect();
    let mut chosen: Vec<usize> = Vec::with_capacity(k);

    while chosen.len() < k && !remaining.is_empty() {
        let mut best_idx = 0usize;
        let mut best_score = f64::INFINITY;
        for (ri, &cand) in remaining.iter().enumerate() {
            let mut total = 0.0;
            for (&color, &count) in &histogram {
                let mut best_d = distance_xrgb8888(color, target[cand]);
                for &c in &chosen {
                    let d = distance_xrgb8888(color, target[c]);
                    if d < best_d {
                        best_d = d;
                    }
                }
                total += best_d * f64::from(count);
            }
            if total < best_score {
                best_score = total;
                best_idx = ri;
            }
        }
        chosen.push(remaining.remove(best_idx));
    }

    let palette: Vec<Xrgb8888> = chosen.iter().map(|&i| target[i]).collect();

    let indices = pixels
        .iter()
        .map(|&p| {
            let mut best = 0usize;
            let mut best_d = f64::INFINITY;
            for (i, &c) in palette.iter().enumerate() {
                let d = distance_xrgb8888(p, c);
                if d < best_d {
                    best_d = d;
                    best = i;
                }
            }
            best as u8
        })
        .collect();

    Ok((indices, palette))
}

/// Atkinson error-diffusion dither against `target`, in raster order.
/// Kernel distributes 1/8 of the quantization error to each of six
/// neighboring pixels (the classic Atkinson pattern).
pub fn atkinson_dither(
    pixels: &[Xrgb8888],
    width: usize,
    height: usize,
    target: &[Xrgb8888],
) -> Result<(Vec<u8>, Vec<Xrgb8888>)> {
    if pixels.len() != width * height {
        return Err(Error::Invariant(
            "atkinson dither: pixel count does not match width*height".to_string(),
        ));
    }
    if target.is_empty() {
        return Err(Error::Validation(
            "atkinson dither: target color map is empty".to_string(),
        ));
    }

    let mut work: Vec<[f32; 3]> = pixels
        .iter()
        .map(|p| [f32::from(p.r), f32::from(p.g), f32::from(p.b)])
        .collect();
    let mut indices = vec![0u8; pixels.len()];

    let nearest = |c: [f32; 3]| -> usize {
        let probe = Xrgb8888::new(
            c[0].round().clamp(0.0, 255.0) as u8,
            c[1].round().clamp(0.0, 255.0) as u8,
            c[2].round().clamp(0.0, 255.0) as u8,
        );
        let mut best = 0usize;
        let mut best_d = f64::INFINITY;
        for (i, &t) in target.iter().enumerate() {
            let d = distance_xrgb8888(probe, t);
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    };

    // (dx, dy) offsets receiving 1/8 of the error each.
    const OFFSETS: [(isize, isize); 6] = [(1, 0), (2, 0), (-1, 1), (0, 1), (1, 1), (0, 2)];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = work[idx];
            let chosen = nearest(old);
            indices[idx] = chosen as u8;
            let new = target[chosen];
            let err = [
                old[0] - f32::from(new.r),
                old[1] - f32::from(new.g),
                old[2] - f32::from(new.b),
            ];
            for (dx, dy) in OFFSETS {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if nx >= 0 && (nx as usize) < width && ny >= 0 && (ny as usize) < height {
                    let n = ny as usize * width + nx as usize;
                    for c in 0..3 {
                        work[n][c] += err[c] / 8.0;
                    }
                }
            }
        }
    }

    Ok((indices, target.to_vec()))
}
