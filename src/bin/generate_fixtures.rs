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

//! Test Fixture Generator
//!
//! Generates deterministic XRGB8888 test images used as inputs for golden
//! tests. These fixtures are identical on every platform (no randomness).
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin generate_fixtures
//! ```
//!
//! # Generated Files
//!
//! - `tests/fixtures/frame_64x64.rgba` (16,384 bytes)
//!   - 64x64 image with 4 quadrants: top-left red horizontal gradient
//!     (tests quantizer dithering), top-right green vertical gradient,
//!     bottom-left solid blue (tests single-color DXTG/DXTV blocks),
//!     bottom-right checkerboard (tests tile/tilemap deduplication).
//! - `tests/fixtures/frame_32x32_moving.rgba` and
//!   `frame_32x32_moving_shifted.rgba` (4,096 bytes each)
//!   - A solid 16x16 square at two different offsets, for exercising
//!     DXTV's motion-compensation search.

fn write_fixture(path: &str, pixels: &[u8]) {
    std::fs::create_dir_all("tests/fixtures").expect("create tests/fixtures directory");
    std::fs::write(path, pixels).unwrap_or_else(|e| panic!("writing {path}: {e}"));
    println!("Generated {path} ({} bytes)", pixels.len());
}

fn main() {
    let mut pixels = Vec::with_capacity(64 * 64 * 4);
    for y in 0..64u32 {
        for x in 0..64u32 {
            let (r, g, b) = if x < 32 && y < 32 {
                ((x * 8) as u8, 0, 0)
            } else if x >= 32 && y < 32 {
                (0, (y * 8) as u8, 0)
            } else if x < 32 && y >= 32 {
                (0, 0, 200)
            } else if (x + y) % 2 == 0 {
                (255, 255, 255)
            } else {
                (0, 0, 0)
            };
            pixels.extend_from_slice(&[b, g, r, 0]);
        }
    }
    write_fixture("tests/fixtures/frame_64x64.rgba", &pixels);

    let square = |offset_x: u32, offset_y: u32| -> Vec<u8> {
        let mut pixels = vec![0u8; 32 * 32 * 4];
        for y in 0..16u32 {
            for x in 0..16u32 {
                let px = x + offset_x;
                let py = y + offset_y;
                if px < 32 && py < 32 {
                    let idx = ((py * 32 + px) * 4) as usize;
                    pixels[idx..idx + 4].copy_from_slice(&[0xff, 0, 0, 0]);
                }
            }
        }
        pixels
    };
    write_fixture(
        "tests/fixtures/frame_32x32_moving.rgba",
        &square(8, 8),
    );
    write_fixture(
        "tests/fixtures/frame_32x32_moving_shifted.rgba",
        &square(6, 6),
    );
}
