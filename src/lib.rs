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

//! An offline authoring toolchain for still-image and video assets
//! targeting resource-constrained, 32-bit embedded playback targets with
//! hardware LZ77 decompressors.
//!
//! This crate covers: the color model and conversions, pixel buffers and
//! image frames, tile/sprite geometry, quantizers, palette manipulation,
//! delta coding, the compression primitives (LZSS-10/11, RLE, rANS, DXTG,
//! DXTV), the pipeline engine that chains them, the V2H container
//! reader/writer, and a C-source emitter for toolchains that link
//! generated assets directly.
//!
//! CLI argument parsing, image/media file I/O backends, and the on-device
//! runtime player are out of scope: this crate exposes the library surface
//! those front ends would drive.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod color;
pub mod container;
pub mod delta;
pub mod dxtg;
pub mod dxtv;
pub mod emit;
pub mod error;
pub mod image;
pub mod lzss;
pub mod palette;
pub mod pipeline;
pub mod pixelbuffer;
pub mod quantize;
pub mod rans;
pub mod rle;
pub mod tiles;

pub use error::{Error, Result};
