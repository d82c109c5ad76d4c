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

//! Error kinds shared across the pipeline, codecs, and container layers.
//!
//! The five kinds mirror the abstract error taxonomy of the toolchain: a
//! caller can match on the variant to decide whether a problem was in the
//! input, the caller-supplied parameters, a structural invariant, a codec's
//! inability to meet its contract, or an external collaborator.

use thiserror::Error;

/// Errors produced anywhere in the `v2h_tools` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// File not found, unreadable, unsupported format, size mismatch across a
    /// batch, bad color depth.
    #[error("input error: {0}")]
    Input(String),

    /// Caller-supplied parameter out of range, or a referenced color absent
    /// from a palette.
    #[error("validation error: {0}")]
    Validation(String),

    /// A structural invariant of the data was violated (too many unique
    /// tiles, too many colors, wrong size multiple, index out of range).
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A codec could not meet its declared contract (e.g. DXTV could not
    /// satisfy the caller's error bound).
    #[error("codec error: {0}")]
    Codec(String),

    /// An external collaborator failed (missing helper binary, temp file
    /// write failure).
    #[error("external error: {0}")]
    External(String),

    /// Opaque I/O failure, wrapped from `std::io::Error`.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
