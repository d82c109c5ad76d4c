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

//! Delta (differential) coding: 8-bit and 16-bit variants, both invertible
//! under modular wraparound.

use crate::error::{Error, Result};

/// `x0, x1-x0, x2-x1, ...` modulo 256.
#[must_use]
pub fn delta8_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u8;
    for &x in data {
        out.push(x.wrapping_sub(prev));
        prev = x;
    }
    out
}

/// Inverse of `delta8_encode`: `x0, xi = x(i-1) + di` modulo 256.
#[must_use]
pub fn delta8_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u8;
    for &d in data {
        let x = prev.wrapping_add(d);
        out.push(x);
        prev = x;
    }
    out
}

/// Same scheme over 16-bit little-endian units. Requires an even byte count.
pub fn delta16_encode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % 2 != 0 {
        return Err(Error::Validation(
            "delta16: input length must be even".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u16;
    for chunk in data.chunks_exact(2) {
        let x = u16::from_le_bytes([chunk[0], chunk[1]]);
        let d = x.wrapping_sub(prev);
        out.extend_from_slice(&d.to_le_bytes());
        prev = x;
    }
    Ok(out)
}

/// Inverse of `delta16_encode`.
pub fn delta16_decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() % 2 != 0 {
        return Err(Error::Validation(
            "delta16: input length must be even".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u16;
    for chunk in data.chunks_exact(2) {
        let d = u16::from_le_bytes([chunk[0], chunk[1]]);
        let x = prev.wrapping_add(d);
        out.extend_from_slice(&x.to_le_bytes());
        prev = x;
    }
    Ok(out)
}
