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

//! The C-source emitter (§6.2): produces a `<name>.h` / `<name>.c` pair
//! carrying image data as 4-byte-aligned `const` arrays, for toolchains
//! that link generated assets directly rather than reading the V2H
//! container at runtime.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};

/// One image's worth of data to emit: raw pixel bytes plus an optional
/// palette.
pub struct EmitImage {
    pub data: Vec<u8>,
    pub palette: Option<Vec<u16>>,
}

/// Emitter configuration. `per_tile` selects `BYTES_PER_TILE` / `NR_OF_TILES`
/// macro names instead of `BYTES_PER_IMAGE` / `NR_OF_IMAGES`; `start_indices`
/// additionally emits a per-image offset table.
pub struct EmitOptions {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub per_tile: bool,
    pub start_indices: bool,
}

/// Rounds `n` up to the next multiple of 4.
fn align4(n: usize) -> usize {
    (n + 3) & !3
}

fn guard_macro(name: &str) -> String {
    format!("{}_H", name.to_uppercase().replace(['-', '.'], "_"))
}

/// Emits the `.h` and `.c` file contents as `(header, source)`.
pub fn emit(options: &EmitOptions, images: &[EmitImage]) -> Result<(String, String)> {
    if images.is_empty() {
        return Err(Error::Invariant(
            "emit: at least one image is required".to_string(),
        ));
    }
    let image_len = images[0].data.len();
    if images.iter().any(|i| i.data.len() != image_len) {
        return Err(Error::Invariant(
            "emit: all images in a batch must have the same byte length".to_string(),
        ));
    }
    let has_palette = images[0].palette.is_some();
    if images.iter().any(|i| i.palette.is_some() != has_palette) {
        return Err(Error::Invariant(
            "emit: all images must agree on whether a palette is present".to_string(),
        ));
    }
    if let Some(p0) = &images[0].palette {
        if images.iter().any(|i| i.palette.as_ref().unwrap().len() != p0.len()) {
            return Err(Error::Invariant(
                "emit: all palettes in a batch must have the same length".to_string(),
            ));
        }
    }

    let count_macro = if options.per_tile { "NR_OF_TILES" } else { "NR_OF_IMAGES" };
    let bytes_macro = if options.per_tile { "BYTES_PER_TILE" } else { "BYTES_PER_IMAGE" };
    let guard = guard_macro(&options.name);
    let array_name = format!("{}Data", options.name);
    let data_size_words = align4(image_len) / 4;

    let mut header = String::new();
    header.push_str(&format!("#ifndef {guard}\n#define {guard}\n\n"));
    header.push_str("#include <stdint.h>\n\n");
    header.push_str(&format!("#define WIDTH {}\n", options.width));
    header.push_str(&format!("#define HEIGHT {}\n", options.height));
    header.push_str(&format!("#define {bytes_macro} {image_len}\n"));
    header.push_str(&format!("#define DATA_SIZE {data_size_words}\n"));
    header.push_str(&format!("#define {count_macro} {}\n", images.len()));
    if let Some(p0) = &images[0].palette {
        header.push_str(&format!("#define PALETTE_LENGTH {}\n", p0.len()));
        header.push_str(&format!("#define PALETTE_SIZE {}\n", p0.len() * 2));
    }
    header.push('\n');
    header.push_str(&format!(
        "extern const uint32_t {array_name}[{}][{data_size_words}];\n",
        images.len()
    ));
    if has_palette {
        let palette_len = images[0].palette.as_ref().unwrap().len();
        header.push_str(&format!(
            "extern const uint16_t {array_name}Palette[{}][{palette_len}];\n",
            images.len()
        ));
    }
    if options.start_indices {
        header.push_str(&format!(
            "extern const uint32_t {array_name}StartIndices[{}];\n",
            images.len() + 1
        ));
    }
    header.push_str(&format!("\n#endif // {guard}\n"));

    let mut source = String::new();
    source.push_str(&format!("#include \"{}.h\"\n\n", options.name));
    source.push_str(&format!(
        "__attribute__((aligned(4)))\nconst uint32_t {array_name}[{}][{data_size_words}] = {{\n",
        images.len()
    ));
    for image in images {
        source.push_str("    {");
        source.push_str(&words_as_hex(&image.data, data_size_words));
        source.push_str("},\n");
    }
    source.push_str("};\n");

    if has_palette {
        let palette_len = images[0].palette.as_ref().unwrap().len();
        source.push_str(&format!(
            "\n__attribute__((aligned(4)))\nconst uint16_t {array_name}Palette[{}][{palette_len}] = {{\n",
            images.len()
        ));
        for image in images {
            let palette = image.palette.as_ref().unwrap();
            let entries: Vec<String> = palette.iter().map(|c| format!("0x{c:04x}")).collect();
            source.push_str(&format!("    {{{}}},\n", entries.join(", ")));
        }
        source.push_str("};\n");
    }

    if options.start_indices {
        source.push_str(&format!(
            "\n__attribute__((aligned(4)))\nconst uint32_t {array_name}StartIndices[{}] = {{\n",
            images.len() + 1
        ));
        let unit = data_size_words;
        let offsets: Vec<String> = (0..=images.len()).map(|i| (i * unit).to_string()).collect();
        source.push_str(&format!("    {}\n", offsets.join(", ")));
        source.push_str("};\n");
    }

    Ok((header, source))
}

/// Packs `data` (padded with zero bytes to a multiple of 4) into
/// `word_count` little-endian 32-bit hex literals, comma-separated.
fn words_as_hex(data: &[u8], word_count: usize) -> String {
    let mut padded = BytesMut::from(data);
    padded.resize(word_count * 4, 0);
    let mut cursor = padded.freeze();

    let mut words = Vec::with_capacity(word_count);
    for _ in 0..word_count {
        words.push(format!("0x{:08x}", cursor.get_u32_le()));
    }
    words.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_header_macros_for_single_image() {
        let options = EmitOptions {
            name: "sprite".to_string(),
            width: 8,
            height: 8,
            per_tile: false,
            start_indices: false,
        };
        let images = vec![EmitImage {
            data: vec![0xAB; 64],
            palette: None,
        }];
        let (header, source) = emit(&options, &images).unwrap();
        assert!(header.contains("#define WIDTH 8"));
        assert!(header.contains("#define HEIGHT 8"));
        assert!(header.contains("#define BYTES_PER_IMAGE 64"));
        assert!(header.contains("#define DATA_SIZE 16"));
        assert!(header.contains("#define NR_OF_IMAGES 1"));
        assert!(!header.contains("PALETTE_LENGTH"));
        assert!(source.contains("spriteData[1][16]"));
    }

    #[test]
    fn pads_data_to_a_multiple_of_4_bytes() {
        let options = EmitOptions {
            name: "odd".to_string(),
            width: 1,
            height: 1,
            per_tile: false,
            start_indices: false,
        };
        let images = vec![EmitImage {
            data: vec![1, 2, 3],
            palette: None,
        }];
        let (header, source) = emit(&options, &images).unwrap();
        assert!(header.contains("#define DATA_SIZE 1"));
        assert!(source.contains("0x00030201"));
    }

    #[test]
    fn emits_palette_macros_and_array_when_present() {
        let options = EmitOptions {
            name: "tiles".to_string(),
            width: 8,
            height: 8,
            per_tile: true,
            start_indices: false,
        };
        let images = vec![EmitImage {
            data: vec![0; 32],
            palette: Some(vec![0x1234, 0x5678]),
        }];
        let (header, source) = emit(&options, &images).unwrap();
        assert!(header.contains("#define PALETTE_LENGTH 2"));
        assert!(header.contains("#define PALETTE_SIZE 4"));
        assert!(header.contains("#define NR_OF_TILES 1"));
        assert!(source.contains("0x1234, 0x5678"));
    }

    #[test]
    fn emits_start_indices_table() {
        let options = EmitOptions {
            name: "anim".to_string(),
            width: 4,
            height: 4,
            per_tile: false,
            start_indices: true,
        };
        let images = vec![
            EmitImage {
                data: vec![0; 16],
                palette: None,
            },
            EmitImage {
                data: vec![1; 16],
                palette: None,
            },
        ];
        let (header, source) = emit(&options, &images).unwrap();
        assert!(header.contains("animDataStartIndices[3]"));
        assert!(source.contains("0, 4, 8"));
    }

    #[test]
    fn rejects_empty_image_batch() {
        let options = EmitOptions {
            name: "empty".to_string(),
            width: 1,
            height: 1,
            per_tile: false,
            start_indices: false,
        };
        assert!(emit(&options, &[]).is_err());
    }

    #[test]
    fn rejects_mismatched_image_lengths() {
        let options = EmitOptions {
            name: "mixed".to_string(),
            width: 1,
            height: 1,
            per_tile: false,
            start_indices: false,
        };
        let images = vec![
            EmitImage { data: vec![0; 4], palette: None },
            EmitImage { data: vec![0; 8], palette: None },
        ];
        assert!(emit(&options, &images).is_err());
    }
}
