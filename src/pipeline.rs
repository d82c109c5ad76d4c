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

//! The pipeline engine (§4.7): an ordered list of steps transforming image
//! frames, each step tagged with a kind and an optional processing-chunk
//! header.
//!
//! The source dispatches through a variant-type parameter and a per-step
//! function-pointer table; here that becomes a tagged [`Step`] enum, each
//! variant carrying a boxed closure, with the engine matching on the tag
//! and dispatching to it. Per-step hidden state (inter-frame deltas, DXTV's
//! previous-frame buffer) lives in a [`StepState`] slot owned by the
//! pipeline for the step's lifetime.

use crate::color::ColorFormat;
use crate::error::{Error, Result};
use crate::image::ImageFrame;
use crate::pixelbuffer::{PixelBuffer, PixelData};

#[cfg(feature = "debug-logging")]
use log::debug;

/// Stable numeric processing codes (§6.1), read by the on-device decoder
/// to know which inverse operation to run on each chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessingType {
    Uncompressed = 0,
    ResampleInput = 10,
    Repackage = 20,
    Lz77_10 = 60,
    Lz77_11 = 61,
    Rle = 64,
    Rans = 65,
    Adpcm = 70,
    Dxtv = 71,
    Gvid = 72,
    ConvertToRaw = 80,
    PadTo = 81,
    EqualizeColorMaps = 93,
    Invalid = 255,
}

/// Per-step hidden state, typed to the kind of step that owns it. The
/// engine allocates one slot per [`Step::ConvertWithState`] entry and
/// threads it through every invocation of that step across the pipeline's
/// lifetime.
#[derive(Debug, Default)]
pub enum StepState {
    #[default]
    None,
    /// Previous frame for inter-frame delta coding.
    PreviousFrame(Option<ImageFrame>),
    /// Previous decoded DXTV buffer plus a running frame counter, used to
    /// drive key-frame spacing.
    Dxtv {
        previous: Option<crate::dxtv::FrameBuffer>,
        frame_counter: u32,
    },
}

/// A single pipeline step. Each variant carries the step's own typed
/// closure plus its wire-format metadata (`processing_type`,
/// `prepend_header`).
pub enum Step {
    /// Consumes external input, emits exactly one frame. Must be first.
    Input {
        name: &'static str,
        f: Box<dyn FnMut() -> Result<ImageFrame>>,
    },
    /// Pure image frame to image frame transform.
    Convert {
        name: &'static str,
        processing_type: ProcessingType,
        prepend_header: bool,
        f: Box<dyn Fn(&ImageFrame) -> Result<ImageFrame>>,
    },
    /// Image frame to image frame transform with a mutable per-step state
    /// slot (inter-frame delta coding, DXTV).
    ConvertWithState {
        name: &'static str,
        processing_type: ProcessingType,
        prepend_header: bool,
        f: Box<dyn FnMut(&ImageFrame, &mut StepState) -> Result<ImageFrame>>,
    },
    /// N frames to N frames (palette equalization across a batch).
    BatchConvert {
        name: &'static str,
        processing_type: ProcessingType,
        prepend_header: bool,
        f: Box<dyn Fn(&[ImageFrame]) -> Result<Vec<ImageFrame>>>,
    },
    /// N frames to 1 frame (e.g. tilemap construction across a batch).
    Reduce {
        name: &'static str,
        processing_type: ProcessingType,
        prepend_header: bool,
        f: Box<dyn Fn(&[ImageFrame]) -> Result<ImageFrame>>,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Input { name, .. }
            | Step::Convert { name, .. }
            | Step::ConvertWithState { name, .. }
            | Step::BatchConvert { name, .. }
            | Step::Reduce { name, .. } => name,
        }
    }
}

/// Pipeline configuration: the ordered step list. This is the library-level
/// shape an external CLI front-end (out of scope, §1) would construct and
/// pass in.
pub struct PipelineOptions {
    pub steps: Vec<Step>,
}

/// The 4-byte processing-chunk header: `(processing_type: u8 | FINAL_BIT,
/// uncompressed_size: u24)`, prepended to a step's output when that step is
/// tagged `prepend_header`.
pub const FINAL_BIT: u8 = 0x80;

fn processing_header(processing_type: ProcessingType, uncompressed_size: usize, is_final: bool) -> Result<[u8; 4]> {
    if uncompressed_size > 0x00FF_FFFF {
        return Err(Error::Validation(
            "pipeline: uncompressed size does not fit in 24 bits".to_string(),
        ));
    }
    let mut type_byte = processing_type as u8;
    if is_final {
        type_byte |= FINAL_BIT;
    }
    let size = uncompressed_size as u32;
    Ok([
        type_byte,
        (size & 0xFF) as u8,
        ((size >> 8) & 0xFF) as u8,
        ((size >> 16) & 0xFF) as u8,
    ])
}

/// Result of running a pipeline over a single frame: the final frame's
/// pixel bytes (with any requested processing headers prepended per step),
/// and the high-water mark of `step_output_bytes + 4` across every step
/// after the first.
pub struct PipelineOutput {
    pub bytes: Vec<u8>,
    pub max_memory_needed: usize,
}

/// Wraps raw bytes as an opaque byte-stream frame so a later step's
/// transform operates on (and may further compress) a chunk header emitted
/// by an earlier step, exactly as the on-device decoder will encounter it:
/// nested, not concatenated.
fn bytes_as_frame(bytes: Vec<u8>, name: &str) -> Result<ImageFrame> {
    let len = bytes.len() as u32;
    let pixels = PixelBuffer::new(ColorFormat::Paletted8, len, 1, PixelData::Indices(bytes))?;
    Ok(ImageFrame::new(pixels, name, 0))
}

/// Runs `options.steps` once, producing one output frame's worth of bytes.
///
/// The first step MUST be [`Step::Input`]; every step after it consumes
/// the previous step's frame(s). `BatchConvert` and `Reduce` steps are
/// skipped in this single-frame entry point (per §7's propagation policy:
/// they are silently ignored in single-frame stream mode); use
/// [`run_batch`] when a pipeline contains them.
pub fn run(options: &mut PipelineOptions, states: &mut [StepState]) -> Result<PipelineOutput> {
    if options.steps.is_empty() {
        return Err(Error::Invariant(
            "pipeline: must contain at least one step".to_string(),
        ));
    }
    if states.len() != options.steps.len() {
        return Err(Error::Invariant(
            "pipeline: state slot count must match step count".to_string(),
        ));
    }

    let mut frame = match &mut options.steps[0] {
        Step::Input { name, f } => {
            let frame = f()?;
            #[cfg(feature = "debug-logging")]
            debug!("pipeline: step '{name}' (Input) produced {} bytes", frame.pixels.as_raw_bytes().len());
            #[cfg(not(feature = "debug-logging"))]
            let _ = name;
            frame
        }
        other => {
            return Err(Error::Invariant(format!(
                "pipeline: first step must be Input, found '{}'",
                other.name()
            )))
        }
    };

    let mut max_memory_needed: usize = 0;
    // `None` until the first non-input step runs, so a pipeline containing
    // only an Input step yields empty bytes rather than the raw input.
    let mut produced: Option<Vec<u8>> = None;
    // The first non-input step's header carries the final bit: a player
    // unwraps chunks outermost-first, so the step that ran earliest in
    // the pipeline produces the innermost (and thus last-unwrapped) header.
    let first_non_input = options
        .steps
        .iter()
        .enumerate()
        .find(|(_, s)| !matches!(s, Step::Input { .. }))
        .map(|(i, _)| i);

    for (i, step) in options.steps.iter_mut().enumerate().skip(1) {
        let (prepend_header, processing_type, output_bytes, name) = match step {
            Step::Convert {
                name,
                processing_type,
                prepend_header,
                f,
            } => {
                frame = f(&frame)?;
                (*prepend_header, *processing_type, frame.pixels.as_raw_bytes(), *name)
            }
            Step::ConvertWithState {
                name,
                processing_type,
                prepend_header,
                f,
            } => {
                frame = f(&frame, &mut states[i])?;
                (*prepend_header, *processing_type, frame.pixels.as_raw_bytes(), *name)
            }
            Step::BatchConvert { name, .. } | Step::Reduce { name, .. } => {
                #[cfg(feature = "debug-logging")]
                debug!("pipeline: skipping '{name}' in single-frame stream mode");
                #[cfg(not(feature = "debug-logging"))]
                let _ = name;
                continue;
            }
            Step::Input { name, .. } => {
                return Err(Error::Invariant(format!(
                    "pipeline: Input step '{name}' may only appear first"
                )))
            }
        };

        #[cfg(feature = "debug-logging")]
        debug!(
            "pipeline: step '{name}' ({processing_type:?}) produced {} bytes",
            output_bytes.len()
        );
        #[cfg(not(feature = "debug-logging"))]
        let _ = name;

        max_memory_needed = max_memory_needed.max(output_bytes.len() + 4);

        if prepend_header {
            let is_final = Some(i) == first_non_input;
            let header = processing_header(processing_type, output_bytes.len(), is_final)?;
            let mut wrapped = Vec::with_capacity(4 + output_bytes.len());
            wrapped.extend_from_slice(&header);
            wrapped.extend_from_slice(&output_bytes);
            // Feed the wrapped bytes forward as the next step's input, so a
            // later compressor sees (and may compress) this header as part
            // of its payload: chunk headers chain by nesting, not by
            // concatenation, mirroring how the on-device decoder peels them
            // off one decompression at a time.
            frame = bytes_as_frame(wrapped.clone(), name)?;
            produced = Some(wrapped);
        } else {
            produced = Some(output_bytes);
        }
    }

    Ok(PipelineOutput {
        bytes: produced.unwrap_or_default(),
        max_memory_needed,
    })
}

/// Runs a pipeline that contains `BatchConvert`/`Reduce` steps over a
/// batch of already-produced input frames (bypassing the `Input` step,
/// which is ignored in batch mode per §7).
pub fn run_batch(options: &PipelineOptions, mut frames: Vec<ImageFrame>) -> Result<Vec<ImageFrame>> {
    for step in options.steps.iter().skip_while(|s| matches!(s, Step::Input { .. })) {
        frames = match step {
            Step::Input { .. } => continue,
            Step::Convert { f, .. } => frames
                .iter()
                .map(|frame| f(frame))
                .collect::<Result<Vec<_>>>()?,
            Step::ConvertWithState { name, .. } => {
                return Err(Error::Invariant(format!(
                    "pipeline: ConvertWithState step '{name}' is not supported in batch mode"
                )))
            }
            Step::BatchConvert { f, .. } => f(&frames)?,
            Step::Reduce { f, .. } => vec![f(&frames)?],
        };
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorFormat;
    use crate::pixelbuffer::{PixelBuffer, PixelData};

    fn test_frame(bytes: Vec<u8>) -> ImageFrame {
        let pixels = PixelBuffer::new(
            ColorFormat::Paletted8,
            bytes.len() as u32,
            1,
            PixelData::Indices(bytes),
        )
        .unwrap();
        ImageFrame::new(pixels, "test", 0)
    }

    #[test]
    fn single_input_step_round_trips_bytes() {
        let data = vec![1u8, 2, 3, 4];
        let mut options = PipelineOptions {
            steps: vec![Step::Input {
                name: "input",
                f: {
                    let data = data.clone();
                    Box::new(move || Ok(test_frame(data.clone())))
                },
            }],
        };
        let mut states = vec![StepState::None];
        let result = run(&mut options, &mut states).unwrap();
        assert_eq!(result.max_memory_needed, 0);
        assert!(result.bytes.is_empty());
    }

    #[test]
    fn convert_step_without_header_passes_bytes_through() {
        let data = vec![1u8, 2, 3, 4];
        let mut options = PipelineOptions {
            steps: vec![
                Step::Input {
                    name: "input",
                    f: {
                        let data = data.clone();
                        Box::new(move || Ok(test_frame(data.clone())))
                    },
                },
                Step::Convert {
                    name: "identity",
                    processing_type: ProcessingType::Uncompressed,
                    prepend_header: false,
                    f: Box::new(|frame: &ImageFrame| Ok(frame.clone())),
                },
            ],
        };
        let mut states = vec![StepState::None, StepState::None];
        let result = run(&mut options, &mut states).unwrap();
        assert_eq!(result.bytes, data);
        assert_eq!(result.max_memory_needed, data.len() + 4);
    }

    #[test]
    fn single_header_step_sets_final_bit() {
        let data = vec![5u8; 8];
        let mut options = PipelineOptions {
            steps: vec![
                Step::Input {
                    name: "input",
                    f: {
                        let data = data.clone();
                        Box::new(move || Ok(test_frame(data.clone())))
                    },
                },
                Step::Convert {
                    name: "rle",
                    processing_type: ProcessingType::Rle,
                    prepend_header: true,
                    f: Box::new(|frame: &ImageFrame| {
                        let bytes = crate::rle::encode(&frame.pixels.as_raw_bytes());
                        Ok(test_frame(bytes))
                    }),
                },
            ],
        };
        let mut states = vec![StepState::None, StepState::None];
        let result = run(&mut options, &mut states).unwrap();
        assert_eq!(result.bytes[0] & FINAL_BIT, FINAL_BIT);
        assert_eq!(result.bytes[0] & !FINAL_BIT, ProcessingType::Rle as u8);
    }

    #[test]
    fn chained_header_steps_set_final_bit_only_on_first_non_input_step() {
        // Ordering rule (§4.7): the final bit marks the first non-input
        // step, so a reverse-chaining decoder knows where to stop.
        let data = vec![9u8, 9, 9, 9, 1, 2];
        let mut options = PipelineOptions {
            steps: vec![
                Step::Input {
                    name: "input",
                    f: {
                        let data = data.clone();
                        Box::new(move || Ok(test_frame(data.clone())))
                    },
                },
                Step::Convert {
                    name: "delta8",
                    processing_type: ProcessingType::Repackage,
                    prepend_header: true,
                    f: Box::new(|frame: &ImageFrame| {
                        Ok(test_frame(crate::delta::delta8_encode(&frame.pixels.as_raw_bytes())))
                    }),
                },
                Step::Convert {
                    name: "rle",
                    processing_type: ProcessingType::Rle,
                    prepend_header: true,
                    f: Box::new(|frame: &ImageFrame| {
                        let raw = frame.pixels.as_raw_bytes();
                        let unwrapped = &raw[4..];
                        Ok(test_frame(crate::rle::encode(unwrapped)))
                    }),
                },
            ],
        };
        let mut states = vec![StepState::None, StepState::None, StepState::None];
        let result = run(&mut options, &mut states).unwrap();
        // First header (delta8's, written first in the chain) carries
        // FINAL_BIT; the second (rle's, outermost) does not.
        let delta_type = result.bytes[0] & !FINAL_BIT;
        assert_eq!(delta_type, ProcessingType::Rle as u8);
        assert_eq!(result.bytes[0] & FINAL_BIT, 0);
    }

    #[test]
    fn rejects_empty_pipeline() {
        let mut options = PipelineOptions { steps: vec![] };
        let mut states = vec![];
        assert!(run(&mut options, &mut states).is_err());
    }

    #[test]
    fn rejects_pipeline_not_starting_with_input() {
        let mut options = PipelineOptions {
            steps: vec![Step::Convert {
                name: "identity",
                processing_type: ProcessingType::Uncompressed,
                prepend_header: false,
                f: Box::new(|frame: &ImageFrame| Ok(frame.clone())),
            }],
        };
        let mut states = vec![StepState::None];
        assert!(run(&mut options, &mut states).is_err());
    }
}
