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

//! The V2H container format (§6.1): a file header, one sub-header per
//! present media type, then a sequence of frame headers and payloads.
//!
//! All integers are little-endian; all structure offsets are 4-byte
//! aligned.

use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Error, Result};

#[cfg(feature = "debug-logging")]
use log::debug;

/// `"v2h0"` as a little-endian u32.
pub const MAGIC: u32 = 0x7632_6830;

bitflags! {
    /// `content_type` bitfield in the file header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContentType: u8 {
        const AUDIO     = 0b001;
        const VIDEO     = 0b010;
        const SUBTITLES = 0b100;
    }
}

/// Per-frame data-type tag (distinct from `pipeline::ProcessingType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameDataType {
    Pixels = 1,
    Colormap = 2,
    Audio = 3,
    Subtitles = 4,
}

impl FrameDataType {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            1 => Ok(Self::Pixels),
            2 => Ok(Self::Colormap),
            3 => Ok(Self::Audio),
            4 => Ok(Self::Subtitles),
            other => Err(Error::Input(format!("container: unknown frame data type {other}"))),
        }
    }
}

/// 8-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub content_type: ContentType,
    pub metadata_size: u16,
}

impl FileHeader {
    fn write(&self, out: &mut BytesMut) {
        out.put_u32_le(MAGIC);
        out.put_u8(self.content_type.bits());
        out.put_u8(0); // reserved
        out.put_u16_le(self.metadata_size);
    }

    fn read(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < 8 {
            return Err(Error::Input("container: truncated file header".to_string()));
        }
        let mut cursor = data;
        let magic = cursor.get_u32_le();
        if magic != MAGIC {
            return Err(Error::Input(format!(
                "container: bad magic {magic:#010x}, expected {MAGIC:#010x}"
            )));
        }
        let content_type = ContentType::from_bits_truncate(cursor.get_u8());
        cursor.advance(1); // reserved
        let metadata_size = cursor.get_u16_le();
        Ok((
            Self {
                content_type,
                metadata_size,
            },
            cursor,
        ))
    }
}

/// Audio sub-header. Its field list sums to 20 bytes, not the 16 stated
/// alongside it (§9-style source ambiguity); this implementation follows
/// the field list, the same way the video sub-header's stated 24 bytes
/// already matches its own field list exactly. See `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioHeader {
    pub nr_of_frames: u16,
    pub nr_of_samples: u32,
    pub sample_rate_hz: u16,
    pub channels: u8,
    pub sample_bits: u8,
    pub offset_samples: i16,
    pub memory_needed: u16,
    pub processing: [u8; 4],
}

impl AudioHeader {
    fn validate(&self) -> Result<()> {
        if self.channels != 1 && self.channels != 2 {
            return Err(Error::Validation(format!(
                "container: audio channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if self.sample_bits != 8 && self.sample_bits != 16 {
            return Err(Error::Validation(format!(
                "container: audio sample_bits must be 8 or 16, got {}",
                self.sample_bits
            )));
        }
        Ok(())
    }

    fn write(&self, out: &mut BytesMut) -> Result<()> {
        self.validate()?;
        out.put_u16_le(self.nr_of_frames);
        out.put_u32_le(self.nr_of_samples);
        out.put_u16_le(self.sample_rate_hz);
        out.put_u8(self.channels);
        out.put_u8(self.sample_bits);
        out.put_i16_le(self.offset_samples);
        out.put_u16_le(self.memory_needed);
        out.put_u16_le(0); // reserved
        out.put_slice(&self.processing);
        Ok(())
    }

    const SIZE: usize = 20;

    fn read(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < Self::SIZE {
            return Err(Error::Input("container: truncated audio sub-header".to_string()));
        }
        let mut cursor = data;
        let nr_of_frames = cursor.get_u16_le();
        let nr_of_samples = cursor.get_u32_le();
        let sample_rate_hz = cursor.get_u16_le();
        let channels = cursor.get_u8();
        let sample_bits = cursor.get_u8();
        let offset_samples = cursor.get_i16_le();
        let memory_needed = cursor.get_u16_le();
        cursor.advance(2); // reserved
        let mut processing = [0u8; 4];
        cursor.copy_to_slice(&mut processing);

        let header = Self {
            nr_of_frames,
            nr_of_samples,
            sample_rate_hz,
            channels,
            sample_bits,
            offset_samples,
            memory_needed,
            processing,
        };
        header.validate()?;
        Ok((header, cursor))
    }
}

/// 24-byte video sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoHeader {
    pub nr_of_frames: u16,
    /// 16.16 fixed-point frame rate.
    pub frame_rate_hz: u32,
    pub width: u16,
    pub height: u16,
    pub bits_per_pixel: u8,
    pub bits_per_color: u8,
    pub color_map_entries: u8,
    pub swapped_red_blue: u8,
    pub nr_of_color_map_frames: u16,
    pub memory_needed: u32,
    pub processing: [u8; 4],
}

const VALID_BITS_PER_PIXEL: [u8; 7] = [1, 2, 4, 8, 15, 16, 24];
const VALID_BITS_PER_COLOR: [u8; 4] = [0, 15, 16, 24];

impl VideoHeader {
    fn validate(&self) -> Result<()> {
        if !VALID_BITS_PER_PIXEL.contains(&self.bits_per_pixel) {
            return Err(Error::Validation(format!(
                "container: video bits_per_pixel {} is not one of {VALID_BITS_PER_PIXEL:?}",
                self.bits_per_pixel
            )));
        }
        if !VALID_BITS_PER_COLOR.contains(&self.bits_per_color) {
            return Err(Error::Validation(format!(
                "container: video bits_per_color {} is not one of {VALID_BITS_PER_COLOR:?}",
                self.bits_per_color
            )));
        }
        Ok(())
    }

    fn write(&self, out: &mut BytesMut) -> Result<()> {
        self.validate()?;
        out.put_u16_le(self.nr_of_frames);
        out.put_u32_le(self.frame_rate_hz);
        out.put_u16_le(self.width);
        out.put_u16_le(self.height);
        out.put_u8(self.bits_per_pixel);
        out.put_u8(self.bits_per_color);
        out.put_u8(self.color_map_entries);
        out.put_u8(self.swapped_red_blue);
        out.put_u16_le(self.nr_of_color_map_frames);
        out.put_u32_le(self.memory_needed);
        out.put_slice(&self.processing);
        Ok(())
    }

    fn read(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < 24 {
            return Err(Error::Input("container: truncated video sub-header".to_string()));
        }
        let mut cursor = data;
        let nr_of_frames = cursor.get_u16_le();
        let frame_rate_hz = cursor.get_u32_le();
        let width = cursor.get_u16_le();
        let height = cursor.get_u16_le();
        let bits_per_pixel = cursor.get_u8();
        let bits_per_color = cursor.get_u8();
        let color_map_entries = cursor.get_u8();
        let swapped_red_blue = cursor.get_u8();
        let nr_of_color_map_frames = cursor.get_u16_le();
        let memory_needed = cursor.get_u32_le();
        let mut processing = [0u8; 4];
        cursor.copy_to_slice(&mut processing);

        let header = Self {
            nr_of_frames,
            frame_rate_hz,
            width,
            height,
            bits_per_pixel,
            bits_per_color,
            color_map_entries,
            swapped_red_blue,
            nr_of_color_map_frames,
            memory_needed,
            processing,
        };
        header.validate()?;
        Ok((header, cursor))
    }
}

/// 4-byte subtitles sub-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitlesHeader {
    pub nr_of_frames: u16,
}

impl SubtitlesHeader {
    fn write(&self, out: &mut BytesMut) {
        out.put_u16_le(self.nr_of_frames);
        out.put_u16_le(0); // reserved
    }

    fn read(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < 4 {
            return Err(Error::Input(
                "container: truncated subtitles sub-header".to_string(),
            ));
        }
        let mut cursor = data;
        let nr_of_frames = cursor.get_u16_le();
        cursor.advance(2); // reserved
        Ok((Self { nr_of_frames }, cursor))
    }
}

/// The per-media-type sub-headers that may be present, mirroring the
/// `content_type` bitfield.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerOptions {
    pub audio: Option<AudioHeader>,
    pub video: Option<VideoHeader>,
    pub subtitles: Option<SubtitlesHeader>,
    pub metadata_size: u16,
}

impl ContainerOptions {
    fn content_type(&self) -> ContentType {
        let mut ct = ContentType::empty();
        if self.audio.is_some() {
            ct |= ContentType::AUDIO;
        }
        if self.video.is_some() {
            ct |= ContentType::VIDEO;
        }
        if self.subtitles.is_some() {
            ct |= ContentType::SUBTITLES;
        }
        ct
    }
}

/// One frame: its data-type tag plus the raw bytes (already processed by
/// the pipeline, including any chunk headers it prepended).
pub struct Frame {
    pub data_type: FrameDataType,
    pub data: Vec<u8>,
}

impl Frame {
    fn write(&self, out: &mut BytesMut) -> Result<()> {
        if self.data.len() > 0x00FF_FFFF {
            return Err(Error::Validation(
                "container: frame data size does not fit in 24 bits".to_string(),
            ));
        }
        out.put_u8(self.data_type as u8);
        out.put_uint_le(self.data.len() as u64, 3);
        out.put_slice(&self.data);
        Ok(())
    }

    fn read(data: &[u8]) -> Result<(Self, &[u8])> {
        if data.len() < 4 {
            return Err(Error::Input("container: truncated frame header".to_string()));
        }
        let mut cursor = data;
        let data_type = FrameDataType::from_u8(cursor.get_u8())?;
        let size = cursor.get_uint_le(3) as usize;
        if cursor.remaining() < size {
            return Err(Error::Input("container: truncated frame payload".to_string()));
        }
        let mut payload = vec![0u8; size];
        cursor.copy_to_slice(&mut payload);
        Ok((
            Self {
                data_type,
                data: payload,
            },
            cursor,
        ))
    }
}

/// Writes a complete V2H file: file header, present sub-headers in
/// `Audio, Video, Subtitles` order, then frames in order, then raw
/// metadata bytes.
pub fn write(options: &ContainerOptions, frames: &[Frame], metadata: &[u8]) -> Result<Vec<u8>> {
    if metadata.len() != usize::from(options.metadata_size) {
        return Err(Error::Invariant(format!(
            "container: metadata_size {} does not match supplied metadata length {}",
            options.metadata_size,
            metadata.len()
        )));
    }

    let mut out = BytesMut::new();
    let header = FileHeader {
        content_type: options.content_type(),
        metadata_size: options.metadata_size,
    };
    header.write(&mut out);
    #[cfg(feature = "debug-logging")]
    debug!("container: wrote file header, content_type={:?}", header.content_type);

    if let Some(audio) = &options.audio {
        audio.write(&mut out)?;
    }
    if let Some(video) = &options.video {
        video.write(&mut out)?;
    }
    if let Some(subtitles) = &options.subtitles {
        subtitles.write(&mut out);
    }

    for frame in frames {
        #[cfg(feature = "debug-logging")]
        debug!(
            "container: writing frame, data_type={:?}, {} bytes",
            frame.data_type,
            frame.data.len()
        );
        frame.write(&mut out)?;
    }

    out.put_slice(metadata);
    Ok(out.to_vec())
}

/// A parsed V2H file: the sub-headers present, the frame sequence, and any
/// trailing metadata bytes.
pub struct ParsedContainer {
    pub options: ContainerOptions,
    pub frames: Vec<Frame>,
    pub metadata: Vec<u8>,
}

/// Parses a complete V2H file produced by [`write`].
pub fn read(data: &[u8]) -> Result<ParsedContainer> {
    let (header, mut rest) = FileHeader::read(data)?;

    let mut options = ContainerOptions {
        metadata_size: header.metadata_size,
        ..Default::default()
    };

    if header.content_type.contains(ContentType::AUDIO) {
        let (audio, next) = AudioHeader::read(rest)?;
        options.audio = Some(audio);
        rest = next;
    }
    if header.content_type.contains(ContentType::VIDEO) {
        let (video, next) = VideoHeader::read(rest)?;
        options.video = Some(video);
        rest = next;
    }
    if header.content_type.contains(ContentType::SUBTITLES) {
        let (subtitles, next) = SubtitlesHeader::read(rest)?;
        options.subtitles = Some(subtitles);
        rest = next;
    }

    let total_frames = options.audio.map_or(0, |a| usize::from(a.nr_of_frames))
        + options.video.map_or(0, |v| usize::from(v.nr_of_frames))
        + options.subtitles.map_or(0, |s| usize::from(s.nr_of_frames));

    let mut frames = Vec::with_capacity(total_frames);
    for _ in 0..total_frames {
        let (frame, next) = Frame::read(rest)?;
        frames.push(frame);
        rest = next;
    }

    let metadata_size = usize::from(header.metadata_size);
    if rest.len() < metadata_size {
        return Err(Error::Input("container: truncated metadata".to_string()));
    }
    let metadata = rest[..metadata_size].to_vec();

    Ok(ParsedContainer {
        options,
        frames,
        metadata,
    })
}

/// A processing-chunk header inside a frame, chaining chunks until one
/// with the final bit set (mirrors `pipeline::processing_header`'s wire
/// format so a decoder can walk a frame's chunk chain independently of the
/// encoder's pipeline).
pub fn read_chunk_header(data: &[u8]) -> Result<(u8, bool, usize, &[u8])> {
    if data.len() < 4 {
        return Err(Error::Input("container: truncated chunk header".to_string()));
    }
    let mut cursor = data;
    let type_byte = cursor.get_u8();
    let processing_type = type_byte & !crate::pipeline::FINAL_BIT;
    let is_final = type_byte & crate::pipeline::FINAL_BIT != 0;
    let uncompressed_size = cursor.get_uint_le(3) as usize;
    Ok((processing_type, is_final, uncompressed_size, cursor))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video_header() -> VideoHeader {
        VideoHeader {
            nr_of_frames: 2,
            frame_rate_hz: 60 << 16,
            width: 16,
            height: 16,
            bits_per_pixel: 8,
            bits_per_color: 15,
            color_map_entries: 16,
            swapped_red_blue: 0,
            nr_of_color_map_frames: 0,
            memory_needed: 256,
            processing: [71, 0, 0, 0],
        }
    }

    #[test]
    fn round_trips_video_only_container() {
        let options = ContainerOptions {
            video: Some(sample_video_header()),
            metadata_size: 0,
            ..Default::default()
        };
        let frames = vec![
            Frame {
                data_type: FrameDataType::Pixels,
                data: vec![1, 2, 3, 4],
            },
            Frame {
                data_type: FrameDataType::Pixels,
                data: vec![5, 6],
            },
        ];
        let bytes = write(&options, &frames, &[]).unwrap();
        let parsed = read(&bytes).unwrap();
        assert_eq!(parsed.options.video.unwrap(), sample_video_header());
        assert!(parsed.options.audio.is_none());
        assert_eq!(parsed.frames.len(), 2);
        assert_eq!(parsed.frames[0].data, vec![1, 2, 3, 4]);
        assert_eq!(parsed.frames[1].data, vec![5, 6]);
    }

    #[test]
    fn round_trips_metadata_bytes() {
        let options = ContainerOptions {
            video: Some(VideoHeader {
                nr_of_frames: 0,
                ..sample_video_header()
            }),
            metadata_size: 3,
            ..Default::default()
        };
        let bytes = write(&options, &[], &[9, 8, 7]).unwrap();
        let parsed = read(&bytes).unwrap();
        assert_eq!(parsed.metadata, vec![9, 8, 7]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = write(
            &ContainerOptions {
                video: Some(VideoHeader {
                    nr_of_frames: 0,
                    ..sample_video_header()
                }),
                ..Default::default()
            },
            &[],
            &[],
        )
        .unwrap();
        bytes[0] = 0xFF;
        assert!(read(&bytes).is_err());
    }

    #[test]
    fn rejects_invalid_audio_channel_count() {
        let options = ContainerOptions {
            audio: Some(AudioHeader {
                nr_of_frames: 0,
                nr_of_samples: 0,
                sample_rate_hz: 44100,
                channels: 3,
                sample_bits: 16,
                offset_samples: 0,
                memory_needed: 0,
                processing: [0; 4],
            }),
            ..Default::default()
        };
        assert!(write(&options, &[], &[]).is_err());
    }

    #[test]
    fn chunk_header_round_trip() {
        let mut bytes = Vec::new();
        bytes.push(71 | crate::pipeline::FINAL_BIT);
        bytes.extend_from_slice(&1000u32.to_le_bytes()[..3]);
        bytes.push(0xAA);
        let (processing_type, is_final, size, rest) = read_chunk_header(&bytes).unwrap();
        assert_eq!(processing_type, 71);
        assert!(is_final);
        assert_eq!(size, 1000);
        assert_eq!(rest, &[0xAA]);
    }
}
