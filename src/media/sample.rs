// SPDX-License-Identifier: GPL-3.0-only

//! Timestamped media samples flowing from capture into the writer

use gstreamer::buffer::{MappedBuffer, Readable};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Frame data storage that supports both owned bytes and zero-copy
/// GStreamer buffers
///
/// The `Mapped` variant keeps the GStreamer buffer mapped and alive until all
/// references are dropped.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (processed frames, tests)
    Copied(Arc<[u8]>),
    /// Mapped GStreamer buffer straight from an appsink
    Mapped(Arc<MappedBuffer<Readable>>),
}

impl FrameData {
    /// Create FrameData from a mapped GStreamer buffer (zero-copy)
    pub fn from_mapped_buffer(buffer: MappedBuffer<Readable>) -> Self {
        FrameData::Mapped(Arc::new(buffer))
    }

    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData::Copied(data.into())
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            FrameData::Mapped(buf) => write!(f, "FrameData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

/// One RGBA video image
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: FrameData,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, at least `width * 4`
    pub stride: u32,
}

impl VideoFrame {
    /// Tightly packed RGBA frame
    pub fn new(data: impl Into<FrameData>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride: width.saturating_mul(4),
        }
    }

    /// Frame whose rows carry padding
    pub fn with_stride(data: impl Into<FrameData>, width: u32, height: u32, stride: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride,
        }
    }

    /// Solid colour frame, handy for tests and test patterns
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(rgba.repeat(width as usize * height as usize), width, height)
    }

    /// Bytes in one unpadded row; `None` when that does not fit a `u32`
    pub fn row_bytes(&self) -> Option<u32> {
        self.width.checked_mul(4)
    }

    /// Check that the buffer holds every row the geometry promises
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("Invalid frame size {}x{}", self.width, self.height));
        }
        let row = self
            .row_bytes()
            .ok_or_else(|| format!("Frame width {} too large", self.width))?;
        if self.stride < row {
            return Err(format!(
                "Stride {} shorter than row of {} pixels",
                self.stride, self.width
            ));
        }
        let required = (self.stride as usize)
            .checked_mul(self.height as usize - 1)
            .and_then(|rows| rows.checked_add(row as usize))
            .ok_or_else(|| format!("Frame {}x{} too large", self.width, self.height))?;
        if self.data.len() < required {
            return Err(format!(
                "Frame data {} bytes, expected at least {}",
                self.data.len(),
                required
            ));
        }
        Ok(())
    }

    /// RGBA bytes without row padding
    pub fn packed_rgba(&self) -> Cow<'_, [u8]> {
        let row = self.width as usize * 4;
        if self.stride as usize == row {
            return Cow::Borrowed(&self.data[..row * self.height as usize]);
        }
        let mut packed = Vec::with_capacity(row * self.height as usize);
        for chunk in self
            .data
            .chunks(self.stride as usize)
            .take(self.height as usize)
        {
            packed.extend_from_slice(&chunk[..row]);
        }
        Cow::Owned(packed)
    }

    /// Copy into an `image` buffer
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        self.validate().ok()?;
        image::RgbaImage::from_raw(self.width, self.height, self.packed_rgba().into_owned())
    }
}

/// Interleaved signed 16-bit little-endian PCM
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Arc<[u8]>,
    pub sample_rate: u32,
    pub channels: u32,
}

impl AudioChunk {
    pub fn new(data: impl Into<Arc<[u8]>>, sample_rate: u32, channels: u32) -> Self {
        Self {
            data: data.into(),
            sample_rate,
            channels,
        }
    }

    /// Silence lasting `duration`
    pub fn silence(duration: Duration, sample_rate: u32, channels: u32) -> Self {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(vec![0u8; frames * channels as usize * 2], sample_rate, channels)
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.data.len() / (2 * self.channels as usize)
    }

    /// Playback length implied by the sample count
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.frames() as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

/// Presentation timestamp and duration of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SampleTiming {
    pub pts: Duration,
    pub duration: Duration,
}

impl SampleTiming {
    pub fn new(pts: Duration, duration: Duration) -> Self {
        Self { pts, duration }
    }

    /// Timing from seconds, for tests and scripted sources
    pub fn from_secs_f64(pts: f64, duration: f64) -> Self {
        Self::new(
            Duration::from_secs_f64(pts.max(0.0)),
            Duration::from_secs_f64(duration.max(0.0)),
        )
    }

    /// End of the sample (`pts + duration`)
    pub fn end(&self) -> Duration {
        self.pts + self.duration
    }

    /// Same sample shifted earlier by `offset`; `None` if it would precede zero
    pub fn offset_by(&self, offset: Duration) -> Option<Self> {
        Some(Self {
            pts: self.pts.checked_sub(offset)?,
            duration: self.duration,
        })
    }
}

/// Track a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Video frame with its timing
#[derive(Debug, Clone)]
pub struct VideoSample {
    pub frame: VideoFrame,
    pub timing: SampleTiming,
}

impl VideoSample {
    pub fn new(frame: VideoFrame, timing: SampleTiming) -> Self {
        Self { frame, timing }
    }
}

/// Audio chunk with its timing
#[derive(Debug, Clone)]
pub struct AudioSample {
    pub chunk: AudioChunk,
    pub timing: SampleTiming,
}

impl AudioSample {
    pub fn new(chunk: AudioChunk, timing: SampleTiming) -> Self {
        Self { chunk, timing }
    }
}
