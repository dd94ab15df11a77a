// SPDX-License-Identifier: GPL-3.0-only

//! Media writer: per-track configuration, ordering and finalize
//!
//! The writer owns a [`ContainerSink`] and enforces the track contract in
//! front of it:
//! - a track must be configured before its first sample
//! - configuration is frozen once the first sample was written
//! - timestamps are strictly increasing per track
//! - nothing is accepted after finalize, and finalize runs once
//!
//! Timestamps handed to the sink are relative to the first video sample.

use crate::config::RecorderConfig;
use crate::errors::WriterError;
use crate::media::{AudioChunk, CropRect, MediaType, SampleTiming, VideoFrame};
use crate::media::encoders::AudioQuality;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Video track configuration, fixed by the first frame of a session
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTrackSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// Average bit rate in bits per second
    pub bit_rate: u32,
    /// Region kept from each frame
    pub crop: CropRect,
    /// Forwarded verbatim to the encoder
    pub compression_properties: BTreeMap<String, String>,
    /// Forwarded verbatim to the container muxer
    pub container_properties: BTreeMap<String, String>,
    /// Specific encoder element, if forced
    pub encoder: Option<String>,
}

impl VideoTrackSettings {
    /// Settings for frames of `width`x`height` under `config`
    pub fn from_config(config: &RecorderConfig, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_rate: config.video_frame_rate,
            bit_rate: config.video_bit_rate_for(width),
            crop: config.output_format.crop_rect(width, height),
            compression_properties: config.additional_compression_properties.clone(),
            container_properties: config.additional_video_properties.clone(),
            encoder: config.video_encoder.clone(),
        }
    }

    fn validate(&self) -> Result<(), WriterError> {
        if self.width == 0 || self.height == 0 {
            return Err(WriterError::InvalidSettings(format!(
                "video size {}x{}",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 || self.bit_rate == 0 {
            return Err(WriterError::InvalidSettings(
                "frame rate and bit rate must be positive".to_string(),
            ));
        }
        let crop = &self.crop;
        if crop.width == 0
            || crop.height == 0
            || crop.x + crop.width > self.width
            || crop.y + crop.height > self.height
        {
            return Err(WriterError::InvalidSettings(format!(
                "crop {:?} outside {}x{}",
                crop, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Audio track configuration, fixed by the first audio chunk of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrackSettings {
    pub sample_rate: u32,
    pub channels: u32,
    pub quality: AudioQuality,
}

impl AudioTrackSettings {
    fn validate(&self) -> Result<(), WriterError> {
        if self.sample_rate == 0 {
            return Err(WriterError::InvalidSettings(
                "audio sample rate must be positive".to_string(),
            ));
        }
        if !(1..=8).contains(&self.channels) {
            return Err(WriterError::InvalidSettings(format!(
                "{} audio channels",
                self.channels
            )));
        }
        Ok(())
    }
}

/// Configuration for one track
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSettings {
    Video(VideoTrackSettings),
    Audio(AudioTrackSettings),
}

/// Container backend driven by a [`MediaWriter`]
///
/// Timings are relative to the start of the file and strictly increasing
/// per track. Pushes must not block on the encoder.
pub trait ContainerSink: Send {
    /// Build the container; called once, before the first push
    fn open(
        &mut self,
        video: &VideoTrackSettings,
        audio: Option<&AudioTrackSettings>,
    ) -> Result<(), WriterError>;

    /// Whether another sample for `media` can be taken without queueing past the limit
    fn ready_for(&self, _media: MediaType) -> bool {
        true
    }

    fn push_video(&mut self, frame: &VideoFrame, timing: SampleTiming) -> Result<(), WriterError>;

    fn push_audio(&mut self, chunk: &AudioChunk, timing: SampleTiming) -> Result<(), WriterError>;

    /// Flush and seal the container, waiting at most `timeout`
    fn finish(&mut self, timeout: Duration) -> Result<(), WriterError>;

    /// Tear down without sealing
    fn abort(&mut self);
}

/// Creates a sink per recording session
pub trait SinkFactory: Send + Sync {
    /// Extension of the container this factory will produce
    fn file_extension(&self, config: &RecorderConfig) -> String;

    fn create(
        &self,
        path: &Path,
        config: &RecorderConfig,
    ) -> Result<Box<dyn ContainerSink>, WriterError>;
}

/// What a finalized writer produced
#[derive(Debug, Clone, PartialEq)]
pub struct WriterSummary {
    pub path: PathBuf,
    /// Highest video timestamp written
    pub video_seconds: f64,
    /// Highest audio timestamp written
    pub audio_seconds: f64,
    pub video_samples: u64,
    pub audio_samples: u64,
}

#[derive(Debug)]
struct Track<S> {
    settings: Option<S>,
    last_written: Option<Duration>,
    samples: u64,
}

impl<S> Default for Track<S> {
    fn default() -> Self {
        Self {
            settings: None,
            last_written: None,
            samples: 0,
        }
    }
}

impl<S> Track<S> {
    fn check_order(&self, track: &'static str, pts: Duration) -> Result<(), WriterError> {
        match self.last_written {
            Some(last) if pts <= last => Err(WriterError::OutOfOrder {
                track,
                last_ns: last.as_nanos(),
                got_ns: pts.as_nanos(),
            }),
            _ => Ok(()),
        }
    }

    fn accept(&mut self, pts: Duration) {
        self.last_written = Some(pts);
        self.samples += 1;
    }

    fn seconds(&self) -> f64 {
        self.last_written.map_or(0.0, |t| t.as_secs_f64())
    }
}

/// Writes one container file for one session
pub struct MediaWriter {
    path: PathBuf,
    sink: Box<dyn ContainerSink>,
    audio_expected: bool,
    video: Track<VideoTrackSettings>,
    audio: Track<AudioTrackSettings>,
    /// Input pts of the first video sample; zero of the file timeline
    session_start: Option<Duration>,
    finalized: bool,
}

impl MediaWriter {
    pub fn new(path: PathBuf, sink: Box<dyn ContainerSink>, audio_expected: bool) -> Self {
        Self {
            path,
            sink,
            audio_expected,
            video: Track::default(),
            audio: Track::default(),
            session_start: None,
            finalized: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configure a track; allowed repeatedly until the first sample is written
    pub fn configure(&mut self, settings: TrackSettings) -> Result<(), WriterError> {
        if self.finalized {
            return Err(WriterError::Finalized);
        }
        if self.session_start.is_some() {
            return Err(WriterError::AlreadyStarted);
        }

        match settings {
            TrackSettings::Video(video) => {
                video.validate()?;
                debug!(
                    width = video.width,
                    height = video.height,
                    bit_rate = video.bit_rate,
                    "Configured video track"
                );
                self.video.settings = Some(video);
            }
            TrackSettings::Audio(audio) => {
                if !self.audio_expected {
                    return Err(WriterError::InvalidSettings(
                        "audio track configured while audio capture is disabled".to_string(),
                    ));
                }
                audio.validate()?;
                debug!(
                    sample_rate = audio.sample_rate,
                    channels = audio.channels,
                    "Configured audio track"
                );
                self.audio.settings = Some(audio);
            }
        }
        Ok(())
    }

    /// Whether the video track can take a sample now
    pub fn video_ready(&self) -> bool {
        !self.finalized
            && self.video.settings.is_some()
            && (!self.audio_expected || self.audio.settings.is_some())
            && self.sink.ready_for(MediaType::Video)
    }

    /// Whether the audio track can take a sample now
    pub fn audio_ready(&self) -> bool {
        !self.finalized
            && self.audio.settings.is_some()
            && self.session_start.is_some()
            && self.sink.ready_for(MediaType::Audio)
    }

    /// Whether every required track is configured
    pub fn is_configured(&self) -> bool {
        self.video.settings.is_some() && (!self.audio_expected || self.audio.settings.is_some())
    }

    pub fn video_configured(&self) -> bool {
        self.video.settings.is_some()
    }

    pub fn audio_configured(&self) -> bool {
        self.audio.settings.is_some()
    }

    /// Where a sample at `pts` would land in the file
    ///
    /// Before the first video sample everything lands at zero; `None` means
    /// the sample precedes the start of the file.
    pub fn position_of(&self, pts: Duration) -> Option<Duration> {
        match self.session_start {
            Some(start) => pts.checked_sub(start),
            None => Some(Duration::ZERO),
        }
    }

    /// Highest video timestamp written, relative to the start of the file
    pub fn video_timestamp(&self) -> Duration {
        self.video.last_written.unwrap_or_default()
    }

    /// Highest audio timestamp written, relative to the start of the file
    pub fn audio_timestamp(&self) -> Duration {
        self.audio.last_written.unwrap_or_default()
    }

    /// Write a video frame; returns the timing used in the file
    pub fn write_video(
        &mut self,
        frame: &VideoFrame,
        timing: SampleTiming,
    ) -> Result<SampleTiming, WriterError> {
        if self.finalized {
            return Err(WriterError::Finalized);
        }
        let Some(settings) = self.video.settings.as_ref() else {
            return Err(WriterError::TrackNotReady("video"));
        };
        if self.audio_expected && self.audio.settings.is_none() {
            return Err(WriterError::TrackNotReady("audio"));
        }
        if frame.width != settings.width || frame.height != settings.height {
            return Err(WriterError::InvalidSettings(format!(
                "frame {}x{} does not match track {}x{}",
                frame.width, frame.height, settings.width, settings.height
            )));
        }
        frame.validate().map_err(WriterError::InvalidSettings)?;

        let start = self.session_start.unwrap_or(timing.pts);
        let relative = timing
            .offset_by(start)
            .ok_or(WriterError::TrackNotReady("video"))?;
        self.video.check_order("video", relative.pts)?;

        if !self.sink.ready_for(MediaType::Video) {
            return Err(WriterError::Backpressure("video"));
        }

        if self.session_start.is_none() {
            let video = settings.clone();
            let audio = self.audio.settings;
            self.sink.open(&video, audio.as_ref())?;
            self.session_start = Some(start);
            info!(
                path = %self.path.display(),
                width = video.width,
                height = video.height,
                audio = audio.is_some(),
                "Container opened"
            );
        }

        self.sink.push_video(frame, relative)?;
        self.video.accept(relative.pts);
        Ok(relative)
    }

    /// Write an audio chunk; returns the timing used in the file
    pub fn write_audio(
        &mut self,
        chunk: &AudioChunk,
        timing: SampleTiming,
    ) -> Result<SampleTiming, WriterError> {
        if self.finalized {
            return Err(WriterError::Finalized);
        }
        let Some(settings) = self.audio.settings.as_ref() else {
            return Err(WriterError::TrackNotReady("audio"));
        };
        let Some(start) = self.session_start else {
            return Err(WriterError::TrackNotReady("audio"));
        };
        if chunk.sample_rate != settings.sample_rate || chunk.channels != settings.channels {
            return Err(WriterError::InvalidSettings(format!(
                "audio {} Hz x{} does not match track {} Hz x{}",
                chunk.sample_rate, chunk.channels, settings.sample_rate, settings.channels
            )));
        }

        // Audio captured before the first video frame has no place in the file
        let relative = timing
            .offset_by(start)
            .ok_or(WriterError::TrackNotReady("audio"))?;
        self.audio.check_order("audio", relative.pts)?;

        if !self.sink.ready_for(MediaType::Audio) {
            return Err(WriterError::Backpressure("audio"));
        }

        self.sink.push_audio(chunk, relative)?;
        self.audio.accept(relative.pts);
        Ok(relative)
    }

    /// Seal the container
    ///
    /// A writer that never received a video sample removes its file and
    /// returns [`WriterError::Empty`].
    pub fn finalize(&mut self, timeout: Duration) -> Result<WriterSummary, WriterError> {
        if self.finalized {
            return Err(WriterError::AlreadyFinalized);
        }
        self.finalized = true;

        if self.session_start.is_none() || self.video.samples == 0 {
            warn!(path = %self.path.display(), "Finalize with no samples written");
            self.sink.abort();
            remove_output(&self.path);
            return Err(WriterError::Empty);
        }

        self.sink.finish(timeout)?;

        let summary = self.summary();
        info!(
            path = %self.path.display(),
            video_seconds = summary.video_seconds,
            audio_seconds = summary.audio_seconds,
            video_samples = summary.video_samples,
            audio_samples = summary.audio_samples,
            "Container finalized"
        );
        Ok(summary)
    }

    /// Finalize on a background thread and report through `on_complete`, exactly once
    pub fn finalize_with<F>(mut self, timeout: Duration, on_complete: F) -> std::io::Result<()>
    where
        F: FnOnce(Result<WriterSummary, WriterError>) + Send + 'static,
    {
        std::thread::Builder::new()
            .name("recorder-finalize".to_string())
            .spawn(move || {
                let result = self.finalize(timeout);
                on_complete(result);
            })
            .map(|_| ())
    }

    /// Tear down without sealing and remove whatever was written
    pub fn abort(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.sink.abort();
        remove_output(&self.path);
        debug!(path = %self.path.display(), "Writer aborted");
    }

    /// Counters so far
    pub fn summary(&self) -> WriterSummary {
        WriterSummary {
            path: self.path.clone(),
            video_seconds: self.video.seconds(),
            audio_seconds: self.audio.seconds(),
            video_samples: self.video.samples,
            audio_samples: self.audio.samples,
        }
    }
}

/// Remove a partial output file, ignoring a file that was never created
pub(crate) fn remove_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
