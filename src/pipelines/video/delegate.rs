// SPDX-License-Identifier: GPL-3.0-only

//! Observer interface for recording sessions

use super::photo::PhotoResult;
use super::thumbnail::Thumbnail;
use crate::errors::RecorderError;
use crate::media::{AudioSample, MediaType, VideoFrame, VideoSample};
use std::path::PathBuf;

/// Why a delivered sample was not written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Session is not in the recording state (idle, starting, paused, ending)
    NotRecording,
    /// Writer track not configured or not warmed up
    NotReady,
    /// Timestamp does not advance past the last written sample
    OutOfOrder,
    /// Writer queue full
    Backpressure,
    /// Sample lies past the maximum capture duration
    BeyondMaximumDuration,
    /// Frame geometry or payload is unusable
    InvalidSample,
    /// The writer failed; the session is ending
    WriteFailed,
}

/// Payload delivered when a recording completes
#[derive(Debug, Clone)]
pub struct VideoResult {
    /// Container file on disk
    pub path: PathBuf,
    /// First-frame thumbnail, when thumbnails are enabled
    pub thumbnail: Option<Thumbnail>,
    /// Thumbnails sampled at the configured interval
    pub thumbnails: Vec<Thumbnail>,
    /// Highest video timestamp written, in seconds
    pub captured_duration_secs: f64,
    /// Highest audio timestamp written, in seconds
    pub captured_audio_secs: f64,
}

/// Callbacks from a [`VideoRecorder`](super::VideoRecorder)
///
/// Every method has a default, so implementors override only what they need.
/// Lifecycle callbacks run after the recorder has released its internal lock
/// and may call back into the recorder. The exception is
/// [`will_render_and_write_pixel_buffer`](Self::will_render_and_write_pixel_buffer),
/// which runs in the middle of a frame delivery and must not.
pub trait RecorderDelegate: Send + Sync {
    fn will_start_video_capture(&self) {}

    /// Chance to rename a generated file; returns the name to use
    fn will_start_video_capture_to_file(&self, file_name: &str) -> String {
        file_name.to_string()
    }

    fn did_start_video_capture(&self) {}

    fn did_pause_video_capture(&self) {}

    fn did_resume_video_capture(&self) {}

    fn did_end_video_capture(&self) {}

    /// Completion of a session
    ///
    /// Success carries a result and no error. Failure carries the error and a
    /// partial result when anything was written. Cancellation carries neither.
    fn captured_video(&self, _result: Option<&VideoResult>, _error: Option<&RecorderError>) {}

    /// A processed video sample was written (timing is the output timeline)
    fn did_capture_video_sample(&self, _sample: &VideoSample) {}

    /// An audio sample was written (timing is the output timeline)
    fn did_capture_audio_sample(&self, _sample: &AudioSample) {}

    fn did_drop_sample(&self, _media: MediaType, _reason: DropReason) {}

    /// A still is about to be taken from the recording
    fn will_capture_photo(&self) {}

    /// Outcome of a still request; exactly one of the two is set
    fn captured_photo(&self, _photo: Option<&PhotoResult>, _error: Option<&RecorderError>) {}

    /// Last stage before a frame is written; may substitute its own frame
    fn will_render_and_write_pixel_buffer(&self, frame: VideoFrame) -> VideoFrame {
        frame
    }
}

/// Delegate that ignores every callback
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl RecorderDelegate for NoopDelegate {}
