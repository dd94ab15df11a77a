// SPDX-License-Identifier: GPL-3.0-only

//! Camera Recorder - capture-to-file recording pipeline
//!
//! Timestamped video and audio samples go in; a container file with paused
//! intervals cut out of its timeline comes out.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`pipelines`]: recording controller, media writer, frame processor, thumbnails
//! - [`capture`]: GStreamer live source feeding the controller
//! - [`media`]: sample buffers, output geometry and encoder selection
//! - [`filters`] / [`shaders`]: colour effects on the CPU and on the GPU
//! - [`config`]: user configuration handling
//! - [`storage`]: destination checks and file naming
//!
//! # Example
//!
//! ```ignore
//! use camera_recorder::{RecorderConfig, VideoRecorder};
//!
//! let recorder = VideoRecorder::with_defaults(RecorderConfig::default());
//! recorder.start_video_capture()?;
//! // ... append_video_sample / append_audio_sample from capture threads ...
//! let outcome = recorder.end_video_capture()?.wait();
//! ```

pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod filters;
pub mod gpu;
pub mod media;
pub mod pipelines;
pub mod shaders;
pub mod storage;

// Re-export commonly used types
pub use config::RecorderConfig;
pub use constants::BitratePreset;
pub use errors::{AppError, AppResult, RecorderError, ThumbnailError, WriterError};
pub use filters::FilterType;
pub use media::{AudioChunk, AudioSample, MediaType, SampleTiming, VideoFrame, VideoSample};
pub use pipelines::video::{
    CaptureCompletion, CaptureOutcome, PhotoResult, RecorderDelegate, RecorderState,
    VideoRecorder, VideoResult,
};
