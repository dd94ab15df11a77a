// SPDX-License-Identifier: GPL-3.0-only

//! Media types and encoder plumbing
//!
//! - [`sample`]: timestamped video/audio samples handed to the recorder
//! - [`format`]: output aspect presets and crop geometry
//! - [`encoders`]: video/audio encoder selection and configuration

pub mod encoders;
pub mod format;
pub mod sample;

pub use format::{CropRect, OutputFormat};
pub use sample::{
    AudioChunk, AudioSample, FrameData, MediaType, SampleTiming, VideoFrame, VideoSample,
};
