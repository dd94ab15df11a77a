// SPDX-License-Identifier: GPL-3.0-only

//! Video recording pipeline
//!
//! - [`recorder`]: lifecycle state machine and sample routing
//! - [`session`]: per-session bookkeeping and the pause offset ledger
//! - [`writer`]: timestamp-ordered media writer over a container sink
//! - [`muxer`]: GStreamer container sink (`appsrc` → encoder → muxer → `filesink`)
//! - [`encoder_selection`]: encoder choice for a session's track settings
//! - [`processor`]: per-frame filter stage
//! - [`thumbnail`]: stills from live frames or a finished file
//! - [`photo`]: JPEG stills grabbed while recording
//! - [`delegate`]: observer hooks

pub mod delegate;
pub mod encoder_selection;
pub mod muxer;
pub mod photo;
pub mod processor;
pub mod recorder;
pub mod session;
pub mod thumbnail;
pub mod writer;

pub use delegate::{DropReason, NoopDelegate, RecorderDelegate, VideoResult};
pub use encoder_selection::{EncoderConfig, SelectedEncoders, select_encoders};
pub use muxer::{GstContainerSink, GstSinkFactory};
pub use photo::{PhotoMetadata, PhotoResult};
pub use processor::{FrameProcessor, FrameTransform, ProcessorBackend};
pub use recorder::{CaptureCompletion, CaptureOutcome, Clock, SystemClock, VideoRecorder};
pub use session::{OffsetLedger, RecorderState, RecordingSession};
pub use thumbnail::{Thumbnail, ThumbnailExtractor, extract_thumbnail_from_file};
pub use writer::{
    AudioTrackSettings, ContainerSink, MediaWriter, SinkFactory, TrackSettings,
    VideoTrackSettings, WriterSummary,
};

// Re-export encoder types for convenience
pub use crate::media::encoders::{AudioChannels, AudioQuality};
