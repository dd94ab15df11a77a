// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the recording pipeline
//!
//! [`RecorderError`] is the taxonomy reported to callers and delegates.
//! [`WriterError`] stays internal to the media writer and is classified into
//! the recorder taxonomy when it escapes a session.

use crate::pipelines::video::RecorderState;
use std::fmt;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Top-level error used by the command-line front end and configuration
#[derive(Debug, Clone)]
pub enum AppError {
    /// Recording lifecycle errors
    Recorder(RecorderError),
    /// Media writer errors
    Writer(WriterError),
    /// Thumbnail extraction errors
    Thumbnail(ThumbnailError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Recording errors with stable numeric codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// Fallback for failures that fit no other category
    Unknown(String),
    /// User-initiated abort; not a failure
    Cancelled,
    /// The capture session itself broke
    SessionFailed(String),
    /// Destination unwritable or settings malformed
    BadOutputFile(String),
    /// Destination already exists and overwriting is not permitted
    OutputFileExists(PathBuf),
    /// Writer or encoder failure while recording
    CaptureFailed(String),
    /// Lifecycle call made in a state that cannot accept it
    Busy(RecorderState),
}

impl RecorderError {
    /// Numeric error code
    pub fn code(&self) -> i32 {
        match self {
            RecorderError::Unknown(_) => -1,
            RecorderError::Cancelled => 100,
            RecorderError::SessionFailed(_) => 101,
            RecorderError::BadOutputFile(_) => 102,
            RecorderError::OutputFileExists(_) => 103,
            RecorderError::CaptureFailed(_) => 104,
            RecorderError::Busy(_) => 105,
        }
    }

    /// Whether this error represents a user cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RecorderError::Cancelled)
    }
}

/// Media writer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    /// Track has not been configured (or is not warmed up yet)
    TrackNotReady(&'static str),
    /// Sample timestamp does not advance past the last accepted one
    OutOfOrder {
        track: &'static str,
        last_ns: u128,
        got_ns: u128,
    },
    /// Configuration attempted after samples were written
    AlreadyStarted,
    /// Track settings are invalid for the output format
    InvalidSettings(String),
    /// Write attempted after the container was finalized
    Finalized,
    /// Finalize requested twice
    AlreadyFinalized,
    /// Downstream queue is full; the sample was dropped
    Backpressure(&'static str),
    /// Underlying storage is out of space
    StorageFull(String),
    /// Container could not be created at the destination
    Io(String),
    /// Encoder or muxer failure
    Backend(String),
    /// Nothing was written before finalize
    Empty,
}

impl WriterError {
    /// Fatal errors end the session; the rest drop a single sample
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WriterError::StorageFull(_)
                | WriterError::Io(_)
                | WriterError::Backend(_)
                | WriterError::InvalidSettings(_)
        )
    }
}

impl From<WriterError> for RecorderError {
    fn from(err: WriterError) -> Self {
        match err {
            WriterError::InvalidSettings(msg) => RecorderError::BadOutputFile(msg),
            WriterError::Io(msg) => RecorderError::BadOutputFile(msg),
            WriterError::StorageFull(msg) => RecorderError::CaptureFailed(msg),
            WriterError::Backend(msg) => RecorderError::CaptureFailed(msg),
            WriterError::Empty => {
                RecorderError::CaptureFailed("no samples were written".to_string())
            }
            other => RecorderError::CaptureFailed(other.to_string()),
        }
    }
}

/// Thumbnail extraction errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailError {
    /// No frame could be produced for the request
    NoFrameAvailable,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Recorder(e) => write!(f, "Recording error: {}", e),
            AppError::Writer(e) => write!(f, "Writer error: {}", e),
            AppError::Thumbnail(e) => write!(f, "Thumbnail error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for RecorderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderError::Unknown(msg) => write!(f, "Unknown error: {}", msg),
            RecorderError::Cancelled => write!(f, "Capture cancelled"),
            RecorderError::SessionFailed(msg) => write!(f, "Capture session failed: {}", msg),
            RecorderError::BadOutputFile(msg) => write!(f, "Bad output file: {}", msg),
            RecorderError::OutputFileExists(path) => {
                write!(f, "Output file already exists: {}", path.display())
            }
            RecorderError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            RecorderError::Busy(state) => write!(f, "Recorder busy (state: {:?})", state),
        }
    }
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::TrackNotReady(track) => write!(f, "{} track not ready", track),
            WriterError::OutOfOrder {
                track,
                last_ns,
                got_ns,
            } => write!(
                f,
                "{} sample out of order ({} ns after {} ns)",
                track, got_ns, last_ns
            ),
            WriterError::AlreadyStarted => write!(f, "Writer already received samples"),
            WriterError::InvalidSettings(msg) => write!(f, "Invalid track settings: {}", msg),
            WriterError::Finalized => write!(f, "Writer already finalized"),
            WriterError::AlreadyFinalized => write!(f, "Finalize requested twice"),
            WriterError::Backpressure(track) => write!(f, "{} queue full, sample dropped", track),
            WriterError::StorageFull(msg) => write!(f, "Storage full: {}", msg),
            WriterError::Io(msg) => write!(f, "I/O error: {}", msg),
            WriterError::Backend(msg) => write!(f, "Encoder error: {}", msg),
            WriterError::Empty => write!(f, "No samples written"),
        }
    }
}

impl fmt::Display for ThumbnailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailError::NoFrameAvailable => write!(f, "No frame available"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for RecorderError {}
impl std::error::Error for WriterError {}
impl std::error::Error for ThumbnailError {}

impl From<RecorderError> for AppError {
    fn from(err: RecorderError) -> Self {
        AppError::Recorder(err)
    }
}

impl From<WriterError> for AppError {
    fn from(err: WriterError) -> Self {
        AppError::Writer(err)
    }
}

impl From<ThumbnailError> for AppError {
    fn from(err: ThumbnailError) -> Self {
        AppError::Thumbnail(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for WriterError {
    fn from(err: std::io::Error) -> Self {
        // ENOSPC surfaces as StorageFull so the recorder reports CaptureFailed
        if err.raw_os_error() == Some(libc::ENOSPC) {
            WriterError::StorageFull(err.to_string())
        } else {
            WriterError::Io(err.to_string())
        }
    }
}
