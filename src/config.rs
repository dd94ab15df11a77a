// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{BitratePreset, recording, thumbnail, timing};
use crate::errors::{AppError, AppResult};
use crate::filters::FilterType;
use crate::media::encoders::AudioQuality;
use crate::media::format::OutputFormat;
use crate::pipelines::video::ProcessorBackend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user's config directory
const CONFIG_DIR_NAME: &str = "camera-recorder";

/// Config file name inside [`CONFIG_DIR_NAME`]
const CONFIG_FILE_NAME: &str = "config.json";

/// Recorder configuration
///
/// Every field has a default so partially written files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory used for generated file names
    pub capture_directory: PathBuf,
    /// Aspect preset applied as a centre crop
    pub output_format: OutputFormat,
    /// Bitrate preset used when `video_bit_rate` is unset
    pub bitrate_preset: BitratePreset,
    /// Explicit average video bit rate in bits per second
    pub video_bit_rate: Option<u32>,
    /// Nominal capture frame rate
    pub video_frame_rate: u32,
    /// Soft cap on recorded duration in seconds
    pub maximum_capture_duration_secs: Option<f64>,
    /// Whether the session waits for and writes an audio track
    pub audio_capture_enabled: bool,
    /// Whether thumbnails are produced for the result payload
    pub thumbnail_enabled: bool,
    /// Effect applied by the frame processor
    pub filter: FilterType,
    /// Where the effect runs
    pub processor_backend: ProcessorBackend,
    /// Permit replacing an existing destination file
    pub overwrite_existing: bool,
    /// Start fails with `CaptureFailed` below this much free space
    pub minimum_free_disk_bytes: u64,
    /// Audio encoder preset
    pub audio_quality: AudioQuality,
    /// Force a specific GStreamer video encoder element
    pub video_encoder: Option<String>,
    /// Forwarded verbatim to the video encoder element
    pub additional_compression_properties: BTreeMap<String, String>,
    /// Forwarded verbatim to the container muxer element
    pub additional_video_properties: BTreeMap<String, String>,
    /// How long finalize waits for end-of-stream
    pub finalize_timeout_secs: u64,
    /// Side-buffer thumbnail sampling interval
    pub thumbnail_interval_secs: f64,
    /// Maximum number of side-buffer thumbnails kept per session
    pub thumbnail_history_limit: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture_directory: default_capture_directory(),
            output_format: OutputFormat::default(),
            bitrate_preset: BitratePreset::default(),
            video_bit_rate: None,
            video_frame_rate: recording::DEFAULT_FRAME_RATE,
            maximum_capture_duration_secs: None,
            audio_capture_enabled: true,
            thumbnail_enabled: true,
            filter: FilterType::default(),
            processor_backend: ProcessorBackend::default(),
            overwrite_existing: false,
            minimum_free_disk_bytes: recording::MINIMUM_FREE_DISK_BYTES,
            audio_quality: AudioQuality::High,
            video_encoder: None,
            additional_compression_properties: BTreeMap::new(),
            additional_video_properties: BTreeMap::new(),
            finalize_timeout_secs: timing::FINALIZE_TIMEOUT_SECS,
            thumbnail_interval_secs: thumbnail::DEFAULT_INTERVAL_SECS,
            thumbnail_history_limit: thumbnail::DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl RecorderConfig {
    /// Default location of the config file, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_default() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;

        info!(path = %path.display(), "Loaded recorder config");
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Saved recorder config");
        Ok(())
    }

    /// Reject values the pipeline cannot honour
    pub fn validate(&self) -> AppResult<()> {
        if self.video_frame_rate == 0 {
            return Err(AppError::Config("video_frame_rate must be positive".into()));
        }
        if self.video_bit_rate == Some(0) {
            return Err(AppError::Config("video_bit_rate must be positive".into()));
        }
        if let Some(max) = self.maximum_capture_duration_secs
            && !(max.is_finite() && max > 0.0)
        {
            return Err(AppError::Config(
                "maximum_capture_duration_secs must be a positive number".into(),
            ));
        }
        if !(self.thumbnail_interval_secs.is_finite() && self.thumbnail_interval_secs > 0.0) {
            return Err(AppError::Config(
                "thumbnail_interval_secs must be a positive number".into(),
            ));
        }
        Ok(())
    }

    /// Average video bit rate in bits per second for a frame width
    pub fn video_bit_rate_for(&self, width: u32) -> u32 {
        self.video_bit_rate
            .unwrap_or_else(|| self.bitrate_preset.bitrate_kbps(width) * 1000)
    }

    /// Soft duration cap as a `Duration`
    pub fn maximum_capture_duration(&self) -> Option<Duration> {
        self.maximum_capture_duration_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Side-buffer sampling interval as a `Duration`
    pub fn thumbnail_interval(&self) -> Duration {
        Duration::from_secs_f64(self.thumbnail_interval_secs.max(0.001))
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_secs)
    }
}

fn default_capture_directory() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(recording::DEFAULT_SUBDIRECTORY)
}
