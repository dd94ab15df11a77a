// SPDX-License-Identifier: GPL-3.0-only

//! Recorder-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Video encoder bitrate presets
///
/// Used to derive a target bitrate from the frame size when no explicit
/// bit rate is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitratePreset {
    /// Low bitrate - smaller files, reduced quality
    Low,
    /// Medium bitrate - balanced quality and file size (default)
    #[default]
    Medium,
    /// High bitrate - larger files, better quality
    High,
}

impl BitratePreset {
    /// All preset variants, lowest first
    pub const ALL: [BitratePreset; 3] = [
        BitratePreset::Low,
        BitratePreset::Medium,
        BitratePreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            BitratePreset::Low => "Low",
            BitratePreset::Medium => "Medium",
            BitratePreset::High => "High",
        }
    }

    /// Get bitrate in kbps for a given frame width
    ///
    /// - SD (640x480): Low=1, Medium=2, High=4 Mbps
    /// - HD (1280x720): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD (1920x1080): Low=4, Medium=8, High=16 Mbps
    /// - 4K (3840x2160): Low=15, Medium=30, High=50 Mbps
    pub fn bitrate_kbps(&self, width: u32) -> u32 {
        let base = match ResolutionTier::from_width(width) {
            ResolutionTier::SD => 1_000,
            ResolutionTier::HD => 2_500,
            ResolutionTier::FullHD => 4_000,
            ResolutionTier::FourK => 15_000,
        };

        match self {
            BitratePreset::Low => base,
            BitratePreset::Medium => base * 2,
            // 4K high is capped at 50 Mbps
            BitratePreset::High => (base * 4).min(50_000),
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// 640x480 and below
    SD,
    /// 1280x720
    HD,
    /// 1920x1080
    FullHD,
    /// 3840x2160 and above
    FourK,
}

impl ResolutionTier {
    /// Tier for a given frame width
    pub fn from_width(width: u32) -> Self {
        match width {
            w if w >= 3840 => ResolutionTier::FourK,
            w if w >= 1920 => ResolutionTier::FullHD,
            w if w >= 1280 => ResolutionTier::HD,
            _ => ResolutionTier::SD,
        }
    }
}

/// Format bitrate for display (e.g., "8 Mbps" or "2.5 Mbps")
pub fn format_bitrate(kbps: u32) -> String {
    let mbps = kbps as f64 / 1000.0;
    if mbps == mbps.floor() {
        format!("{} Mbps", mbps as u32)
    } else {
        format!("{:.1} Mbps", mbps)
    }
}

/// Suggested average video bit rates in bits per second for common capture sizes
pub mod suggested_bitrate {
    pub const SIZE_480X360: u32 = 87_500 * 8;
    pub const SIZE_640X480: u32 = 437_500 * 8;
    pub const SIZE_1280X720: u32 = 1_312_500 * 8;
    pub const SIZE_1920X1080: u32 = 2_975_000 * 8;
    pub const SIZE_960X540: u32 = 3_750_000 * 8;
    pub const SIZE_1280X750: u32 = 5_000_000 * 8;

    /// Suggested bit rate for an exact capture size, if one is tabulated
    pub fn for_size(width: u32, height: u32) -> Option<u32> {
        match (width, height) {
            (480, 360) => Some(SIZE_480X360),
            (640, 480) => Some(SIZE_640X480),
            (1280, 720) => Some(SIZE_1280X720),
            (1920, 1080) => Some(SIZE_1920X1080),
            (960, 540) => Some(SIZE_960X540),
            (1280, 750) => Some(SIZE_1280X750),
            _ => None,
        }
    }
}

/// Recording session defaults
pub mod recording {
    /// Start refuses to begin below this much free space (~50 MB)
    pub const MINIMUM_FREE_DISK_BYTES: u64 = 49_999_872;

    /// Default nominal capture frame rate
    pub const DEFAULT_FRAME_RATE: u32 = 30;

    /// Prefix for generated file names
    pub const FILE_PREFIX: &str = "video";

    /// Subdirectory of the user's video directory used by default
    pub const DEFAULT_SUBDIRECTORY: &str = "Camera";
}

/// Thumbnail geometry and side-buffer limits
pub mod thumbnail {
    /// Thumbnail bounding box width
    pub const WIDTH: u32 = 160;

    /// Thumbnail bounding box height
    pub const HEIGHT: u32 = 120;

    /// Default side-buffer sampling interval in seconds
    pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

    /// Default side-buffer bound (ten minutes at one per second)
    pub const DEFAULT_HISTORY_LIMIT: usize = 600;

    /// JPEG quality of stills grabbed from a recording
    pub const PHOTO_JPEG_QUALITY: u8 = 92;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Raw video format handed to appsrc and pulled from appsink
    pub const VIDEO_FORMAT: &str = "RGBA";

    /// Raw audio format handed to appsrc and pulled from appsink
    pub const AUDIO_FORMAT: &str = "S16LE";

    /// Maximum bytes queued in each appsrc before samples are dropped
    pub const APPSRC_MAX_BYTES: u64 = 64 * 1024 * 1024;

    /// Maximum buffer queue size on capture appsinks
    pub const MAX_BUFFERS: u32 = 4;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Default wait for the container to reach end-of-stream
    pub const FINALIZE_TIMEOUT_SECS: u64 = 10;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Bus poll window used to surface asynchronous muxer errors per sample
    pub const BUS_POLL: Duration = Duration::ZERO;

    /// Progress print interval in the command-line recorder
    pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(250);
}

/// Build information
pub mod app_info {
    /// Version string baked in at build time
    pub fn version() -> &'static str {
        env!("RECORDER_BUILD_VERSION")
    }
}
