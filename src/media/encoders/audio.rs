// SPDX-License-Identifier: GPL-3.0-only

//! Audio encoder selection with quality configuration
//!
//! Opus is preferred; AAC is the fallback where the container accepts it.

use super::video::ContainerFormat;
use gstreamer as gst;
use gstreamer::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Audio codec types in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// Opus codec (preferred)
    Opus,
    /// AAC codec (fallback, MP4 only)
    AAC,
}

impl AudioCodec {
    /// Whether the container can carry this codec
    pub fn fits(&self, container: ContainerFormat) -> bool {
        match (self, container) {
            (AudioCodec::Opus, _) => true,
            (AudioCodec::AAC, ContainerFormat::MP4) => true,
            (AudioCodec::AAC, ContainerFormat::WebM) => false,
        }
    }
}

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioChannels {
    Mono,
    Stereo,
    MultiChannel(u32),
}

impl AudioChannels {
    /// Get number of channels
    pub fn count(&self) -> u32 {
        match self {
            AudioChannels::Mono => 1,
            AudioChannels::Stereo => 2,
            AudioChannels::MultiChannel(n) => *n,
        }
    }

    /// Create from channel count
    pub fn from_count(count: u32) -> Self {
        match count {
            1 => AudioChannels::Mono,
            2 => AudioChannels::Stereo,
            n => AudioChannels::MultiChannel(n),
        }
    }
}

/// Audio quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioQuality {
    /// 64 kbps
    Low,
    /// 96 kbps
    Medium,
    /// 128 kbps
    #[default]
    High,
    /// 192 kbps
    Maximum,
}

impl AudioQuality {
    /// Get bitrate in bits per second
    pub fn bitrate_bps(&self) -> i32 {
        match self {
            AudioQuality::Low => 64_000,
            AudioQuality::Medium => 96_000,
            AudioQuality::High => 128_000,
            AudioQuality::Maximum => 192_000,
        }
    }
}

/// Selected audio encoder with configuration
pub struct SelectedAudioEncoder {
    /// The encoder element
    pub encoder: gst::Element,
    /// Codec being used
    pub codec: AudioCodec,
}

/// Select the best available audio encoder the container can carry
pub fn select_audio_encoder(
    quality: AudioQuality,
    channels: AudioChannels,
    container: ContainerFormat,
) -> Result<SelectedAudioEncoder, String> {
    gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

    if let Ok(encoder) = gst::ElementFactory::make("opusenc").build() {
        info!(
            codec = "Opus",
            channels = channels.count(),
            "Selected audio encoder"
        );
        configure_opus_encoder(&encoder, quality, channels);
        return Ok(SelectedAudioEncoder {
            encoder,
            codec: AudioCodec::Opus,
        });
    }

    if AudioCodec::AAC.fits(container) {
        for encoder_name in ["avenc_aac", "fdkaacenc", "voaacenc"] {
            if let Ok(encoder) = gst::ElementFactory::make(encoder_name).build() {
                info!(
                    codec = "AAC",
                    encoder = %encoder_name,
                    channels = channels.count(),
                    "Selected audio encoder"
                );
                if encoder.has_property("bitrate") {
                    encoder.set_property("bitrate", quality.bitrate_bps());
                }
                debug!("Configured {}: bitrate={} bps", encoder_name, quality.bitrate_bps());
                return Ok(SelectedAudioEncoder {
                    encoder,
                    codec: AudioCodec::AAC,
                });
            }
        }
    }

    Err(format!(
        "No audio encoder available for {} output. Please install gstreamer1-plugins-base (opusenc)",
        container.extension()
    ))
}

/// Configure Opus encoder
fn configure_opus_encoder(encoder: &gst::Element, quality: AudioQuality, channels: AudioChannels) {
    let bitrate = quality.bitrate_bps();
    encoder.set_property("bitrate", bitrate);

    // Voice tuning for mono, generic otherwise
    let audio_type = match channels {
        AudioChannels::Mono => "voice",
        AudioChannels::Stereo | AudioChannels::MultiChannel(_) => "generic",
    };
    if encoder.has_property("audio-type") {
        encoder.set_property_from_str("audio-type", audio_type);
    }

    debug!(
        "Configured opusenc: bitrate={} bps, audio-type={}",
        bitrate, audio_type
    );
}
