// SPDX-License-Identifier: GPL-3.0-only

//! Encoder selection for the recording container
//!
//! Turns track settings into concrete GStreamer encoder elements.

use super::writer::{AudioTrackSettings, VideoTrackSettings};
use crate::media::encoders::{
    audio::{AudioChannels, AudioQuality, SelectedAudioEncoder, select_audio_encoder},
    video::{SelectedVideoEncoder, choose_video_encoder, create_video_encoder},
};
use std::collections::BTreeMap;

/// Configuration for encoder selection
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// Encoder element to use when installed
    pub preferred_encoder: Option<String>,
    /// Video bitrate in kbps
    pub bitrate_kbps: u32,
    /// Extra encoder properties
    pub compression_properties: BTreeMap<String, String>,
    /// Audio quality preset
    pub audio_quality: AudioQuality,
    /// Audio channel configuration
    pub audio_channels: AudioChannels,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            preferred_encoder: None,
            bitrate_kbps: 8_000,
            compression_properties: BTreeMap::new(),
            audio_quality: AudioQuality::High,
            audio_channels: AudioChannels::Stereo,
        }
    }
}

impl EncoderConfig {
    /// Encoder configuration for a pair of configured tracks
    pub fn from_tracks(video: &VideoTrackSettings, audio: Option<&AudioTrackSettings>) -> Self {
        Self {
            preferred_encoder: video.encoder.clone(),
            bitrate_kbps: (video.bit_rate / 1000).max(1),
            compression_properties: video.compression_properties.clone(),
            audio_quality: audio.map(|a| a.quality).unwrap_or_default(),
            audio_channels: AudioChannels::from_count(audio.map_or(2, |a| a.channels)),
        }
    }
}

/// Selected encoders for recording
pub struct SelectedEncoders {
    /// Video encoder configuration
    pub video: SelectedVideoEncoder,
    /// Audio encoder configuration, present when audio was requested
    pub audio: Option<SelectedAudioEncoder>,
}

/// Select the best available encoders
///
/// A requested audio track without a usable encoder is an error; the file
/// would otherwise silently lack a track the session is writing.
pub fn select_encoders(
    config: &EncoderConfig,
    enable_audio: bool,
) -> Result<SelectedEncoders, String> {
    let info = choose_video_encoder(config.preferred_encoder.as_deref()).ok_or_else(|| {
        "No video encoder available. Please install gstreamer1-plugins-ugly (x264enc) or a hardware encoder".to_string()
    })?;
    let video = create_video_encoder(&info, config.bitrate_kbps, &config.compression_properties)?;

    let audio = if enable_audio {
        Some(select_audio_encoder(
            config.audio_quality,
            config.audio_channels,
            video.container,
        )?)
    } else {
        None
    };

    Ok(SelectedEncoders { video, audio })
}

/// Container extension the current installation would produce
pub fn container_extension(preferred_encoder: Option<&str>) -> &'static str {
    choose_video_encoder(preferred_encoder)
        .map(|info| info.codec.file_extension())
        .unwrap_or("mp4")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecorderConfig;

    #[test]
    fn test_default_config() {
        let config = EncoderConfig::default();
        assert_eq!(config.audio_channels, AudioChannels::Stereo);
        assert!(config.preferred_encoder.is_none());
    }

    #[test]
    fn test_from_tracks() {
        let mut recorder = RecorderConfig::default();
        recorder.video_bit_rate = Some(2_500_000);
        recorder.video_encoder = Some("x264enc".to_string());
        let video = VideoTrackSettings::from_config(&recorder, 1280, 720);
        let audio = AudioTrackSettings {
            sample_rate: 48_000,
            channels: 1,
            quality: AudioQuality::Low,
        };

        let config = EncoderConfig::from_tracks(&video, Some(&audio));
        assert_eq!(config.bitrate_kbps, 2_500);
        assert_eq!(config.preferred_encoder.as_deref(), Some("x264enc"));
        assert_eq!(config.audio_channels, AudioChannels::Mono);
        assert_eq!(config.audio_quality, AudioQuality::Low);
    }

    #[test]
    fn test_container_extension_known() {
        assert!(["mp4", "webm"].contains(&container_extension(None)));
    }
}
