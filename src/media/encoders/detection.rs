// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer encoder detection

use super::video::{EncoderInfo, enumerate_video_encoders};
use gstreamer as gst;
use tracing::{debug, info};

/// Audio encoder elements the recorder knows how to drive
const AUDIO_ENCODERS: &[&str] = &["opusenc", "avenc_aac", "fdkaacenc", "voaacenc"];

/// Check if a specific GStreamer element is installed
pub fn is_element_available(element_name: &str) -> bool {
    if gst::init().is_err() {
        return false;
    }
    gst::ElementFactory::find(element_name).is_some()
}

/// Installed audio encoders, in preference order
pub fn detect_audio_encoders() -> Vec<String> {
    let available: Vec<String> = AUDIO_ENCODERS
        .iter()
        .filter(|name| is_element_available(name))
        .map(|name| {
            debug!("Audio encoder available: {}", name);
            name.to_string()
        })
        .collect();

    info!("Detected {} audio encoders", available.len());
    available
}

/// Snapshot of what the installation can record with
#[derive(Debug, Clone)]
pub struct EncoderReport {
    pub video: Vec<EncoderInfo>,
    pub audio: Vec<String>,
}

/// Detect video and audio encoders
pub fn detect_encoders() -> EncoderReport {
    EncoderReport {
        video: enumerate_video_encoders(),
        audio: detect_audio_encoders(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_runs() {
        // Only ensure detection doesn't panic without plugins
        let report = detect_encoders();
        assert!(report.audio.iter().all(|a| AUDIO_ENCODERS.contains(&a.as_str())));
    }

    #[test]
    fn test_unknown_element_unavailable() {
        assert!(!is_element_available("definitely-not-an-element"));
    }
}
