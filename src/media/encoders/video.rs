// SPDX-License-Identifier: GPL-3.0-only

//! Video encoder selection with hardware acceleration priority
//!
//! Hardware encoders are preferred over software ones, and within each group
//! AV1 > HEVC > H.264.

use super::apply_element_properties;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Video codec types in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// AV1 codec (best compression, modern)
    AV1,
    /// HEVC/H.265 codec (good compression)
    HEVC,
    /// H.264 codec (best compatibility)
    H264,
}

impl VideoCodec {
    /// Get the container format for this codec
    pub fn container_format(&self) -> ContainerFormat {
        match self {
            VideoCodec::AV1 => ContainerFormat::WebM,
            VideoCodec::HEVC | VideoCodec::H264 => ContainerFormat::MP4,
        }
    }

    /// Get the file extension for this codec's container
    pub fn file_extension(&self) -> &'static str {
        self.container_format().extension()
    }

    /// Get the parser element name
    pub fn parser_name(&self) -> &'static str {
        match self {
            VideoCodec::AV1 => "av1parse",
            VideoCodec::HEVC => "h265parse",
            VideoCodec::H264 => "h264parse",
        }
    }
}

/// Container formats for video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// MP4 container (Opus or AAC audio)
    MP4,
    /// WebM container (Opus audio only)
    WebM,
}

impl ContainerFormat {
    /// Get file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::MP4 => "mp4",
            ContainerFormat::WebM => "webm",
        }
    }

    /// Get muxer element name
    pub fn muxer_name(&self) -> &'static str {
        match self {
            ContainerFormat::MP4 => "mp4mux",
            ContainerFormat::WebM => "webmmux",
        }
    }
}

/// Information about an available encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    /// GStreamer element name
    pub element_name: String,
    /// Human readable name
    pub display_name: String,
    /// Codec type
    pub codec: VideoCodec,
    /// Whether this is hardware accelerated
    pub is_hardware: bool,
    /// Priority (lower = higher priority)
    pub priority: u32,
}

/// Known encoders as (element, display name, codec, hardware, priority)
const ENCODER_SPECS: &[(&str, &str, VideoCodec, bool, u32)] = &[
    ("vaav1enc", "VA-API AV1 (HW)", VideoCodec::AV1, true, 1),
    ("nvav1enc", "NVIDIA AV1 (HW)", VideoCodec::AV1, true, 2),
    ("vah265enc", "VA-API H.265 (HW)", VideoCodec::HEVC, true, 20),
    ("vaapih265enc", "VA-API H.265 (HW)", VideoCodec::HEVC, true, 21),
    ("nvh265enc", "NVIDIA H.265 (HW)", VideoCodec::HEVC, true, 22),
    ("v4l2h265enc", "V4L2 H.265 (HW)", VideoCodec::HEVC, true, 25),
    ("vah264enc", "VA-API H.264 (HW)", VideoCodec::H264, true, 40),
    ("vaapih264enc", "VA-API H.264 (HW)", VideoCodec::H264, true, 41),
    ("nvh264enc", "NVIDIA H.264 (HW)", VideoCodec::H264, true, 42),
    ("v4l2h264enc", "V4L2 H.264 (HW)", VideoCodec::H264, true, 45),
    ("x264enc", "x264 H.264 (SW)", VideoCodec::H264, false, 50),
    ("openh264enc", "OpenH264 H.264 (SW)", VideoCodec::H264, false, 51),
    ("x265enc", "x265 H.265 (SW)", VideoCodec::HEVC, false, 60),
    ("svtav1enc", "SVT-AV1 (SW)", VideoCodec::AV1, false, 70),
];

/// Selected video encoder with configuration
pub struct SelectedVideoEncoder {
    /// The encoder element
    pub encoder: gst::Element,
    /// Optional parser element
    pub parser: Option<gst::Element>,
    /// Muxer element
    pub muxer: gst::Element,
    /// Codec being used
    pub codec: VideoCodec,
    /// Container format
    pub container: ContainerFormat,
}

/// Enumerate all available video encoders, sorted by priority
pub fn enumerate_video_encoders() -> Vec<EncoderInfo> {
    if gst::init().is_err() {
        return Vec::new();
    }

    let mut available: Vec<EncoderInfo> = ENCODER_SPECS
        .iter()
        .filter(|(element, ..)| gst::ElementFactory::find(element).is_some())
        .map(
            |(element, display, codec, is_hardware, priority)| EncoderInfo {
                element_name: element.to_string(),
                display_name: display.to_string(),
                codec: *codec,
                is_hardware: *is_hardware,
                priority: *priority,
            },
        )
        .collect();

    available.sort_by_key(|e| e.priority);
    available
}

/// Pick the encoder to use: the preferred element if present, else the first by priority
pub fn choose_video_encoder(preferred: Option<&str>) -> Option<EncoderInfo> {
    let available = enumerate_video_encoders();

    if let Some(name) = preferred {
        if let Some(info) = available.iter().find(|e| e.element_name == name) {
            return Some(info.clone());
        }
        warn!(encoder = %name, "Requested video encoder not available, auto-selecting");
    }

    available.into_iter().next()
}

/// Create encoder, parser and muxer elements for `info`
pub fn create_video_encoder(
    info: &EncoderInfo,
    bitrate_kbps: u32,
    compression_properties: &BTreeMap<String, String>,
) -> Result<SelectedVideoEncoder, String> {
    let encoder = gst::ElementFactory::make(&info.element_name)
        .build()
        .map_err(|e| format!("Failed to create encoder {}: {}", info.element_name, e))?;

    configure_video_encoder(&encoder, &info.element_name, bitrate_kbps);
    apply_element_properties(&encoder, compression_properties);

    let parser_name = info.codec.parser_name();
    let parser = match gst::ElementFactory::make(parser_name).build() {
        Ok(p) => {
            debug!("Created parser: {}", parser_name);
            Some(p)
        }
        Err(e) => {
            warn!("Failed to create parser {}: {}", parser_name, e);
            None
        }
    };

    let container = info.codec.container_format();
    let muxer = gst::ElementFactory::make(container.muxer_name())
        .build()
        .map_err(|e| format!("Failed to create muxer {}: {}", container.muxer_name(), e))?;

    info!(
        encoder = %info.element_name,
        codec = ?info.codec,
        hardware = info.is_hardware,
        bitrate_kbps,
        "Selected video encoder"
    );

    Ok(SelectedVideoEncoder {
        encoder,
        parser,
        muxer,
        codec: info.codec,
        container,
    })
}

/// Configure rate control for known encoders
fn configure_video_encoder(encoder: &gst::Element, encoder_name: &str, bitrate: u32) {
    let set_str = |name: &str, value: &str| {
        if encoder.has_property(name) {
            encoder.set_property_from_str(name, value);
        }
    };

    match encoder_name {
        "x264enc" => {
            set_str("speed-preset", "veryfast");
            set_str("tune", "zerolatency");
            encoder.set_property("bitrate", bitrate);
            debug!("Configured x264enc: bitrate={} kbps", bitrate);
        }

        "x265enc" => {
            set_str("speed-preset", "veryfast");
            encoder.set_property("bitrate", bitrate);
            debug!("Configured x265enc: bitrate={} kbps", bitrate);
        }

        "vaapih264enc" | "vaapih265enc" => {
            set_str("rate-control", "cbr");
            encoder.set_property("bitrate", bitrate);
            debug!("Configured VA-API encoder: bitrate={} kbps", bitrate);
        }

        "vah264enc" | "vah265enc" | "vaav1enc" => {
            set_str("rate-control", "cbr");
            encoder.set_property("bitrate", bitrate);
            debug!("Configured VA encoder: bitrate={} kbps", bitrate);
        }

        "nvh264enc" | "nvh265enc" | "nvav1enc" => {
            encoder.set_property("bitrate", bitrate);
            set_str("rc-mode", "vbr");
            debug!("Configured NVIDIA encoder: bitrate={} kbps", bitrate);
        }

        "openh264enc" => {
            set_str("rate-control", "bitrate");
            encoder.set_property("bitrate", bitrate.saturating_mul(1000));
            set_str("usage-type", "camera");
            debug!("Configured openh264enc: bitrate={} bps", bitrate * 1000);
        }

        "svtav1enc" => {
            if encoder.has_property("target-bitrate") {
                encoder.set_property("target-bitrate", bitrate);
            }
            debug!("Configured svtav1enc: bitrate={} kbps", bitrate);
        }

        _ => {
            debug!(
                encoder = %encoder_name,
                "Encoder uses default rate control"
            );
        }
    }
}
