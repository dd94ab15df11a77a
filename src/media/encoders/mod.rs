// SPDX-License-Identifier: GPL-3.0-only

//! Media encoder selection and configuration
//!
//! - Hardware encoder priority (AV1 > HEVC > H.264)
//! - Software fallbacks for maximum compatibility
//! - Pass-through of user supplied element properties

pub mod audio;
pub mod detection;
pub mod video;

pub use audio::{AudioChannels, AudioCodec, AudioQuality};
pub use detection::{EncoderReport, detect_encoders};
pub use video::{ContainerFormat, EncoderInfo, VideoCodec};

use gstreamer as gst;
use gstreamer::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Set string-valued properties on an element, skipping names it does not have
pub fn apply_element_properties(element: &gst::Element, properties: &BTreeMap<String, String>) {
    let element_name = element
        .factory()
        .map(|f| f.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    for (key, value) in properties {
        if element.has_property(key) {
            element.set_property_from_str(key, value);
            debug!(element = %element_name, property = %key, value = %value, "Applied property");
        } else {
            warn!(element = %element_name, property = %key, "Ignoring unknown property");
        }
    }
}
