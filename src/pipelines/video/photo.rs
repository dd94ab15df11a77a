// SPDX-License-Identifier: GPL-3.0-only

//! Still photos grabbed from a running recording
//!
//! The still is the most recent frame that went into the file, after
//! filtering and any delegate substitution. It is handed back as JPEG
//! bytes, the full-size image and a thumbnail scaled into 160x120.

use super::thumbnail::Thumbnail;
use crate::constants::thumbnail as thumb_consts;
use crate::errors::RecorderError;
use crate::media::VideoFrame;
use chrono::{DateTime, Local};
use image::{DynamicImage, RgbaImage};
use std::time::Duration;
use uuid::Uuid;

/// Where a still came from
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoMetadata {
    /// Session the frame was recorded in
    pub session_id: Uuid,
    /// Position of the frame on the output timeline
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    /// Wall-clock time of the grab
    pub captured_at: DateTime<Local>,
}

/// A still photo taken during recording
#[derive(Debug, Clone)]
pub struct PhotoResult {
    /// Baseline JPEG of the full frame
    pub jpeg: Vec<u8>,
    pub image: RgbaImage,
    pub thumbnail: Thumbnail,
    pub metadata: PhotoMetadata,
}

impl PhotoResult {
    /// Encode a processed frame
    pub fn from_frame(
        frame: &VideoFrame,
        timestamp: Duration,
        session_id: Uuid,
    ) -> Result<Self, RecorderError> {
        let image = frame
            .to_rgba_image()
            .ok_or_else(|| RecorderError::CaptureFailed("frame cannot be read".to_string()))?;
        let thumbnail = Thumbnail::scaled_from_frame(frame, timestamp)
            .ok_or_else(|| RecorderError::CaptureFailed("frame cannot be read".to_string()))?;
        let jpeg = encode_jpeg(&image, thumb_consts::PHOTO_JPEG_QUALITY)?;

        Ok(Self {
            metadata: PhotoMetadata {
                session_id,
                timestamp,
                width: image.width(),
                height: image.height(),
                captured_at: Local::now(),
            },
            jpeg,
            image,
            thumbnail,
        })
    }
}

/// JPEG has no alpha; the image is flattened to RGB first
fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, RecorderError> {
    let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| RecorderError::CaptureFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}
