// SPDX-License-Identifier: GPL-3.0-only

//! Still images from a recording
//!
//! While recording, the extractor keeps the latest processed frame and a
//! bounded side buffer of downscaled frames sampled at a fixed interval.
//! Time and frame-index queries resolve to the nearest entry at or before
//! the requested position. Finished files are queried by seeking a decoder.

use crate::constants::thumbnail as thumb_consts;
use crate::errors::ThumbnailError;
use crate::media::VideoFrame;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbaImage;
use image::imageops::FilterType as ResizeFilter;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// A still image and its position on the output timeline
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub image: RgbaImage,
    pub timestamp: Duration,
}

impl Thumbnail {
    /// Full-size copy of a frame
    pub fn from_frame(frame: &VideoFrame, timestamp: Duration) -> Option<Self> {
        Some(Self {
            image: frame.to_rgba_image()?,
            timestamp,
        })
    }

    /// Frame scaled down to fit the thumbnail box, aspect preserved
    pub fn scaled_from_frame(frame: &VideoFrame, timestamp: Duration) -> Option<Self> {
        let image = frame.to_rgba_image()?;
        let (width, height) = fit_within(
            image.width(),
            image.height(),
            thumb_consts::WIDTH,
            thumb_consts::HEIGHT,
        );
        let image = if (width, height) == image.dimensions() {
            image
        } else {
            image::imageops::resize(&image, width, height, ResizeFilter::Triangle)
        };
        Some(Self { image, timestamp })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode to a file; the format follows the extension
    pub fn save(&self, path: &Path) -> Result<(), String> {
        self.image
            .save(path)
            .map_err(|e| format!("Failed to save thumbnail {}: {}", path.display(), e))
    }
}

/// Largest size with the source aspect that fits `max_width`x`max_height`
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

/// Thumbnail source for an in-flight recording
#[derive(Debug)]
pub struct ThumbnailExtractor {
    sampling: bool,
    interval: Duration,
    limit: usize,
    frame_rate: u32,
    latest: Option<(VideoFrame, Duration)>,
    first: Option<Thumbnail>,
    history: VecDeque<Thumbnail>,
    next_sample_at: Duration,
}

impl ThumbnailExtractor {
    /// `sampling` controls the side buffer; the latest frame is always kept
    pub fn new(sampling: bool, interval: Duration, limit: usize, frame_rate: u32) -> Self {
        Self {
            sampling,
            interval,
            limit: limit.max(1),
            frame_rate: frame_rate.max(1),
            latest: None,
            first: None,
            history: VecDeque::new(),
            next_sample_at: Duration::ZERO,
        }
    }

    /// Note a frame that was just written at `timestamp`
    pub fn record(&mut self, frame: &VideoFrame, timestamp: Duration) {
        self.latest = Some((frame.clone(), timestamp));

        if !self.sampling || timestamp < self.next_sample_at {
            return;
        }
        let Some(thumbnail) = Thumbnail::scaled_from_frame(frame, timestamp) else {
            return;
        };

        if self.first.is_none() {
            self.first = Some(thumbnail.clone());
        }
        self.history.push_back(thumbnail);
        if self.history.len() > self.limit {
            self.history.pop_front();
        }
        self.next_sample_at = timestamp + self.interval;
    }

    /// Projection of the most recent frame, full size
    pub fn current(&self) -> Result<Thumbnail, ThumbnailError> {
        let (frame, timestamp) = self.latest.as_ref().ok_or(ThumbnailError::NoFrameAvailable)?;
        Thumbnail::from_frame(frame, *timestamp).ok_or(ThumbnailError::NoFrameAvailable)
    }

    /// Most recent processed frame and its output timestamp
    pub fn latest(&self) -> Option<(&VideoFrame, Duration)> {
        self.latest.as_ref().map(|(frame, timestamp)| (frame, *timestamp))
    }

    /// Nearest frame at or before `time`
    pub fn at_time(&self, time: Duration) -> Result<Thumbnail, ThumbnailError> {
        let from_history = self
            .history
            .iter()
            .rev()
            .find(|thumb| thumb.timestamp <= time);

        // The latest frame may be closer than the last sampled one
        if let Some((frame, timestamp)) = &self.latest
            && *timestamp <= time
            && from_history.is_none_or(|thumb| thumb.timestamp < *timestamp)
        {
            return Thumbnail::scaled_from_frame(frame, *timestamp)
                .ok_or(ThumbnailError::NoFrameAvailable);
        }

        from_history.cloned().ok_or(ThumbnailError::NoFrameAvailable)
    }

    /// Nearest frame at or before `index / frame_rate`
    pub fn at_frame(&self, index: u64) -> Result<Thumbnail, ThumbnailError> {
        let time = Duration::from_secs_f64(index as f64 / self.frame_rate as f64);
        self.at_time(time)
    }

    /// First sampled thumbnail of the session
    pub fn first(&self) -> Option<&Thumbnail> {
        self.first.as_ref()
    }

    /// Side buffer, oldest first
    pub fn history(&self) -> Vec<Thumbnail> {
        self.history.iter().cloned().collect()
    }
}

/// Decode the frame at or just before `position_secs` from a finished file
pub fn extract_thumbnail_from_file(
    path: &Path,
    position_secs: f64,
) -> Result<Thumbnail, ThumbnailError> {
    debug!(path = %path.display(), position_secs, "Extracting thumbnail from file");

    let result = decode_frame_at(path, position_secs.max(0.0));
    if let Err(ref e) = result {
        warn!(path = %path.display(), position_secs, error = %e, "No thumbnail available");
    }
    result.map_err(|_| ThumbnailError::NoFrameAvailable)
}

fn decode_frame_at(path: &Path, position_secs: f64) -> Result<Thumbnail, String> {
    gst::init().map_err(|e| format!("GStreamer init failed: {}", e))?;
    if !path.is_file() {
        return Err(format!("{} does not exist", path.display()));
    }

    let pipeline_str = format!(
        "filesrc location=\"{}\" ! decodebin ! \
         videoconvert ! video/x-raw,format=RGBA ! \
         appsink name=sink max-buffers=1 drop=true sync=false",
        path.to_string_lossy()
    );
    let pipeline = gst::parse::launch(&pipeline_str)
        .map_err(|e| format!("Failed to create pipeline: {}", e))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| "Failed to downcast to Pipeline".to_string())?;

    let result = pull_frame(&pipeline, position_secs);
    let _ = pipeline.set_state(gst::State::Null);
    result
}

fn pull_frame(pipeline: &gst::Pipeline, position_secs: f64) -> Result<Thumbnail, String> {
    let appsink = pipeline
        .by_name("sink")
        .and_then(|e| e.downcast::<gst_app::AppSink>().ok())
        .ok_or_else(|| "Missing appsink".to_string())?;
    let bus = pipeline.bus().ok_or_else(|| "Pipeline has no bus".to_string())?;

    // Everything below happens in Paused: the appsink holds exactly the
    // preroll frame, so nothing past the seek target is decoded into it
    pipeline
        .set_state(gst::State::Paused)
        .map_err(|e| format!("Failed to pause pipeline: {:?}", e))?;
    wait_async_done(&bus, "preroll")?;

    let mut position = gst::ClockTime::from_nseconds((position_secs * 1_000_000_000.0) as u64);
    if let Some(duration) = pipeline.query_duration::<gst::ClockTime>()
        && position >= duration
    {
        position = duration.saturating_sub(gst::ClockTime::from_mseconds(1));
    }

    match pipeline.seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE, position) {
        Ok(()) => wait_async_done(&bus, "seek")?,
        Err(e) => warn!(?e, "Seek failed, using first decodable frame"),
    }

    let sample = appsink
        .try_pull_preroll(gst::ClockTime::from_seconds(3))
        .ok_or_else(|| "Timeout waiting for frame".to_string())?;

    let caps = sample.caps().ok_or_else(|| "No caps on sample".to_string())?;
    let info = gst_video::VideoInfo::from_caps(caps).map_err(|e| format!("Bad caps: {}", e))?;
    let buffer = sample.buffer().ok_or_else(|| "No buffer in sample".to_string())?;
    let timestamp = buffer
        .pts()
        .map(|pts| Duration::from_nanos(pts.nseconds()))
        .unwrap_or_default();
    let map = buffer
        .map_readable()
        .map_err(|_| "Failed to map buffer".to_string())?;

    let frame = VideoFrame::with_stride(
        map.as_slice().to_vec(),
        info.width(),
        info.height(),
        info.stride()[0] as u32,
    );
    Thumbnail::scaled_from_frame(&frame, timestamp)
        .ok_or_else(|| "Decoded frame has unexpected size".to_string())
}

/// Wait for the pipeline to settle after a state change or flushing seek
fn wait_async_done(bus: &gst::Bus, what: &str) -> Result<(), String> {
    match bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(5),
        &[gst::MessageType::AsyncDone, gst::MessageType::Error],
    ) {
        Some(msg) => match msg.view() {
            gst::MessageView::Error(err) => Err(format!("Pipeline error: {}", err.error())),
            _ => Ok(()),
        },
        None => Err(format!("Timeout waiting for {}", what)),
    }
}
