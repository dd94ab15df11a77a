// SPDX-License-Identifier: GPL-3.0-only

//! Live capture source
//!
//! A GStreamer pipeline ending in `appsink` elements that hands RGBA frames
//! and S16LE audio to a [`VideoRecorder`] from the streaming threads. The
//! recorder never blocks these callbacks, so the sinks are set to drop old
//! buffers instead of queueing them.

use crate::constants::{pipeline as pipeline_consts, timing};
use crate::media::{AudioChunk, AudioSample, FrameData, SampleTiming, VideoFrame, VideoSample};
use crate::pipelines::video::VideoRecorder;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks};
use gstreamer_video::VideoInfo;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where video comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoSource {
    /// `videotestsrc`, no hardware required
    #[default]
    TestPattern,
    /// `pipewiresrc`, optionally targeting a node
    PipeWire,
    /// `v4l2src`, optionally on a device path
    V4l2,
}

impl FromStr for VideoSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "test" | "testsrc" | "pattern" => Ok(VideoSource::TestPattern),
            "pipewire" => Ok(VideoSource::PipeWire),
            "v4l2" => Ok(VideoSource::V4l2),
            other => Err(format!("Unknown video source '{}'", other)),
        }
    }
}

/// Live capture parameters
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub source: VideoSource,
    /// PipeWire node or V4L2 device path
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub audio: bool,
    pub sample_rate: u32,
    pub channels: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            source: VideoSource::TestPattern,
            device: None,
            width: 1280,
            height: 720,
            frame_rate: 30,
            audio: false,
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl CaptureOptions {
    /// `gst-launch` style description of the capture pipeline
    pub fn pipeline_description(&self) -> String {
        let video_src = match self.source {
            VideoSource::TestPattern => "videotestsrc is-live=true pattern=ball".to_string(),
            VideoSource::PipeWire => match &self.device {
                Some(node) => format!("pipewiresrc target-object=\"{}\" do-timestamp=true", node),
                None => "pipewiresrc do-timestamp=true".to_string(),
            },
            VideoSource::V4l2 => match &self.device {
                Some(device) => format!("v4l2src device=\"{}\" do-timestamp=true", device),
                None => "v4l2src do-timestamp=true".to_string(),
            },
        };

        let mut description = format!(
            "{} ! videoconvert ! videoscale ! videorate ! \
             video/x-raw,format={},width={},height={},framerate={}/1 ! \
             appsink name=video_sink sync=false drop=true max-buffers={}",
            video_src,
            pipeline_consts::VIDEO_FORMAT,
            self.width,
            self.height,
            self.frame_rate.max(1),
            pipeline_consts::MAX_BUFFERS,
        );

        if self.audio {
            let audio_src = match self.source {
                VideoSource::TestPattern => "audiotestsrc is-live=true wave=sine volume=0.2",
                VideoSource::PipeWire | VideoSource::V4l2 => "autoaudiosrc",
            };
            description.push_str(&format!(
                " {} ! audioconvert ! audioresample ! \
                 audio/x-raw,format={},layout=interleaved,rate={},channels={} ! \
                 appsink name=audio_sink sync=false drop=true max-buffers={}",
                audio_src,
                pipeline_consts::AUDIO_FORMAT,
                self.sample_rate,
                self.channels,
                pipeline_consts::MAX_BUFFERS * 4,
            ));
        }

        description
    }
}

/// Running capture pipeline feeding a recorder
pub struct LiveCapture {
    pipeline: gst::Pipeline,
    video_sink: AppSink,
    audio_sink: Option<AppSink>,
    frames: Arc<AtomicU64>,
}

impl LiveCapture {
    /// Build the pipeline, attach the recorder and start streaming
    pub fn start(options: &CaptureOptions, recorder: VideoRecorder) -> Result<Self, String> {
        gst::init().map_err(|e| format!("GStreamer init failed: {}", e))?;

        let description = options.pipeline_description();
        info!(source = ?options.source, audio = options.audio, "Creating capture pipeline");
        debug!(pipeline = %description, "Capture pipeline description");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| format!("Failed to create capture pipeline: {}", e))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| "Failed to downcast to Pipeline".to_string())?;

        let video_sink = appsink_by_name(&pipeline, "video_sink")?;
        let audio_sink = if options.audio {
            Some(appsink_by_name(&pipeline, "audio_sink")?)
        } else {
            None
        };

        let frames = Arc::new(AtomicU64::new(0));
        let fallback = Duration::from_nanos(1_000_000_000 / options.frame_rate.max(1) as u64);
        attach_video(&video_sink, recorder.clone(), Arc::clone(&frames), fallback);
        if let Some(sink) = &audio_sink {
            attach_audio(sink, recorder);
        }

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| format!("Failed to start capture pipeline: {}", e))?;

        let (result, state, pending) =
            pipeline.state(gst::ClockTime::from_seconds(timing::START_TIMEOUT_SECS));
        debug!(result = ?result, state = ?state, pending = ?pending, "Capture pipeline state");
        if state != gst::State::Playing {
            warn!("Capture pipeline is not in PLAYING state");
        }

        let capture = Self {
            pipeline,
            video_sink,
            audio_sink,
            frames,
        };
        capture.check()?;
        info!("Capture pipeline running");
        Ok(capture)
    }

    /// Frames handed to the recorder so far
    pub fn frames_delivered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Report an error or end of stream posted since the last check
    pub fn check(&self) -> Result<(), String> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        let Some(msg) = bus.timed_pop_filtered(
            gst::ClockTime::from_nseconds(timing::BUS_POLL.as_nanos() as u64),
            &[gst::MessageType::Error, gst::MessageType::Eos],
        ) else {
            return Ok(());
        };

        match msg.view() {
            gst::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    "Capture pipeline error"
                );
                Err(format!("Capture error: {}", err.error()))
            }
            gst::MessageView::Eos(_) => Err("Capture source ended".to_string()),
            _ => Ok(()),
        }
    }

    /// Detach the recorder and release the devices
    pub fn stop(self) -> Result<(), String> {
        info!(frames = self.frames_delivered(), "Stopping capture pipeline");

        self.video_sink
            .set_callbacks(AppSinkCallbacks::builder().build());
        if let Some(sink) = &self.audio_sink {
            sink.set_callbacks(AppSinkCallbacks::builder().build());
        }

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| format!("Failed to stop capture pipeline: {}", e))?;
        Ok(())
    }
}

fn appsink_by_name(pipeline: &gst::Pipeline, name: &str) -> Result<AppSink, String> {
    pipeline
        .by_name(name)
        .ok_or_else(|| format!("Failed to get {}", name))?
        .dynamic_cast::<AppSink>()
        .map_err(|_| format!("Failed to cast {}", name))
}

fn buffer_timing(buffer: &gst::BufferRef, fallback: Duration) -> Option<SampleTiming> {
    let pts = buffer.pts()?;
    let duration = buffer
        .duration()
        .map(|d| Duration::from_nanos(d.nseconds()))
        .unwrap_or(fallback);
    Some(SampleTiming::new(Duration::from_nanos(pts.nseconds()), duration))
}

fn attach_video(sink: &AppSink, recorder: VideoRecorder, frames: Arc<AtomicU64>, fallback: Duration) {
    sink.set_callbacks(
        AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let frame_num = frames.fetch_add(1, Ordering::Relaxed);
                let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;

                let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                let video_info = VideoInfo::from_caps(caps).map_err(|e| {
                    if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                        error!(frame = frame_num, error = ?e, "Failed to get video info");
                    }
                    gst::FlowError::Error
                })?;

                let buffer = sample.buffer_owned().ok_or(gst::FlowError::Error)?;
                let Some(timing) = buffer_timing(&buffer, fallback) else {
                    debug!(frame = frame_num, "Frame without timestamp, skipping");
                    return Ok(gst::FlowSuccess::Ok);
                };
                let mapped = buffer.into_mapped_buffer_readable().map_err(|_| {
                    error!(frame = frame_num, "Failed to map buffer");
                    gst::FlowError::Error
                })?;

                let frame = VideoFrame::with_stride(
                    FrameData::from_mapped_buffer(mapped),
                    video_info.width(),
                    video_info.height(),
                    video_info.stride()[0] as u32,
                );

                if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        frame = frame_num,
                        width = frame.width,
                        height = frame.height,
                        pts_ms = timing.pts.as_millis() as u64,
                        "Captured frame"
                    );
                }

                recorder.append_video_sample(VideoSample::new(frame, timing));
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
}

fn attach_audio(sink: &AppSink, recorder: VideoRecorder) {
    sink.set_callbacks(
        AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                let caps = sample.caps().ok_or(gst::FlowError::Error)?;
                let structure = caps.structure(0).ok_or(gst::FlowError::Error)?;
                let rate = structure
                    .get::<i32>("rate")
                    .map_err(|_| gst::FlowError::NotNegotiated)?;
                let channels = structure
                    .get::<i32>("channels")
                    .map_err(|_| gst::FlowError::NotNegotiated)?;

                let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
                let chunk = AudioChunk::new(map.as_slice(), rate as u32, channels as u32);

                let Some(timing) = buffer_timing(buffer, chunk.duration()) else {
                    return Ok(gst::FlowSuccess::Ok);
                };
                recorder.append_audio_sample(AudioSample::new(chunk, timing));
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_source() {
        assert_eq!("test".parse::<VideoSource>(), Ok(VideoSource::TestPattern));
        assert_eq!("PipeWire".parse::<VideoSource>(), Ok(VideoSource::PipeWire));
        assert_eq!("v4l2".parse::<VideoSource>(), Ok(VideoSource::V4l2));
        assert!("firewire".parse::<VideoSource>().is_err());
    }

    #[test]
    fn test_description_video_only() {
        let options = CaptureOptions::default();
        let description = options.pipeline_description();
        assert!(description.starts_with("videotestsrc is-live=true"));
        assert!(description.contains("format=RGBA,width=1280,height=720,framerate=30/1"));
        assert!(description.contains("appsink name=video_sink"));
        assert!(!description.contains("audio_sink"));
    }

    #[test]
    fn test_description_with_device_and_audio() {
        let options = CaptureOptions {
            source: VideoSource::V4l2,
            device: Some("/dev/video2".to_string()),
            audio: true,
            ..CaptureOptions::default()
        };
        let description = options.pipeline_description();
        assert!(description.starts_with("v4l2src device=\"/dev/video2\""));
        assert!(description.contains("autoaudiosrc"));
        assert!(description.contains("format=S16LE,layout=interleaved,rate=48000,channels=2"));
        assert!(description.contains("appsink name=audio_sink"));
    }
}
