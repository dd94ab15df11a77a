// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer container sink
//!
//! ```text
//! appsrc (RGBA) -> queue -> [videocrop] -> videoconvert -> encoder -> [parser] -+
//!                                                                              +-> muxer -> filesink
//! appsrc (S16LE) -> queue -> audioconvert -> audioresample -> encoder ----------+
//! ```
//!
//! Samples are pushed without blocking; the appsrc queue level is reported
//! through [`ContainerSink::ready_for`] so the writer can drop instead of
//! stalling the capture thread.

use super::encoder_selection::{EncoderConfig, container_extension, select_encoders};
use super::writer::{AudioTrackSettings, ContainerSink, SinkFactory, VideoTrackSettings};
use crate::config::RecorderConfig;
use crate::constants::{pipeline as pipeline_consts, timing};
use crate::errors::WriterError;
use crate::media::encoders::apply_element_properties;
use crate::media::{AudioChunk, MediaType, SampleTiming, VideoFrame};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Writes an MP4/WebM file through a GStreamer pipeline
pub struct GstContainerSink {
    path: PathBuf,
    pipeline: Option<gst::Pipeline>,
    video_src: Option<gst_app::AppSrc>,
    audio_src: Option<gst_app::AppSrc>,
}

impl GstContainerSink {
    pub fn new(path: &Path) -> Result<Self, WriterError> {
        gst::init().map_err(|e| WriterError::Backend(format!("GStreamer init: {}", e)))?;
        Ok(Self {
            path: path.to_path_buf(),
            pipeline: None,
            video_src: None,
            audio_src: None,
        })
    }

    fn build(
        &self,
        video: &VideoTrackSettings,
        audio: Option<&AudioTrackSettings>,
    ) -> Result<(gst::Pipeline, gst_app::AppSrc, Option<gst_app::AppSrc>), String> {
        let encoders = select_encoders(&EncoderConfig::from_tracks(video, audio), audio.is_some())?;

        info!(
            video_codec = ?encoders.video.codec,
            audio_codec = ?encoders.audio.as_ref().map(|a| a.codec),
            container = ?encoders.video.container,
            path = %self.path.display(),
            "Building container pipeline"
        );

        let pipeline = gst::Pipeline::new();

        // Video branch
        let video_info = gst_video::VideoInfo::builder(
            gst_video::VideoFormat::Rgba,
            video.width,
            video.height,
        )
        .fps(gst::Fraction::new(video.frame_rate as i32, 1))
        .build()
        .map_err(|e| format!("Invalid video info: {}", e))?;
        let video_caps = video_info
            .to_caps()
            .map_err(|e| format!("Failed to build video caps: {}", e))?;
        let video_src = new_appsrc("video_src", &video_caps);

        let video_queue = make("queue")?;
        let videoconvert = make("videoconvert")?;

        let (left, right, top, bottom) = video.crop.margins(video.width, video.height);
        let videocrop = if left + right + top + bottom > 0 {
            let crop = gst::ElementFactory::make("videocrop")
                .property("left", left as i32)
                .property("right", right as i32)
                .property("top", top as i32)
                .property("bottom", bottom as i32)
                .build()
                .map_err(|e| format!("Failed to create videocrop: {}", e))?;
            debug!(left, right, top, bottom, "Cropping to output format");
            Some(crop)
        } else {
            None
        };

        let muxer = encoders.video.muxer;
        if muxer.has_property("streamable") {
            // Duration and index are written at EOS for seekable playback
            muxer.set_property("streamable", false);
        }
        apply_element_properties(&muxer, &video.container_properties);

        let filesink = gst::ElementFactory::make("filesink")
            .property("location", self.path.to_string_lossy().to_string())
            .build()
            .map_err(|e| format!("Failed to create filesink: {}", e))?;

        let mut video_chain: Vec<&gst::Element> = vec![video_src.upcast_ref(), &video_queue];
        if let Some(ref crop) = videocrop {
            video_chain.push(crop);
        }
        video_chain.push(&videoconvert);
        video_chain.push(&encoders.video.encoder);
        if let Some(ref parser) = encoders.video.parser {
            video_chain.push(parser);
        }

        pipeline
            .add_many(video_chain.iter().copied())
            .map_err(|e| format!("Failed to add video elements: {}", e))?;
        pipeline
            .add_many([&muxer, &filesink])
            .map_err(|e| format!("Failed to add muxer: {}", e))?;

        gst::Element::link_many(video_chain.iter().copied())
            .map_err(|e| format!("Failed to link video branch: {}", e))?;
        video_chain
            .last()
            .ok_or_else(|| "Empty video branch".to_string())?
            .link(&muxer)
            .map_err(|_| "Failed to link video encoder to muxer".to_string())?;
        muxer
            .link(&filesink)
            .map_err(|_| "Failed to link muxer to filesink".to_string())?;

        // Audio branch
        let audio_src = match (audio, encoders.audio) {
            (Some(settings), Some(selected)) => {
                let audio_caps = gst::Caps::builder("audio/x-raw")
                    .field("format", pipeline_consts::AUDIO_FORMAT)
                    .field("layout", "interleaved")
                    .field("rate", settings.sample_rate as i32)
                    .field("channels", settings.channels as i32)
                    .build();
                let audio_src = new_appsrc("audio_src", &audio_caps);
                let audio_queue = make("queue")?;
                let audioconvert = make("audioconvert")?;
                let audioresample = make("audioresample")?;

                let chain = [
                    audio_src.upcast_ref(),
                    &audio_queue,
                    &audioconvert,
                    &audioresample,
                    &selected.encoder,
                ];
                pipeline
                    .add_many(chain)
                    .map_err(|e| format!("Failed to add audio elements: {}", e))?;
                gst::Element::link_many(chain)
                    .map_err(|e| format!("Failed to link audio branch: {}", e))?;
                selected
                    .encoder
                    .link(&muxer)
                    .map_err(|_| "Failed to link audio encoder to muxer".to_string())?;
                Some(audio_src)
            }
            _ => None,
        };

        Ok((pipeline, video_src, audio_src))
    }

    fn pipeline_error(&self, wait: Duration) -> Option<WriterError> {
        let bus = self.pipeline.as_ref()?.bus()?;
        let msg = bus.timed_pop_filtered(
            gst::ClockTime::from_nseconds(wait.as_nanos() as u64),
            &[gst::MessageType::Error],
        )?;
        match msg.view() {
            gst::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "Container pipeline error"
                );
                Some(classify_error(&err.error()))
            }
            _ => None,
        }
    }

    fn push(
        &self,
        src: Option<&gst_app::AppSrc>,
        buffer: gst::Buffer,
        media: MediaType,
    ) -> Result<(), WriterError> {
        let src = src.ok_or_else(|| WriterError::Backend(format!("no {} branch", media)))?;
        if let Err(flow) = src.push_buffer(buffer) {
            return Err(self
                .pipeline_error(Duration::ZERO)
                .unwrap_or_else(|| WriterError::Backend(format!("{} push: {:?}", media, flow))));
        }
        match self.pipeline_error(timing::BUS_POLL) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn teardown(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gst::State::Null);
        }
        self.video_src = None;
        self.audio_src = None;
    }
}

impl ContainerSink for GstContainerSink {
    fn open(
        &mut self,
        video: &VideoTrackSettings,
        audio: Option<&AudioTrackSettings>,
    ) -> Result<(), WriterError> {
        let (pipeline, video_src, audio_src) =
            self.build(video, audio).map_err(WriterError::Backend)?;

        self.pipeline = Some(pipeline.clone());
        self.video_src = Some(video_src);
        self.audio_src = audio_src;

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let err = self
                .pipeline_error(Duration::from_millis(100))
                .unwrap_or_else(|| WriterError::Backend(format!("Failed to start: {}", e)));
            self.teardown();
            return Err(err);
        }

        info!(path = %self.path.display(), "Container pipeline playing");
        Ok(())
    }

    fn ready_for(&self, media: MediaType) -> bool {
        let src = match media {
            MediaType::Video => self.video_src.as_ref(),
            MediaType::Audio => self.audio_src.as_ref(),
        };
        src.is_none_or(|src| src.current_level_bytes() < src.max_bytes())
    }

    fn push_video(&mut self, frame: &VideoFrame, timing: SampleTiming) -> Result<(), WriterError> {
        let mut buffer = if frame.row_bytes() == Some(frame.stride) {
            gst::Buffer::from_slice(frame.data.clone())
        } else {
            gst::Buffer::from_mut_slice(frame.packed_rgba().into_owned())
        };
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(clock_time(timing.pts));
            buffer.set_duration(clock_time(timing.duration));
        }
        self.push(self.video_src.as_ref(), buffer, MediaType::Video)
    }

    fn push_audio(&mut self, chunk: &AudioChunk, timing: SampleTiming) -> Result<(), WriterError> {
        let mut buffer = gst::Buffer::from_slice(chunk.data.clone());
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(clock_time(timing.pts));
            buffer.set_duration(clock_time(timing.duration));
        }
        self.push(self.audio_src.as_ref(), buffer, MediaType::Audio)
    }

    fn finish(&mut self, timeout: Duration) -> Result<(), WriterError> {
        let Some(pipeline) = self.pipeline.clone() else {
            return Err(WriterError::Backend("container was never opened".to_string()));
        };

        for src in [self.video_src.as_ref(), self.audio_src.as_ref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = src.end_of_stream() {
                warn!("Failed to send EOS: {:?}", e);
            }
        }

        let result = match pipeline.bus() {
            Some(bus) => {
                match bus.timed_pop_filtered(
                    gst::ClockTime::from_nseconds(timeout.as_nanos() as u64),
                    &[gst::MessageType::Eos, gst::MessageType::Error],
                ) {
                    Some(msg) => match msg.view() {
                        gst::MessageView::Eos(..) => {
                            debug!("Container reached end of stream");
                            Ok(())
                        }
                        gst::MessageView::Error(err) => {
                            error!(
                                error = %err.error(),
                                debug = ?err.debug(),
                                "Error while finalizing container"
                            );
                            Err(classify_error(&err.error()))
                        }
                        _ => Ok(()),
                    },
                    None => Err(WriterError::Backend(format!(
                        "timed out after {:?} waiting for end of stream",
                        timeout
                    ))),
                }
            }
            None => Err(WriterError::Backend("pipeline has no bus".to_string())),
        };

        self.teardown();
        result
    }

    fn abort(&mut self) {
        debug!(path = %self.path.display(), "Aborting container pipeline");
        self.teardown();
    }
}

impl Drop for GstContainerSink {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Default sink factory: GStreamer with the best installed encoder
#[derive(Debug, Default, Clone, Copy)]
pub struct GstSinkFactory;

impl SinkFactory for GstSinkFactory {
    fn file_extension(&self, config: &RecorderConfig) -> String {
        container_extension(config.video_encoder.as_deref()).to_string()
    }

    fn create(
        &self,
        path: &Path,
        _config: &RecorderConfig,
    ) -> Result<Box<dyn ContainerSink>, WriterError> {
        Ok(Box::new(GstContainerSink::new(path)?))
    }
}

fn make(factory: &str) -> Result<gst::Element, String> {
    gst::ElementFactory::make(factory)
        .build()
        .map_err(|e| format!("Failed to create {}: {}", factory, e))
}

fn new_appsrc(name: &str, caps: &gst::Caps) -> gst_app::AppSrc {
    gst_app::AppSrc::builder()
        .name(name)
        .caps(caps)
        .format(gst::Format::Time)
        .is_live(false)
        .block(false)
        .max_bytes(pipeline_consts::APPSRC_MAX_BYTES)
        .build()
}

fn clock_time(duration: Duration) -> gst::ClockTime {
    gst::ClockTime::from_nseconds(duration.as_nanos() as u64)
}

/// Map a GStreamer error onto the writer taxonomy
fn classify_error(err: &gst::glib::Error) -> WriterError {
    match err.kind::<gst::ResourceError>() {
        Some(gst::ResourceError::NoSpaceLeft) => WriterError::StorageFull(err.to_string()),
        Some(gst::ResourceError::OpenWrite)
        | Some(gst::ResourceError::OpenReadWrite)
        | Some(gst::ResourceError::Write)
        | Some(gst::ResourceError::NotFound) => WriterError::Io(err.to_string()),
        _ => WriterError::Backend(err.to_string()),
    }
}
