// SPDX-License-Identifier: GPL-3.0-only

//! Recording controller
//!
//! `VideoRecorder` owns the lifecycle state machine and routes every
//! delivered sample through the offset ledger, the frame processor and the
//! media writer:
//!
//! ```text
//! Idle -> Starting -> Recording <-> Paused
//!                         |
//!                         v
//!                      Ending -> Finished | Failed
//! (Starting | Recording | Paused | Ending) -> Cancelled -> Idle
//! ```
//!
//! All state lives behind one mutex. A sample is handled start to finish
//! under that lock, so a pause can never land between reading the pause
//! offset and writing the sample. Delegate callbacks (except the pixel
//! buffer override) run after the lock is released. Finalize runs on its
//! own thread; a new session cannot start until it has resolved.

use super::delegate::{DropReason, NoopDelegate, RecorderDelegate, VideoResult};
use super::muxer::GstSinkFactory;
use super::photo::PhotoResult;
use super::processor::{FrameProcessor, FrameTransform};
use super::session::{RecorderState, RecordingSession};
use super::thumbnail::{Thumbnail, ThumbnailExtractor, extract_thumbnail_from_file};
use super::writer::{
    AudioTrackSettings, MediaWriter, SinkFactory, TrackSettings, VideoTrackSettings,
    WriterSummary, remove_output,
};
use crate::config::RecorderConfig;
use crate::constants::timing;
use crate::errors::{RecorderError, ThumbnailError, WriterError};
use crate::media::{AudioChunk, AudioSample, MediaType, SampleTiming, VideoFrame, VideoSample};
use crate::storage;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Source of wall-clock time for pause accounting
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Finished(VideoResult),
    /// `partial` is present when anything was written before the failure
    Failed {
        partial: Option<VideoResult>,
        error: RecorderError,
    },
    Cancelled,
}

impl CaptureOutcome {
    /// The result payload, complete or partial
    pub fn result(&self) -> Option<&VideoResult> {
        match self {
            CaptureOutcome::Finished(result) => Some(result),
            CaptureOutcome::Failed { partial, .. } => partial.as_ref(),
            CaptureOutcome::Cancelled => None,
        }
    }

    pub fn error(&self) -> Option<&RecorderError> {
        match self {
            CaptureOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Handle on the completion of a session that is ending
#[derive(Debug)]
pub struct CaptureCompletion {
    receiver: oneshot::Receiver<CaptureOutcome>,
}

impl CaptureCompletion {
    /// Block until the session resolves
    ///
    /// Must not be called from within an async runtime; use
    /// [`into_receiver`](Self::into_receiver) there.
    pub fn wait(self) -> CaptureOutcome {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| CaptureOutcome::Failed {
                partial: None,
                error: RecorderError::Unknown("recorder dropped before completion".to_string()),
            })
    }

    pub fn into_receiver(self) -> oneshot::Receiver<CaptureOutcome> {
        self.receiver
    }
}

/// Writer state for the session in flight
struct ActiveSession {
    info: RecordingSession,
    /// `None` once handed to the finalize thread
    writer: Option<MediaWriter>,
    processor: FrameProcessor,
    thumbnails: ThumbnailExtractor,
    completion: Option<oneshot::Sender<CaptureOutcome>>,
    /// Error that ended the session early
    failure: Option<RecorderError>,
    /// Cancelled while finalizing
    cancelled: bool,
    video_frames: u64,
    audio_chunks: u64,
}

impl ActiveSession {
    fn result(&self, config: &RecorderConfig, video_secs: f64, audio_secs: f64) -> VideoResult {
        let (thumbnail, thumbnails) = if config.thumbnail_enabled {
            (self.thumbnails.first().cloned(), self.thumbnails.history())
        } else {
            (None, Vec::new())
        };
        VideoResult {
            path: self.info.path.clone(),
            thumbnail,
            thumbnails,
            captured_duration_secs: video_secs,
            captured_audio_secs: audio_secs,
        }
    }
}

struct Inner {
    state: RecorderState,
    config: RecorderConfig,
    session: Option<ActiveSession>,
    completion: Option<oneshot::Receiver<CaptureOutcome>>,
    transforms: Vec<Arc<dyn FrameTransform>>,
    /// Completions handed to the delegate but not yet returned
    pending_deliveries: usize,
    last_video: Duration,
    last_audio: Duration,
    last_offset: Duration,
    last_path: Option<PathBuf>,
    last_thumbnails: Option<ThumbnailExtractor>,
}

impl Inner {
    fn ensure_can_start(&self) -> Result<(), RecorderError> {
        if self.state.is_settled() && self.session.is_none() {
            Ok(())
        } else {
            Err(RecorderError::Busy(self.state))
        }
    }
}

enum Event {
    DidStart,
    DidPause,
    DidResume,
    DidEnd,
    VideoWritten(VideoSample),
    AudioWritten(AudioSample),
    Dropped(MediaType, DropReason),
}

struct FinalizeJob {
    writer: MediaWriter,
    timeout: Duration,
}

/// Work produced under the lock and carried out after it is released
#[derive(Default)]
struct Effects {
    events: Vec<Event>,
    finalize: Option<FinalizeJob>,
}

impl Effects {
    fn dropped(&mut self, media: MediaType, reason: DropReason) {
        self.events.push(Event::Dropped(media, reason));
    }
}

/// What to do after a sample was handled
enum Follow {
    Continue,
    End,
    Fail(WriterError),
}

/// Outcome of the track-configuration step while starting
enum Prepared {
    Proceed,
    Hold,
    Fail(WriterError),
}

struct Shared {
    inner: Mutex<Inner>,
    idle: Condvar,
    delegate: Arc<dyn RecorderDelegate>,
    clock: Arc<dyn Clock>,
    sinks: Arc<dyn SinkFactory>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(self: &Arc<Self>, effects: Effects) {
        for event in effects.events {
            match event {
                Event::DidStart => self.delegate.did_start_video_capture(),
                Event::DidPause => self.delegate.did_pause_video_capture(),
                Event::DidResume => self.delegate.did_resume_video_capture(),
                Event::DidEnd => self.delegate.did_end_video_capture(),
                Event::VideoWritten(sample) => self.delegate.did_capture_video_sample(&sample),
                Event::AudioWritten(sample) => self.delegate.did_capture_audio_sample(&sample),
                Event::Dropped(media, reason) => self.delegate.did_drop_sample(media, reason),
            }
        }
        if let Some(job) = effects.finalize {
            self.spawn_finalize(job);
        }
    }

    fn spawn_finalize(self: &Arc<Self>, job: FinalizeJob) {
        let shared = Arc::clone(self);
        if let Err(e) = job
            .writer
            .finalize_with(job.timeout, move |result| shared.complete(result))
        {
            error!(error = %e, "Failed to spawn finalize thread");
            self.complete(Err(WriterError::Backend(format!(
                "failed to spawn finalize thread: {}",
                e
            ))));
        }
    }

    /// Hand the writer to the finalize thread and stop accepting samples
    fn begin_finalize(inner: &mut Inner, failure: Option<RecorderError>, fx: &mut Effects) {
        let Some(active) = inner.session.as_mut() else {
            return;
        };
        let Some(writer) = active.writer.take() else {
            return;
        };

        match &failure {
            Some(error) => {
                error!(
                    session_id = %active.info.id,
                    error = %error,
                    "Recording failed, finalizing what was written"
                );
                inner.state = RecorderState::Failed;
            }
            None => {
                info!(
                    session_id = %active.info.id,
                    captured_secs = active.info.captured_video().as_secs_f64(),
                    "Recording ending"
                );
                inner.state = RecorderState::Ending;
                fx.events.push(Event::DidEnd);
            }
        }
        active.failure = failure;
        fx.finalize = Some(FinalizeJob {
            writer,
            timeout: inner.config.finalize_timeout(),
        });
    }

    fn follow(inner: &mut Inner, follow: Follow, fx: &mut Effects) {
        match follow {
            Follow::Continue => {}
            Follow::End => Self::begin_finalize(inner, None, fx),
            Follow::Fail(err) => Self::begin_finalize(inner, Some(err.into()), fx),
        }
    }

    /// Finalize finished (or failed); resolve the session
    fn complete(&self, result: Result<WriterSummary, WriterError>) {
        let (sender, outcome) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let Some(mut active) = inner.session.take() else {
                return;
            };
            let path = active.info.path.clone();
            inner.last_video = active.info.captured_video();
            inner.last_audio = active.info.captured_audio();
            inner.last_offset = active.info.ledger.cumulative();

            let outcome = if active.cancelled {
                remove_output(&path);
                info!(session_id = %active.info.id, "Recording cancelled while finalizing");
                CaptureOutcome::Cancelled
            } else {
                let partial = |active: &ActiveSession, config: &RecorderConfig| {
                    (active.video_frames > 0 && path.exists()).then(|| {
                        active.result(
                            config,
                            active.info.captured_video().as_secs_f64(),
                            active.info.captured_audio().as_secs_f64(),
                        )
                    })
                };

                let outcome = match (active.failure.take(), result) {
                    (None, Ok(summary)) => CaptureOutcome::Finished(active.result(
                        &inner.config,
                        summary.video_seconds,
                        summary.audio_seconds,
                    )),
                    (Some(error), Ok(summary)) => CaptureOutcome::Failed {
                        partial: Some(active.result(
                            &inner.config,
                            summary.video_seconds,
                            summary.audio_seconds,
                        )),
                        error,
                    },
                    (Some(error), Err(_)) => CaptureOutcome::Failed {
                        partial: partial(&active, &inner.config),
                        error,
                    },
                    (None, Err(e)) => CaptureOutcome::Failed {
                        partial: partial(&active, &inner.config),
                        error: e.into(),
                    },
                };

                match &outcome {
                    CaptureOutcome::Finished(result) => {
                        inner.state = RecorderState::Finished;
                        info!(
                            session_id = %active.info.id,
                            path = %result.path.display(),
                            captured_secs = result.captured_duration_secs,
                            length = %storage::format_video_length(result.captured_duration_secs),
                            "Recording saved"
                        );
                    }
                    _ => {
                        inner.state = RecorderState::Failed;
                        warn!(
                            session_id = %active.info.id,
                            error = ?outcome.error(),
                            "Recording failed"
                        );
                    }
                }
                if path.exists() {
                    inner.last_path = Some(path);
                }
                outcome
            };

            let sender = active.completion.take();
            inner.last_thumbnails = Some(active.thumbnails);
            inner.pending_deliveries += 1;
            (sender, outcome)
        };

        self.deliver(sender, outcome);
    }

    /// Report a resolved session to the delegate and the completion handle
    ///
    /// A delivered cancellation returns the recorder to `Idle`.
    fn deliver(&self, sender: Option<oneshot::Sender<CaptureOutcome>>, outcome: CaptureOutcome) {
        let cancelled = matches!(outcome, CaptureOutcome::Cancelled);
        match &outcome {
            CaptureOutcome::Finished(result) => self.delegate.captured_video(Some(result), None),
            CaptureOutcome::Failed { partial, error } => {
                self.delegate.captured_video(partial.as_ref(), Some(error))
            }
            CaptureOutcome::Cancelled => self.delegate.captured_video(None, None),
        }
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }

        let mut inner = self.lock();
        inner.pending_deliveries = inner.pending_deliveries.saturating_sub(1);
        if cancelled && inner.state == RecorderState::Cancelled && inner.session.is_none() {
            inner.state = RecorderState::Idle;
        }
        drop(inner);
        self.idle.notify_all();
    }

    /// Configure the video track from the first frame
    fn prepare_video(inner: &mut Inner, frame: &VideoFrame, fx: &mut Effects) -> Prepared {
        let Some(active) = inner.session.as_mut() else {
            return Prepared::Hold;
        };
        let Some(writer) = active.writer.as_mut() else {
            return Prepared::Hold;
        };

        if !writer.video_configured() {
            if frame.validate().is_err() {
                fx.dropped(MediaType::Video, DropReason::InvalidSample);
                return Prepared::Hold;
            }
            let settings = VideoTrackSettings::from_config(&inner.config, frame.width, frame.height);
            if let Err(e) = writer.configure(TrackSettings::Video(settings)) {
                return Prepared::Fail(e);
            }
        }

        if writer.is_configured() {
            info!(
                session_id = %active.info.id,
                width = frame.width,
                height = frame.height,
                "Recording started"
            );
            inner.state = RecorderState::Recording;
            fx.events.push(Event::DidStart);
            Prepared::Proceed
        } else {
            fx.dropped(MediaType::Video, DropReason::NotReady);
            Prepared::Hold
        }
    }

    /// Configure the audio track from the first chunk
    fn prepare_audio(inner: &mut Inner, chunk: &AudioChunk, fx: &mut Effects) -> Prepared {
        let Some(active) = inner.session.as_mut() else {
            return Prepared::Hold;
        };
        let Some(writer) = active.writer.as_mut() else {
            return Prepared::Hold;
        };

        if !writer.audio_configured() {
            let settings = AudioTrackSettings {
                sample_rate: chunk.sample_rate,
                channels: chunk.channels,
                quality: inner.config.audio_quality,
            };
            if let Err(e) = writer.configure(TrackSettings::Audio(settings)) {
                return Prepared::Fail(e);
            }
        }

        if writer.is_configured() {
            info!(
                session_id = %active.info.id,
                sample_rate = chunk.sample_rate,
                channels = chunk.channels,
                "Recording started"
            );
            inner.state = RecorderState::Recording;
            fx.events.push(Event::DidStart);
            Prepared::Proceed
        } else {
            fx.dropped(MediaType::Audio, DropReason::NotReady);
            Prepared::Hold
        }
    }

    fn handle_video(&self, inner: &mut Inner, sample: VideoSample, fx: &mut Effects) {
        let VideoSample { frame, timing } = sample;

        if inner.state == RecorderState::Starting {
            match Self::prepare_video(inner, &frame, fx) {
                Prepared::Proceed => {}
                Prepared::Hold => return,
                Prepared::Fail(e) => return Self::follow(inner, Follow::Fail(e), fx),
            }
        }
        if inner.state != RecorderState::Recording {
            fx.dropped(MediaType::Video, DropReason::NotRecording);
            return;
        }

        let follow = self.write_video(inner, frame, timing, fx);
        Self::follow(inner, follow, fx);
    }

    fn write_video(
        &self,
        inner: &mut Inner,
        frame: VideoFrame,
        timing: SampleTiming,
        fx: &mut Effects,
    ) -> Follow {
        let Some(active) = inner.session.as_mut() else {
            fx.dropped(MediaType::Video, DropReason::NotRecording);
            return Follow::Continue;
        };
        let Some(writer) = active.writer.as_mut() else {
            fx.dropped(MediaType::Video, DropReason::NotRecording);
            return Follow::Continue;
        };

        if frame.validate().is_err() {
            fx.dropped(MediaType::Video, DropReason::InvalidSample);
            return Follow::Continue;
        }
        let Some(output) = active.info.ledger.apply(timing) else {
            fx.dropped(MediaType::Video, DropReason::OutOfOrder);
            return Follow::Continue;
        };
        if let Some(position) = writer.position_of(output.pts)
            && active.info.exceeds_maximum(position)
        {
            fx.dropped(MediaType::Video, DropReason::BeyondMaximumDuration);
            return Follow::End;
        }
        if !writer.video_ready() {
            fx.dropped(MediaType::Video, DropReason::Backpressure);
            return Follow::Continue;
        }

        let frame = active.processor.process(frame);
        let frame = self.delegate.will_render_and_write_pixel_buffer(frame);

        match writer.write_video(&frame, output) {
            Ok(written) => {
                active.info.note_video(writer.video_timestamp());
                active.thumbnails.record(&frame, written.pts);
                active.video_frames += 1;
                if active.video_frames % timing::FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        session_id = %active.info.id,
                        frames = active.video_frames,
                        captured_secs = active.info.captured_video().as_secs_f64(),
                        "Video frames written"
                    );
                }
                fx.events
                    .push(Event::VideoWritten(VideoSample::new(frame, written)));

                if active.info.reached_maximum() {
                    Follow::End
                } else {
                    Follow::Continue
                }
            }
            Err(e) if e.is_fatal() => Follow::Fail(e),
            Err(e) => {
                debug!(error = %e, "Video sample dropped");
                fx.dropped(MediaType::Video, drop_reason(&e));
                Follow::Continue
            }
        }
    }

    fn handle_audio(&self, inner: &mut Inner, sample: AudioSample, fx: &mut Effects) {
        if !inner.config.audio_capture_enabled {
            return;
        }
        let AudioSample { chunk, timing } = sample;

        if inner.state == RecorderState::Starting {
            match Self::prepare_audio(inner, &chunk, fx) {
                Prepared::Proceed => {}
                Prepared::Hold => return,
                Prepared::Fail(e) => return Self::follow(inner, Follow::Fail(e), fx),
            }
        }
        if inner.state != RecorderState::Recording {
            fx.dropped(MediaType::Audio, DropReason::NotRecording);
            return;
        }

        let follow = Self::write_audio(inner, chunk, timing, fx);
        Self::follow(inner, follow, fx);
    }

    fn write_audio(
        inner: &mut Inner,
        chunk: AudioChunk,
        timing: SampleTiming,
        fx: &mut Effects,
    ) -> Follow {
        let Some(active) = inner.session.as_mut() else {
            fx.dropped(MediaType::Audio, DropReason::NotRecording);
            return Follow::Continue;
        };
        let Some(writer) = active.writer.as_mut() else {
            fx.dropped(MediaType::Audio, DropReason::NotRecording);
            return Follow::Continue;
        };

        let Some(output) = active.info.ledger.apply(timing) else {
            fx.dropped(MediaType::Audio, DropReason::OutOfOrder);
            return Follow::Continue;
        };
        if let Some(position) = writer.position_of(output.pts)
            && active.info.exceeds_maximum(position)
        {
            fx.dropped(MediaType::Audio, DropReason::BeyondMaximumDuration);
            return Follow::End;
        }

        match writer.write_audio(&chunk, output) {
            Ok(written) => {
                active.info.note_audio(writer.audio_timestamp());
                active.audio_chunks += 1;
                fx.events
                    .push(Event::AudioWritten(AudioSample::new(chunk, written)));

                if active.info.reached_maximum() {
                    Follow::End
                } else {
                    Follow::Continue
                }
            }
            Err(e) if e.is_fatal() => Follow::Fail(e),
            Err(e) => {
                debug!(error = %e, "Audio sample dropped");
                fx.dropped(MediaType::Audio, drop_reason(&e));
                Follow::Continue
            }
        }
    }
}

fn drop_reason(err: &WriterError) -> DropReason {
    match err {
        WriterError::OutOfOrder { .. } => DropReason::OutOfOrder,
        WriterError::Backpressure(_) => DropReason::Backpressure,
        WriterError::TrackNotReady(_) => DropReason::NotReady,
        WriterError::Finalized | WriterError::AlreadyFinalized => DropReason::NotRecording,
        _ => DropReason::WriteFailed,
    }
}

/// Camera recording controller
///
/// Cheap to clone; clones share one session. Sample delivery
/// ([`append_video_sample`](Self::append_video_sample),
/// [`append_audio_sample`](Self::append_audio_sample)) may come from
/// capture threads while lifecycle calls come from elsewhere.
#[derive(Clone)]
pub struct VideoRecorder {
    shared: Arc<Shared>,
}

impl VideoRecorder {
    pub fn new(
        config: RecorderConfig,
        delegate: Arc<dyn RecorderDelegate>,
        sinks: Arc<dyn SinkFactory>,
    ) -> Self {
        Self::with_clock(config, delegate, sinks, Arc::new(SystemClock))
    }

    /// Recorder writing through GStreamer, without a delegate
    pub fn with_defaults(config: RecorderConfig) -> Self {
        Self::new(config, Arc::new(NoopDelegate), Arc::new(GstSinkFactory))
    }

    pub fn with_clock(
        config: RecorderConfig,
        delegate: Arc<dyn RecorderDelegate>,
        sinks: Arc<dyn SinkFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: RecorderState::Idle,
                    config,
                    session: None,
                    completion: None,
                    transforms: Vec::new(),
                    pending_deliveries: 0,
                    last_video: Duration::ZERO,
                    last_audio: Duration::ZERO,
                    last_offset: Duration::ZERO,
                    last_path: None,
                    last_thumbnails: None,
                }),
                idle: Condvar::new(),
                delegate,
                clock,
                sinks,
            }),
        }
    }

    pub fn config(&self) -> RecorderConfig {
        self.shared.lock().config.clone()
    }

    /// Replace the configuration; only between sessions
    pub fn set_config(&self, config: RecorderConfig) -> Result<(), RecorderError> {
        let mut inner = self.shared.lock();
        inner.ensure_can_start()?;
        inner.config = config;
        Ok(())
    }

    /// Add a frame stage applied after the filter, for this and later sessions
    pub fn add_frame_transform(&self, transform: Arc<dyn FrameTransform>) {
        let mut inner = self.shared.lock();
        if let Some(active) = inner.session.as_mut() {
            active.processor.add_transform(Arc::clone(&transform));
        }
        inner.transforms.push(transform);
    }

    /// Start recording to a generated file in the capture directory
    pub fn start_video_capture(&self) -> Result<PathBuf, RecorderError> {
        let config = {
            let inner = self.shared.lock();
            inner.ensure_can_start()?;
            inner.config.clone()
        };

        let directory = &config.capture_directory;
        std::fs::create_dir_all(directory).map_err(|e| {
            RecorderError::BadOutputFile(format!("{}: {}", directory.display(), e))
        })?;

        let extension = self.shared.sinks.file_extension(&config);
        let generated = storage::generate_file_name(&extension, chrono::Local::now());
        let file_name = self.shared.delegate.will_start_video_capture_to_file(&generated);
        if file_name.is_empty() {
            return Err(RecorderError::BadOutputFile("empty file name".to_string()));
        }

        self.start_video_capture_to(directory.join(file_name))
    }

    /// Start recording to `path`
    ///
    /// The destination is validated before anything changes; on failure the
    /// recorder stays in its current state, no writer is created and an
    /// existing file is left in place. GPU filter setup happens here, before
    /// any sample is accepted.
    pub fn start_video_capture_to(&self, path: impl Into<PathBuf>) -> Result<PathBuf, RecorderError> {
        let path = path.into();
        let config = {
            let inner = self.shared.lock();
            inner.ensure_can_start()?;
            inner.config.clone()
        };

        storage::validate_destination(
            &path,
            config.overwrite_existing,
            config.minimum_free_disk_bytes,
        )?;

        self.shared.delegate.will_start_video_capture();

        let sink = self.shared.sinks.create(&path, &config).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to create container sink");
            RecorderError::BadOutputFile(e.to_string())
        })?;
        let mut processor = FrameProcessor::prepare(config.filter, config.processor_backend);

        let mut inner = self.shared.lock();
        inner.ensure_can_start()?;
        if config.overwrite_existing && path.exists() {
            storage::replace_existing(&path)?;
        }

        let info = RecordingSession::new(
            path.clone(),
            self.shared.clock.now(),
            config.maximum_capture_duration(),
        );
        for transform in &inner.transforms {
            processor.add_transform(Arc::clone(transform));
        }
        let thumbnails = ThumbnailExtractor::new(
            config.thumbnail_enabled,
            config.thumbnail_interval(),
            config.thumbnail_history_limit,
            config.video_frame_rate,
        );
        let (sender, receiver) = oneshot::channel();

        info!(
            session_id = %info.id,
            path = %path.display(),
            audio = config.audio_capture_enabled,
            filter = %config.filter,
            max_secs = ?config.maximum_capture_duration_secs,
            "Recording session starting"
        );

        inner.session = Some(ActiveSession {
            info,
            writer: Some(MediaWriter::new(
                path.clone(),
                sink,
                config.audio_capture_enabled,
            )),
            processor,
            thumbnails,
            completion: Some(sender),
            failure: None,
            cancelled: false,
            video_frames: 0,
            audio_chunks: 0,
        });
        inner.completion = Some(receiver);
        inner.state = RecorderState::Starting;
        inner.config = config;
        inner.last_video = Duration::ZERO;
        inner.last_audio = Duration::ZERO;
        inner.last_offset = Duration::ZERO;
        inner.last_path = None;
        inner.last_thumbnails = None;

        Ok(path)
    }

    /// Stop writing samples until resumed; no-op unless recording
    pub fn pause_video_capture(&self) {
        let now = self.shared.clock.now();
        let mut fx = Effects::default();
        {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            match (inner.state, inner.session.as_mut()) {
                (RecorderState::Recording, Some(active)) => {
                    active.info.ledger.pause(now);
                    inner.state = RecorderState::Paused;
                    fx.events.push(Event::DidPause);
                    info!(
                        session_id = %active.info.id,
                        captured_secs = active.info.captured_video().as_secs_f64(),
                        "Recording paused"
                    );
                }
                (state, _) => debug!(?state, "Pause ignored"),
            }
        }
        self.shared.flush(fx);
    }

    /// Continue after a pause; the paused interval is removed from the timeline
    pub fn resume_video_capture(&self) {
        let now = self.shared.clock.now();
        let mut fx = Effects::default();
        {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            match (inner.state, inner.session.as_mut()) {
                (RecorderState::Paused, Some(active)) => {
                    let interval = active.info.ledger.resume(now).unwrap_or_default();
                    inner.state = RecorderState::Recording;
                    fx.events.push(Event::DidResume);
                    info!(
                        session_id = %active.info.id,
                        paused_secs = interval.as_secs_f64(),
                        offset_secs = active.info.ledger.cumulative().as_secs_f64(),
                        "Recording resumed"
                    );
                }
                (state, _) => debug!(?state, "Resume ignored"),
            }
        }
        self.shared.flush(fx);
    }

    /// Stop accepting samples and finalize the file
    ///
    /// Also hands out the completion of a session that ended on its own
    /// (maximum duration, writer failure, cancel) if nobody has taken it yet.
    pub fn end_video_capture(&self) -> Result<CaptureCompletion, RecorderError> {
        let mut fx = Effects::default();
        let receiver = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            if inner.state.is_active() {
                Shared::begin_finalize(inner, None, &mut fx);
            }
            let receiver = match inner.state {
                RecorderState::Idle
                | RecorderState::Ending
                | RecorderState::Finished
                | RecorderState::Failed
                | RecorderState::Cancelled => inner.completion.take(),
                _ => None,
            };
            receiver.ok_or(RecorderError::Busy(inner.state))?
        };
        self.shared.flush(fx);
        Ok(CaptureCompletion { receiver })
    }

    /// Abort the session and discard the output
    ///
    /// The recorder is back in `Idle` when this returns. A session that is
    /// already finalizing stays `Cancelled` until the finalize thread
    /// returns; it then resolves as cancelled, its file is removed and the
    /// state returns to `Idle`.
    pub fn cancel_video_capture(&self) -> Result<(), RecorderError> {
        let sender = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            match inner.state {
                RecorderState::Starting | RecorderState::Recording | RecorderState::Paused => {
                    inner.state = RecorderState::Cancelled;
                    let Some(mut active) = inner.session.take() else {
                        return Ok(());
                    };
                    if let Some(mut writer) = active.writer.take() {
                        writer.abort();
                    }
                    inner.last_video = active.info.captured_video();
                    inner.last_audio = active.info.captured_audio();
                    inner.last_offset = active.info.ledger.cumulative();
                    inner.pending_deliveries += 1;
                    info!(
                        session_id = %active.info.id,
                        frames = active.video_frames,
                        audio_chunks = active.audio_chunks,
                        "Recording cancelled"
                    );
                    active.completion.take()
                }
                RecorderState::Ending => {
                    inner.state = RecorderState::Cancelled;
                    if let Some(active) = inner.session.as_mut() {
                        active.cancelled = true;
                        info!(session_id = %active.info.id, "Cancel requested while finalizing");
                    }
                    return Ok(());
                }
                state => return Err(RecorderError::Busy(state)),
            }
        };

        self.shared.deliver(sender, CaptureOutcome::Cancelled);
        Ok(())
    }

    /// Deliver a captured video frame; never blocks on the encoder
    pub fn append_video_sample(&self, sample: VideoSample) {
        let mut fx = Effects::default();
        {
            let mut guard = self.shared.lock();
            self.shared.handle_video(&mut guard, sample, &mut fx);
        }
        self.shared.flush(fx);
    }

    /// Deliver captured audio; never blocks on the encoder
    pub fn append_audio_sample(&self, sample: AudioSample) {
        let mut fx = Effects::default();
        {
            let mut guard = self.shared.lock();
            self.shared.handle_audio(&mut guard, sample, &mut fx);
        }
        self.shared.flush(fx);
    }

    pub fn state(&self) -> RecorderState {
        self.shared.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.state() == RecorderState::Paused
    }

    /// Identifier of the session in flight
    pub fn session_id(&self) -> Option<Uuid> {
        self.shared.lock().session.as_ref().map(|a| a.info.id)
    }

    /// Destination of the session in flight
    pub fn output_path(&self) -> Option<PathBuf> {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|a| a.info.path.clone())
    }

    /// Highest video timestamp written in the current (or last) session
    pub fn captured_video_seconds(&self) -> f64 {
        let inner = self.shared.lock();
        inner
            .session
            .as_ref()
            .map_or(inner.last_video, |a| a.info.captured_video())
            .as_secs_f64()
    }

    /// Highest audio timestamp written in the current (or last) session
    pub fn captured_audio_seconds(&self) -> f64 {
        let inner = self.shared.lock();
        inner
            .session
            .as_ref()
            .map_or(inner.last_audio, |a| a.info.captured_audio())
            .as_secs_f64()
    }

    /// Total paused time removed from the timeline so far
    pub fn cumulative_pause_offset(&self) -> Duration {
        let inner = self.shared.lock();
        inner
            .session
            .as_ref()
            .map_or(inner.last_offset, |a| a.info.ledger.cumulative())
    }

    /// Most recently written frame, full size
    pub fn capture_current_video_thumbnail(&self) -> Result<Thumbnail, ThumbnailError> {
        let inner = self.shared.lock();
        match (&inner.session, &inner.last_thumbnails) {
            (Some(active), _) => active.thumbnails.current(),
            (None, Some(extractor)) => extractor.current(),
            (None, None) => Err(ThumbnailError::NoFrameAvailable),
        }
    }

    /// Take a still from the live recording
    ///
    /// Uses the last frame written to the file. Only a recording or paused
    /// session can supply one; otherwise the error is `Busy`. The delegate
    /// sees `will_capture_photo` and then exactly one `captured_photo`.
    pub fn capture_video_frame_as_photo(&self) -> Result<PhotoResult, RecorderError> {
        self.shared.delegate.will_capture_photo();

        let grabbed = {
            let inner = self.shared.lock();
            match (inner.state, &inner.session) {
                (RecorderState::Recording | RecorderState::Paused, Some(active)) => active
                    .thumbnails
                    .latest()
                    .map(|(frame, timestamp)| (frame.clone(), timestamp, active.info.id))
                    .ok_or_else(|| {
                        RecorderError::CaptureFailed("no frame has been written yet".to_string())
                    }),
                (state, _) => Err(RecorderError::Busy(state)),
            }
        };

        let result = grabbed.and_then(|(frame, timestamp, session_id)| {
            PhotoResult::from_frame(&frame, timestamp, session_id)
        });
        match &result {
            Ok(photo) => {
                info!(
                    session_id = %photo.metadata.session_id,
                    timestamp_secs = photo.metadata.timestamp.as_secs_f64(),
                    jpeg_bytes = photo.jpeg.len(),
                    "Photo captured from recording"
                );
                self.shared.delegate.captured_photo(Some(photo), None);
            }
            Err(error) => {
                warn!(error = %error, "Photo capture failed");
                self.shared.delegate.captured_photo(None, Some(error));
            }
        }
        result
    }

    /// Frame at or before `seconds` on the output timeline
    ///
    /// In flight this reads the side buffer; after a successful finish it
    /// seeks the file, falling back to the side buffer.
    pub fn capture_video_thumbnail_at_time(&self, seconds: f64) -> Result<Thumbnail, ThumbnailError> {
        if !(seconds.is_finite() && seconds >= 0.0) {
            return Err(ThumbnailError::NoFrameAvailable);
        }
        let time = Duration::from_secs_f64(seconds);

        let path = {
            let inner = self.shared.lock();
            if let Some(active) = &inner.session {
                return active.thumbnails.at_time(time);
            }
            inner.last_path.clone()
        };

        if let Some(path) = path
            && let Ok(thumbnail) = extract_thumbnail_from_file(&path, seconds)
        {
            return Ok(thumbnail);
        }

        let inner = self.shared.lock();
        inner
            .last_thumbnails
            .as_ref()
            .ok_or(ThumbnailError::NoFrameAvailable)?
            .at_time(time)
    }

    /// Frame at or before `index / video_frame_rate`
    pub fn capture_video_thumbnail_at_frame(&self, index: u64) -> Result<Thumbnail, ThumbnailError> {
        let frame_rate = self.shared.lock().config.video_frame_rate.max(1);
        self.capture_video_thumbnail_at_time(index as f64 / frame_rate as f64)
    }

    /// Wait until no session is in flight and every completion was delivered
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.lock();
        loop {
            if inner.session.is_none() && inner.pending_deliveries == 0 {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            inner = match self.shared.idle.wait_timeout(inner, remaining) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
    }
}

impl std::fmt::Debug for VideoRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("VideoRecorder")
            .field("state", &inner.state)
            .field("session", &inner.session.as_ref().map(|a| a.info.id))
            .finish()
    }
}
