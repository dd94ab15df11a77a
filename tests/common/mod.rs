// SPDX-License-Identifier: GPL-3.0-only

//! Shared fixtures for integration tests
//!
//! An in-memory container sink that records what it was given, a manual
//! clock, and a delegate that logs every callback.

#![allow(dead_code)]

use camera_recorder::media::{AudioChunk, MediaType, SampleTiming, VideoFrame};
use camera_recorder::pipelines::video::{
    AudioTrackSettings, Clock, ContainerSink, DropReason, RecorderDelegate, SinkFactory,
    VideoRecorder, VideoResult, VideoTrackSettings,
};
use camera_recorder::{
    AudioSample, PhotoResult, RecorderConfig, RecorderError, VideoSample, WriterError,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Nominal 30fps frame interval
pub const FRAME: Duration = Duration::from_nanos(33_333_333);

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

/// What a [`MemorySink`] was asked to do
#[derive(Debug, Default)]
pub struct SinkLog {
    pub opened: bool,
    pub audio_track: bool,
    pub video: Vec<Duration>,
    pub audio: Vec<Duration>,
    pub finished: bool,
    pub aborted: bool,
}

/// Failures injected into the sinks a [`MemorySinkFactory`] hands out
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// `create` fails
    pub create: bool,
    /// `push_video` reports a full disk once this many frames were taken
    pub storage_full_after: Option<usize>,
    /// `finish` fails to seal the container
    pub finish: bool,
}

/// Container sink that keeps timestamps in memory
///
/// `open` writes a placeholder file so removal of partial output can be
/// observed. `finish` waits on the gate, when one is set.
pub struct MemorySink {
    path: PathBuf,
    log: Arc<Mutex<SinkLog>>,
    gate: Option<Arc<Mutex<mpsc::Receiver<()>>>>,
    faults: Faults,
}

impl ContainerSink for MemorySink {
    fn open(
        &mut self,
        _video: &VideoTrackSettings,
        audio: Option<&AudioTrackSettings>,
    ) -> Result<(), WriterError> {
        std::fs::write(&self.path, b"placeholder")?;
        let mut log = self.log.lock().unwrap();
        log.opened = true;
        log.audio_track = audio.is_some();
        Ok(())
    }

    fn push_video(&mut self, _frame: &VideoFrame, timing: SampleTiming) -> Result<(), WriterError> {
        let mut log = self.log.lock().unwrap();
        if self
            .faults
            .storage_full_after
            .is_some_and(|limit| log.video.len() >= limit)
        {
            return Err(WriterError::StorageFull("no space left on device".to_string()));
        }
        log.video.push(timing.pts);
        Ok(())
    }

    fn push_audio(&mut self, _chunk: &AudioChunk, timing: SampleTiming) -> Result<(), WriterError> {
        self.log.lock().unwrap().audio.push(timing.pts);
        Ok(())
    }

    fn finish(&mut self, _timeout: Duration) -> Result<(), WriterError> {
        if let Some(gate) = &self.gate {
            let _ = gate.lock().unwrap().recv_timeout(Duration::from_secs(5));
        }
        if self.faults.finish {
            return Err(WriterError::Backend("muxer failed to write the index".to_string()));
        }
        self.log.lock().unwrap().finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.log.lock().unwrap().aborted = true;
    }
}

/// Factory handing out [`MemorySink`]s that share one log
#[derive(Default)]
pub struct MemorySinkFactory {
    pub log: Arc<Mutex<SinkLog>>,
    pub created: Mutex<usize>,
    pub faults: Mutex<Faults>,
    gate: Mutex<Option<Arc<Mutex<mpsc::Receiver<()>>>>>,
}

impl MemorySinkFactory {
    /// Make `finish` block until the returned sender fires
    pub fn gated(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(Arc::new(Mutex::new(rx)));
        tx
    }

    /// Change the failures of sinks created from now on
    pub fn inject(&self, update: impl FnOnce(&mut Faults)) {
        update(&mut self.faults.lock().unwrap());
    }

    pub fn created(&self) -> usize {
        *self.created.lock().unwrap()
    }

    pub fn video_pts(&self) -> Vec<Duration> {
        self.log.lock().unwrap().video.clone()
    }

    pub fn audio_pts(&self) -> Vec<Duration> {
        self.log.lock().unwrap().audio.clone()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn file_extension(&self, _config: &RecorderConfig) -> String {
        "mp4".to_string()
    }

    fn create(
        &self,
        path: &Path,
        _config: &RecorderConfig,
    ) -> Result<Box<dyn ContainerSink>, WriterError> {
        *self.created.lock().unwrap() += 1;
        let faults = self.faults.lock().unwrap().clone();
        if faults.create {
            return Err(WriterError::Backend("no encoder for the container".to_string()));
        }
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            log: Arc::clone(&self.log),
            gate: self.gate.lock().unwrap().clone(),
            faults,
        }))
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set(&self, at: Duration) {
        *self.offset.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock().unwrap()
    }
}

/// Delegate callbacks in the order they arrived
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    WillStart,
    DidStart,
    DidPause,
    DidResume,
    DidEnd,
    Captured {
        path: Option<PathBuf>,
        seconds: Option<f64>,
        thumbnails: usize,
        error: Option<RecorderError>,
    },
    VideoSample(Duration),
    AudioSample(Duration),
    Dropped(MediaType, DropReason),
    WillCapturePhoto,
    Photo {
        timestamp: Option<Duration>,
        error: Option<RecorderError>,
    },
}

#[derive(Default)]
pub struct RecordingDelegate {
    pub calls: Mutex<Vec<Call>>,
    /// Name returned from `will_start_video_capture_to_file`
    pub rename: Mutex<Option<String>>,
}

impl RecordingDelegate {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    pub fn drops(&self, reason: DropReason) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Dropped(_, r) if *r == reason))
            .count()
    }

    /// `captured_video` calls as (path, seconds, error)
    pub fn captured(&self) -> Vec<(Option<PathBuf>, Option<f64>, Option<RecorderError>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Captured {
                    path,
                    seconds,
                    error,
                    ..
                } => Some((path, seconds, error)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RecorderDelegate for RecordingDelegate {
    fn will_start_video_capture(&self) {
        self.push(Call::WillStart);
    }

    fn will_start_video_capture_to_file(&self, file_name: &str) -> String {
        self.rename
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| file_name.to_string())
    }

    fn did_start_video_capture(&self) {
        self.push(Call::DidStart);
    }

    fn did_pause_video_capture(&self) {
        self.push(Call::DidPause);
    }

    fn did_resume_video_capture(&self) {
        self.push(Call::DidResume);
    }

    fn did_end_video_capture(&self) {
        self.push(Call::DidEnd);
    }

    fn captured_video(&self, result: Option<&VideoResult>, error: Option<&RecorderError>) {
        self.push(Call::Captured {
            path: result.map(|r| r.path.clone()),
            seconds: result.map(|r| r.captured_duration_secs),
            thumbnails: result.map_or(0, |r| r.thumbnails.len()),
            error: error.cloned(),
        });
    }

    fn did_capture_video_sample(&self, sample: &VideoSample) {
        self.push(Call::VideoSample(sample.timing.pts));
    }

    fn did_capture_audio_sample(&self, sample: &AudioSample) {
        self.push(Call::AudioSample(sample.timing.pts));
    }

    fn did_drop_sample(&self, media: MediaType, reason: DropReason) {
        self.push(Call::Dropped(media, reason));
    }

    fn will_capture_photo(&self) {
        self.push(Call::WillCapturePhoto);
    }

    fn captured_photo(&self, photo: Option<&PhotoResult>, error: Option<&RecorderError>) {
        self.push(Call::Photo {
            timestamp: photo.map(|p| p.metadata.timestamp),
            error: error.cloned(),
        });
    }
}

/// Recorder wired to in-memory fixtures
pub struct Harness {
    pub recorder: VideoRecorder,
    pub sinks: Arc<MemorySinkFactory>,
    pub delegate: Arc<RecordingDelegate>,
    pub clock: Arc<ManualClock>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(configure: impl FnOnce(&mut RecorderConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RecorderConfig {
            capture_directory: dir.path().to_path_buf(),
            audio_capture_enabled: false,
            minimum_free_disk_bytes: 0,
            ..RecorderConfig::default()
        };
        configure(&mut config);

        let sinks = Arc::new(MemorySinkFactory::default());
        let delegate = Arc::new(RecordingDelegate::default());
        let clock = Arc::new(ManualClock::new());
        let recorder =
            VideoRecorder::with_clock(config, delegate.clone(), sinks.clone(), clock.clone());

        Self {
            recorder,
            sinks,
            delegate,
            clock,
            dir,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn video(&self, pts: Duration) {
        self.recorder.append_video_sample(video_sample(pts));
    }

    pub fn audio(&self, pts: Duration) {
        self.recorder.append_audio_sample(audio_sample(pts));
    }

    /// Frames `from..to` at 30fps, starting at `base`
    pub fn frames(&self, base: Duration, range: std::ops::Range<u32>) {
        for i in range {
            self.video(base + FRAME * i);
        }
    }
}

pub fn video_sample(pts: Duration) -> VideoSample {
    VideoSample::new(
        VideoFrame::solid(WIDTH, HEIGHT, [40, 80, 120, 255]),
        SampleTiming::new(pts, FRAME),
    )
}

/// One frame's worth of 48 kHz stereo silence
pub fn audio_sample(pts: Duration) -> AudioSample {
    let chunk = AudioChunk::silence(FRAME, 48_000, 2);
    let duration = chunk.duration();
    AudioSample::new(chunk, SampleTiming::new(pts, duration))
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} within {} of {}",
        actual,
        tolerance,
        expected
    );
}
