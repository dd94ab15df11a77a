// SPDX-License-Identifier: GPL-3.0-only

//! Per-session bookkeeping: lifecycle state, pause offsets, captured time

use crate::media::SampleTiming;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Recorder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    /// Writer opened, waiting for the first samples to configure its tracks
    Starting,
    Recording,
    Paused,
    /// No longer accepting samples; the container is being finalized
    Ending,
    /// Cancel requested; becomes `Idle` once the cancellation is delivered
    Cancelled,
    Finished,
    Failed,
}

impl RecorderState {
    /// States in which a session exists and can be ended or cancelled
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RecorderState::Starting | RecorderState::Recording | RecorderState::Paused
        )
    }

    /// States a new session may start from
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            RecorderState::Idle
                | RecorderState::Cancelled
                | RecorderState::Finished
                | RecorderState::Failed
        )
    }
}

/// Running total of paused time subtracted from incoming timestamps
///
/// The total only grows within a session.
#[derive(Debug, Clone, Default)]
pub struct OffsetLedger {
    cumulative: Duration,
    paused_at: Option<Instant>,
}

impl OffsetLedger {
    /// Mark the start of a pause; `false` if already paused
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(now);
        true
    }

    /// Close the open pause and return its length; `None` if not paused
    pub fn resume(&mut self, now: Instant) -> Option<Duration> {
        let paused_at = self.paused_at.take()?;
        let interval = now.saturating_duration_since(paused_at);
        self.cumulative += interval;
        Some(interval)
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn cumulative(&self) -> Duration {
        self.cumulative
    }

    /// Map an input timing onto the output timeline
    pub fn apply(&self, timing: SampleTiming) -> Option<SampleTiming> {
        timing.offset_by(self.cumulative)
    }
}

/// State of one recording from start until its completion is delivered
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: Uuid,
    pub path: PathBuf,
    pub started_at: Instant,
    pub ledger: OffsetLedger,
    pub maximum_duration: Option<Duration>,
    captured_video: Duration,
    captured_audio: Duration,
}

impl RecordingSession {
    pub fn new(path: PathBuf, started_at: Instant, maximum_duration: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path,
            started_at,
            ledger: OffsetLedger::default(),
            maximum_duration,
            captured_video: Duration::ZERO,
            captured_audio: Duration::ZERO,
        }
    }

    /// Record the writer's highest video timestamp; never moves backwards
    pub fn note_video(&mut self, written: Duration) {
        self.captured_video = self.captured_video.max(written);
    }

    /// Record the writer's highest audio timestamp; never moves backwards
    pub fn note_audio(&mut self, written: Duration) {
        self.captured_audio = self.captured_audio.max(written);
    }

    pub fn captured_video(&self) -> Duration {
        self.captured_video
    }

    pub fn captured_audio(&self) -> Duration {
        self.captured_audio
    }

    /// Whether a sample at `position` on the output timeline lies past the cap
    pub fn exceeds_maximum(&self, position: Duration) -> bool {
        self.maximum_duration.is_some_and(|max| position > max)
    }

    /// Whether captured time has reached the cap
    pub fn reached_maximum(&self) -> bool {
        self.maximum_duration
            .is_some_and(|max| self.captured_video.max(self.captured_audio) >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_resume_accumulates() {
        let base = Instant::now();
        let mut ledger = OffsetLedger::default();

        assert!(ledger.pause(base));
        assert!(!ledger.pause(base + Duration::from_secs(1)), "Second pause is a no-op");
        assert_eq!(
            ledger.resume(base + Duration::from_secs(2)),
            Some(Duration::from_secs(2))
        );
        assert_eq!(ledger.resume(base + Duration::from_secs(5)), None);
        assert_eq!(ledger.cumulative(), Duration::from_secs(2));

        ledger.pause(base + Duration::from_secs(10));
        ledger.resume(base + Duration::from_millis(10_500));
        assert_eq!(ledger.cumulative(), Duration::from_millis(2_500));
    }

    #[test]
    fn test_apply_offset() {
        let base = Instant::now();
        let mut ledger = OffsetLedger::default();
        ledger.pause(base);
        ledger.resume(base + Duration::from_secs(2));

        let out = ledger
            .apply(SampleTiming::from_secs_f64(3.0, 0.0))
            .unwrap();
        assert_eq!(out.pts, Duration::from_secs(1));
    }

    #[test]
    fn test_captured_time_is_monotonic() {
        let mut session = RecordingSession::new(PathBuf::from("a.mp4"), Instant::now(), None);
        session.note_video(Duration::from_secs(2));
        session.note_video(Duration::from_secs(1));
        assert_eq!(session.captured_video(), Duration::from_secs(2));
    }

    #[test]
    fn test_maximum_duration() {
        let mut session = RecordingSession::new(
            PathBuf::from("a.mp4"),
            Instant::now(),
            Some(Duration::from_secs(1)),
        );
        assert!(!session.exceeds_maximum(Duration::from_secs(1)));
        assert!(session.exceeds_maximum(Duration::from_millis(1_001)));
        assert!(!session.reached_maximum());
        session.note_video(Duration::from_secs(1));
        assert!(session.reached_maximum());
    }

    #[test]
    fn test_state_groups() {
        assert!(RecorderState::Paused.is_active());
        assert!(!RecorderState::Ending.is_active());
        assert!(!RecorderState::Ending.is_settled());
        assert!(RecorderState::Failed.is_settled());
    }
}
