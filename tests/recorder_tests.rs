// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the recording controller

mod common;

use camera_recorder::media::MediaType;
use camera_recorder::pipelines::video::{CaptureOutcome, DropReason, RecorderState};
use camera_recorder::{RecorderError, ThumbnailError};
use common::{Call, FRAME, Harness, assert_close};
use std::sync::Arc;
use std::time::Duration;

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn finished(outcome: CaptureOutcome) -> camera_recorder::VideoResult {
    match outcome {
        CaptureOutcome::Finished(result) => result,
        other => panic!("expected a finished recording, got {:?}", other),
    }
}

#[test]
fn test_thirty_frames_record_to_file() {
    let h = Harness::new(|_| {});
    let path = h.recorder.start_video_capture_to(h.path("a.mp4")).unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Starting);

    h.frames(Duration::ZERO, 0..30);
    assert!(h.recorder.is_recording());
    assert_close(h.recorder.captured_video_seconds(), 0.967, 0.001);

    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert_eq!(result.path, path);
    assert_close(result.captured_duration_secs, 0.967, 0.001);
    assert!(path.exists());
    assert_eq!(h.recorder.state(), RecorderState::Finished);

    assert!(h.recorder.wait_until_idle(IDLE_TIMEOUT));
    let calls = h.delegate.calls();
    assert_eq!(calls.first(), Some(&Call::WillStart));
    assert_eq!(h.delegate.count(&Call::DidStart), 1);
    assert_eq!(h.delegate.count(&Call::DidEnd), 1);
    let captured = h.delegate.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0.as_deref(), Some(path.as_path()));
    assert!(captured[0].2.is_none());
}

#[test]
fn test_pause_interval_removed_from_timeline() {
    let h = Harness::new(|_| {});
    h.recorder.start_video_capture_to(h.path("b.mp4")).unwrap();

    h.frames(Duration::ZERO, 0..30);

    h.clock.set(Duration::from_secs(1));
    h.recorder.pause_video_capture();
    assert!(h.recorder.is_paused());

    // Delivered while paused: not written
    h.video(Duration::from_millis(1500));
    assert_eq!(h.delegate.drops(DropReason::NotRecording), 1);
    let frozen = h.recorder.captured_video_seconds();

    h.clock.advance(Duration::from_secs(2));
    h.recorder.resume_video_capture();
    assert_eq!(h.recorder.cumulative_pause_offset(), Duration::from_secs(2));
    assert_close(frozen, 0.967, 0.001);

    h.frames(Duration::from_secs(3), 0..16);
    assert_close(h.recorder.captured_video_seconds(), 1.5, 0.001);

    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert_close(result.captured_duration_secs, 1.5, 0.001);

    // The first frame after the pause lands where the recording left off
    let pts = h.sinks.video_pts();
    assert_eq!(pts.len(), 46);
    assert_eq!(pts[30], Duration::from_secs(1));
    assert!(pts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(h.recorder.cumulative_pause_offset(), Duration::from_secs(2));
}

#[test]
fn test_existing_destination_rejected_before_start() {
    let h = Harness::new(|_| {});
    let path = h.path("exists.mp4");
    std::fs::write(&path, b"keep me").unwrap();

    let err = h.recorder.start_video_capture_to(&path).unwrap_err();
    assert_eq!(err, RecorderError::OutputFileExists(path.clone()));
    assert_eq!(err.code(), 103);
    assert_eq!(h.recorder.state(), RecorderState::Idle);
    assert_eq!(h.sinks.created(), 0);
    assert!(h.delegate.calls().is_empty());
    assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
}

#[test]
fn test_overwrite_replaces_existing_destination() {
    let h = Harness::new(|config| config.overwrite_existing = true);
    let path = h.path("exists.mp4");
    std::fs::write(&path, b"old").unwrap();

    h.recorder.start_video_capture_to(&path).unwrap();
    h.frames(Duration::ZERO, 0..3);
    finished(h.recorder.end_video_capture().unwrap().wait());
    assert_eq!(std::fs::read(&path).unwrap(), b"placeholder");
}

#[test]
fn test_failed_start_keeps_existing_destination() {
    let h = Harness::new(|config| config.overwrite_existing = true);
    h.sinks.inject(|faults| faults.create = true);
    let path = h.path("keep.mp4");
    std::fs::write(&path, b"old").unwrap();

    let err = h.recorder.start_video_capture_to(&path).unwrap_err();
    assert!(matches!(err, RecorderError::BadOutputFile(_)));
    assert_eq!(h.recorder.state(), RecorderState::Idle);
    assert_eq!(std::fs::read(&path).unwrap(), b"old");
}

#[test]
fn test_busy_start_keeps_existing_destination() {
    let h = Harness::new(|config| config.overwrite_existing = true);
    h.recorder.start_video_capture_to(h.path("first.mp4")).unwrap();
    let path = h.path("second.mp4");
    std::fs::write(&path, b"old").unwrap();

    assert_eq!(
        h.recorder.start_video_capture_to(&path),
        Err(RecorderError::Busy(RecorderState::Starting))
    );
    assert_eq!(std::fs::read(&path).unwrap(), b"old");
}

#[test]
fn test_missing_directory_is_bad_output_file() {
    let h = Harness::new(|_| {});
    let err = h
        .recorder
        .start_video_capture_to(h.path("missing/out.mp4"))
        .unwrap_err();
    assert!(matches!(err, RecorderError::BadOutputFile(_)));
    assert_eq!(h.recorder.state(), RecorderState::Idle);
}

#[test]
fn test_insufficient_disk_space_is_capture_failed() {
    let h = Harness::new(|config| config.minimum_free_disk_bytes = u64::MAX);
    let err = h
        .recorder
        .start_video_capture_to(h.path("full.mp4"))
        .unwrap_err();
    assert!(matches!(err, RecorderError::CaptureFailed(_)));
    assert_eq!(h.sinks.created(), 0);
}

#[test]
fn test_cancel_removes_output_without_payload() {
    let h = Harness::new(|_| {});
    let path = h.recorder.start_video_capture_to(h.path("d.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..5);
    assert!(path.exists());

    h.recorder.cancel_video_capture().unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Idle);
    assert!(!path.exists());

    let captured = h.delegate.captured();
    assert_eq!(captured, vec![(None, None, None)]);
    assert_eq!(h.delegate.count(&Call::DidEnd), 0);

    // Late frames are ignored
    h.video(FRAME * 5);
    assert_eq!(h.delegate.drops(DropReason::NotRecording), 1);

    // The completion handle still resolves
    let outcome = h.recorder.end_video_capture().unwrap().wait();
    assert!(matches!(outcome, CaptureOutcome::Cancelled));
    assert_eq!(
        h.recorder.cancel_video_capture(),
        Err(RecorderError::Busy(RecorderState::Idle))
    );

    // Idle again, so the next session starts straight away
    h.recorder.start_video_capture_to(h.path("again.mp4")).unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Starting);
}

#[test]
fn test_cancel_while_finalizing() {
    let h = Harness::new(|_| {});
    let gate = h.sinks.gated();
    let path = h.recorder.start_video_capture_to(h.path("late.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..5);

    let completion = h.recorder.end_video_capture().unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Ending);
    h.recorder.cancel_video_capture().unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Cancelled);

    gate.send(()).unwrap();
    assert!(matches!(completion.wait(), CaptureOutcome::Cancelled));
    assert!(h.recorder.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(h.recorder.state(), RecorderState::Idle);
    assert!(!path.exists());
    assert_eq!(h.delegate.captured(), vec![(None, None, None)]);
}

#[test]
fn test_cancel_when_idle_is_busy() {
    let h = Harness::new(|_| {});
    assert_eq!(
        h.recorder.cancel_video_capture(),
        Err(RecorderError::Busy(RecorderState::Idle))
    );
}

#[test]
fn test_pause_and_resume_are_idempotent() {
    let h = Harness::new(|_| {});

    // Before any session
    h.recorder.pause_video_capture();
    h.recorder.resume_video_capture();
    assert_eq!(h.recorder.state(), RecorderState::Idle);

    h.recorder.start_video_capture_to(h.path("p.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..2);

    h.clock.set(Duration::from_secs(1));
    h.recorder.pause_video_capture();
    h.clock.set(Duration::from_secs(2));
    h.recorder.pause_video_capture();
    h.clock.set(Duration::from_secs(4));
    h.recorder.resume_video_capture();
    h.recorder.resume_video_capture();

    assert_eq!(h.delegate.count(&Call::DidPause), 1);
    assert_eq!(h.delegate.count(&Call::DidResume), 1);
    assert_eq!(h.recorder.cumulative_pause_offset(), Duration::from_secs(3));
    assert!(h.recorder.is_recording());
}

#[test]
fn test_stale_timestamps_dropped() {
    let h = Harness::new(|_| {});
    h.recorder.start_video_capture_to(h.path("m.mp4")).unwrap();

    h.video(Duration::ZERO);
    h.video(FRAME);
    h.video(FRAME);
    h.video(Duration::from_millis(10));
    h.video(FRAME * 2);

    assert_eq!(h.delegate.drops(DropReason::OutOfOrder), 2);
    assert_eq!(h.sinks.video_pts(), vec![Duration::ZERO, FRAME, FRAME * 2]);
    assert!(h.recorder.is_recording());
}

#[test]
fn test_video_only_finalize_does_not_wait_for_audio() {
    let h = Harness::new(|config| config.audio_capture_enabled = false);
    h.recorder.start_video_capture_to(h.path("v.mp4")).unwrap();

    // Audio is ignored entirely when disabled
    h.audio(Duration::ZERO);
    h.frames(Duration::ZERO, 0..10);
    h.audio(FRAME);

    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert_close(result.captured_duration_secs, 0.3, 0.001);
    assert_eq!(result.captured_audio_secs, 0.0);
    assert!(h.sinks.audio_pts().is_empty());
    assert!(!h.sinks.log.lock().unwrap().audio_track);
}

#[test]
fn test_audio_and_video_recorded_together() {
    let h = Harness::new(|config| config.audio_capture_enabled = true);
    h.recorder.start_video_capture_to(h.path("av.mp4")).unwrap();

    // Video alone cannot start a session that expects audio
    h.video(Duration::ZERO);
    assert_eq!(h.recorder.state(), RecorderState::Starting);
    assert_eq!(h.delegate.drops(DropReason::NotReady), 1);

    for i in 0..10 {
        h.audio(FRAME * i);
        h.video(FRAME * (i + 1));
    }
    assert!(h.recorder.is_recording());
    assert_eq!(h.delegate.count(&Call::DidStart), 1);

    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert!(h.sinks.log.lock().unwrap().audio_track);
    assert_eq!(h.sinks.video_pts().len(), 10);
    assert!(!h.sinks.audio_pts().is_empty());
    assert_close(result.captured_duration_secs, 0.3, 0.001);
    assert!(result.captured_audio_secs > 0.0);
    assert!(result.captured_audio_secs <= result.captured_duration_secs + 1e-9);
}

#[test]
fn test_maximum_duration_ends_recording() {
    let h = Harness::new(|config| config.maximum_capture_duration_secs = Some(0.5));
    h.recorder.start_video_capture_to(h.path("max.mp4")).unwrap();

    h.frames(Duration::ZERO, 0..30);
    assert!(matches!(
        h.recorder.state(),
        RecorderState::Ending | RecorderState::Finished
    ));
    assert_eq!(h.delegate.drops(DropReason::BeyondMaximumDuration), 1);
    assert_eq!(h.delegate.count(&Call::DidEnd), 1);

    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert!(result.captured_duration_secs <= 0.5);
    assert_close(result.captured_duration_secs, 0.5, 0.034);
    assert!(h.sinks.video_pts().iter().all(|pts| *pts <= Duration::from_millis(500)));
}

#[test]
fn test_start_rejected_while_finalizing() {
    let h = Harness::new(|_| {});
    let gate = h.sinks.gated();
    h.recorder.start_video_capture_to(h.path("one.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..3);
    let completion = h.recorder.end_video_capture().unwrap();

    let err = h
        .recorder
        .start_video_capture_to(h.path("two.mp4"))
        .unwrap_err();
    assert_eq!(err, RecorderError::Busy(RecorderState::Ending));
    assert_eq!(err.code(), 105);

    gate.send(()).unwrap();
    finished(completion.wait());
    assert!(h.recorder.wait_until_idle(IDLE_TIMEOUT));

    // The next session starts from a clean slate
    h.recorder.start_video_capture_to(h.path("two.mp4")).unwrap();
    assert_eq!(h.recorder.captured_video_seconds(), 0.0);
    assert_eq!(h.recorder.cumulative_pause_offset(), Duration::ZERO);
}

#[test]
fn test_end_without_samples_fails() {
    let h = Harness::new(|_| {});
    let path = h.recorder.start_video_capture_to(h.path("empty.mp4")).unwrap();

    match h.recorder.end_video_capture().unwrap().wait() {
        CaptureOutcome::Failed { partial, error } => {
            assert!(partial.is_none());
            assert!(matches!(error, RecorderError::CaptureFailed(_)));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.recorder.state(), RecorderState::Failed);
    assert!(!path.exists());
    assert_eq!(h.delegate.captured().len(), 1);
}

#[test]
fn test_end_twice_is_busy() {
    let h = Harness::new(|_| {});
    h.recorder.start_video_capture_to(h.path("twice.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..3);

    let completion = h.recorder.end_video_capture().unwrap();
    assert!(matches!(
        h.recorder.end_video_capture(),
        Err(RecorderError::Busy(_))
    ));
    finished(completion.wait());
}

#[test]
fn test_frame_size_change_fails_session() {
    let h = Harness::new(|_| {});
    let path = h.recorder.start_video_capture_to(h.path("resize.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..3);

    h.recorder
        .append_video_sample(camera_recorder::VideoSample::new(
            camera_recorder::VideoFrame::solid(16, 16, [0, 0, 0, 255]),
            camera_recorder::SampleTiming::new(FRAME * 3, FRAME),
        ));

    match h.recorder.end_video_capture().unwrap().wait() {
        CaptureOutcome::Failed { partial, error } => {
            assert!(matches!(error, RecorderError::BadOutputFile(_)));
            let partial = partial.expect("frames were written before the failure");
            assert_eq!(partial.path, path);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(h.delegate.count(&Call::DidEnd), 0);
}

#[test]
fn test_generated_file_name_and_rename() {
    let h = Harness::new(|_| {});
    let path = h.recorder.start_video_capture().unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("video_"));
    assert!(name.ends_with(".mp4"));
    assert_eq!(path.parent(), Some(h.dir.path()));
    h.recorder.cancel_video_capture().unwrap();

    *h.delegate.rename.lock().unwrap() = Some("renamed.mp4".to_string());
    let path = h.recorder.start_video_capture().unwrap();
    assert_eq!(path, h.path("renamed.mp4"));
}

#[test]
fn test_pixel_buffer_override_and_transforms() {
    use camera_recorder::VideoFrame;

    let h = Harness::new(|_| {});
    h.recorder.add_frame_transform(Arc::new(|frame: VideoFrame| {
        VideoFrame::solid(frame.width, frame.height, [1, 2, 3, 255])
    }));
    h.recorder.start_video_capture_to(h.path("t.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..2);

    let thumbnail = h.recorder.capture_current_video_thumbnail().unwrap();
    assert_eq!(thumbnail.image.get_pixel(0, 0).0, [1, 2, 3, 255]);
    h.recorder.cancel_video_capture().unwrap();
}

#[test]
fn test_thumbnails_during_and_after_recording() {
    let h = Harness::new(|config| config.thumbnail_interval_secs = 0.25);

    assert_eq!(
        h.recorder.capture_current_video_thumbnail().unwrap_err(),
        ThumbnailError::NoFrameAvailable
    );

    h.recorder.start_video_capture_to(h.path("thumb.mp4")).unwrap();
    assert!(h.recorder.capture_current_video_thumbnail().is_err());

    h.frames(Duration::ZERO, 0..30);
    let current = h.recorder.capture_current_video_thumbnail().unwrap();
    assert_eq!((current.width(), current.height()), (common::WIDTH, common::HEIGHT));
    assert_eq!(current.timestamp, FRAME * 29);

    // Side buffer holds frames 0, 8, 16 and 24; lookups take the nearest earlier one
    let at = h.recorder.capture_video_thumbnail_at_time(0.6).unwrap();
    assert_eq!(at.timestamp, FRAME * 16);
    let by_frame = h.recorder.capture_video_thumbnail_at_frame(15).unwrap();
    assert_eq!(by_frame.timestamp, FRAME * 8);
    let latest = h.recorder.capture_video_thumbnail_at_time(5.0).unwrap();
    assert_eq!(latest.timestamp, FRAME * 29);
    assert!(latest.width() <= 160 && latest.height() <= 120);
    assert!(h.recorder.capture_video_thumbnail_at_time(-1.0).is_err());

    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert!(result.thumbnail.is_some());
    assert_eq!(result.thumbnails.len(), 4);
    assert!(h.recorder.capture_current_video_thumbnail().is_ok());
}

#[test]
fn test_recorder_clones_share_session() {
    let h = Harness::new(|_| {});
    let capture_side = h.recorder.clone();
    h.recorder.start_video_capture_to(h.path("shared.mp4")).unwrap();

    let handle = std::thread::spawn(move || {
        for i in 0..10 {
            capture_side.append_video_sample(common::video_sample(FRAME * i));
        }
    });
    handle.join().unwrap();

    assert_eq!(h.sinks.video_pts().len(), 10);
    assert!(h.recorder.session_id().is_some());
    finished(h.recorder.end_video_capture().unwrap().wait());
    assert!(h.recorder.session_id().is_none());
}

#[test]
fn test_finalize_failure_reports_partial_result_once() {
    let h = Harness::new(|_| {});
    h.sinks.inject(|faults| faults.finish = true);
    let path = h.recorder.start_video_capture_to(h.path("broken.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..10);

    match h.recorder.end_video_capture().unwrap().wait() {
        CaptureOutcome::Failed { partial, error } => {
            assert!(matches!(error, RecorderError::CaptureFailed(_)));
            let partial = partial.expect("frames were written before the failure");
            assert_eq!(partial.path, path);
            assert_close(partial.captured_duration_secs, 0.3, 0.001);
        }
        other => panic!("expected a failed recording, got {:?}", other),
    }
    assert_eq!(h.recorder.state(), RecorderState::Failed);

    assert!(h.recorder.wait_until_idle(IDLE_TIMEOUT));
    let captured = h.delegate.captured();
    assert_eq!(captured.len(), 1);
    assert!(matches!(captured[0].2, Some(RecorderError::CaptureFailed(_))));
    assert_eq!(h.delegate.count(&Call::DidEnd), 1);
}

#[test]
fn test_storage_full_fails_session_and_rejects_later_frames() {
    let h = Harness::new(|_| {});
    h.sinks.inject(|faults| faults.storage_full_after = Some(5));
    h.recorder.start_video_capture_to(h.path("full.mp4")).unwrap();

    h.frames(Duration::ZERO, 0..10);
    assert_eq!(h.recorder.state(), RecorderState::Failed);
    assert_eq!(h.sinks.video_pts().len(), 5);
    // The failing frame ends the session; the four after it are not written
    assert_eq!(h.delegate.drops(DropReason::NotRecording), 4);
    assert_eq!(h.delegate.count(&Call::DidEnd), 0);

    // The session already resolved on its own; its completion is still handed out
    match h.recorder.end_video_capture().unwrap().wait() {
        CaptureOutcome::Failed { partial, error } => {
            assert!(matches!(error, RecorderError::CaptureFailed(_)));
            assert_eq!(partial.map(|r| r.captured_duration_secs > 0.0), Some(true));
        }
        other => panic!("expected a failed recording, got {:?}", other),
    }

    assert!(h.recorder.wait_until_idle(IDLE_TIMEOUT));
    assert_eq!(h.delegate.captured().len(), 1);
    assert_close(h.recorder.captured_video_seconds(), FRAME.as_secs_f64() * 4.0, 0.001);
}

#[test]
fn test_captured_time_across_pause_cycles() {
    let h = Harness::new(|_| {});
    h.recorder.start_video_capture_to(h.path("cycles.mp4")).unwrap();

    // (segment start, frames, pause at, resume at), in seconds on the wall clock
    let segments = [
        (0.0, 30, 1.0, 3.0),
        (3.0, 30, 4.0, 4.5),
        (4.5, 30, 5.5, 7.0),
    ];
    for (start, frames, pause_at, resume_at) in segments {
        h.frames(Duration::from_secs_f64(start), 0..frames);
        h.clock.set(Duration::from_secs_f64(pause_at));
        h.recorder.pause_video_capture();
        h.clock.set(Duration::from_secs_f64(resume_at));
        h.recorder.resume_video_capture();
    }
    h.frames(Duration::from_secs(7), 0..15);
    h.clock.set(Duration::from_secs_f64(7.5));

    // 7.5s of wall clock with 4s paused
    assert_eq!(h.recorder.cumulative_pause_offset(), Duration::from_secs(4));
    assert_close(
        h.recorder.captured_video_seconds(),
        3.5,
        FRAME.as_secs_f64() + 0.001,
    );

    let pts = h.sinks.video_pts();
    assert_eq!(pts.len(), 105);
    assert!(pts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(h.delegate.count(&Call::DidPause), 3);
    assert_eq!(h.delegate.count(&Call::DidResume), 3);

    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert_close(result.captured_duration_secs, 3.5, FRAME.as_secs_f64() + 0.001);
}

#[test]
fn test_pause_races_concurrent_delivery() {
    const DELIVERED: u32 = 300;

    let h = Harness::new(|_| {});
    h.recorder.start_video_capture_to(h.path("race.mp4")).unwrap();

    let capture_side = h.recorder.clone();
    let capture = std::thread::spawn(move || {
        for i in 0..DELIVERED {
            capture_side.append_video_sample(common::video_sample(FRAME * i));
            if i % 10 == 0 {
                std::thread::yield_now();
            }
        }
    });

    // Control calls interleave with delivery instead of waiting for it
    for _ in 0..50 {
        h.clock.advance(Duration::from_millis(10));
        h.recorder.pause_video_capture();
        std::thread::yield_now();
        h.clock.advance(Duration::from_millis(10));
        h.recorder.resume_video_capture();
        std::thread::yield_now();
    }
    capture.join().unwrap();

    let pts = h.sinks.video_pts();
    assert!(pts.windows(2).all(|w| w[0] < w[1]));

    // Every frame was either written once or dropped once
    let calls = h.delegate.calls();
    let written = calls
        .iter()
        .filter(|c| matches!(c, Call::VideoSample(_)))
        .count();
    let dropped = calls
        .iter()
        .filter(|c| matches!(c, Call::Dropped(MediaType::Video, _)))
        .count();
    assert_eq!(written, pts.len());
    assert_eq!(written + dropped, DELIVERED as usize);
    assert_eq!(h.delegate.count(&Call::DidPause), h.delegate.count(&Call::DidResume));

    let last = pts.last().copied().unwrap_or_default();
    assert_close(h.recorder.captured_video_seconds(), last.as_secs_f64(), 1e-9);
    if !pts.is_empty() {
        finished(h.recorder.end_video_capture().unwrap().wait());
    }
}

#[test]
fn test_photo_from_live_recording() {
    use camera_recorder::media::SampleTiming;
    use camera_recorder::{VideoFrame, VideoSample};

    let h = Harness::new(|_| {});
    h.recorder.add_frame_transform(Arc::new(|frame: VideoFrame| {
        VideoFrame::solid(frame.width, frame.height, [10, 20, 30, 255])
    }));
    h.recorder.start_video_capture_to(h.path("stills.mp4")).unwrap();
    for i in 0..3 {
        h.recorder.append_video_sample(VideoSample::new(
            VideoFrame::solid(640, 480, [200, 200, 200, 255]),
            SampleTiming::new(FRAME * i, FRAME),
        ));
    }

    let photo = h.recorder.capture_video_frame_as_photo().unwrap();
    assert_eq!(&photo.jpeg[..2], &[0xFF, 0xD8]);
    // The still is the processed frame, not the camera frame
    assert_eq!(photo.image.get_pixel(320, 240).0, [10, 20, 30, 255]);
    assert_eq!(photo.image.dimensions(), (640, 480));
    assert_eq!((photo.thumbnail.width(), photo.thumbnail.height()), (160, 120));
    assert_eq!(photo.metadata.timestamp, FRAME * 2);
    assert_eq!(Some(photo.metadata.session_id), h.recorder.session_id());

    let calls = h.delegate.calls();
    let will = calls.iter().position(|c| *c == Call::WillCapturePhoto).unwrap();
    assert_eq!(
        calls[will + 1],
        Call::Photo {
            timestamp: Some(FRAME * 2),
            error: None
        }
    );

    // Taking a still does not disturb the recording
    assert!(h.recorder.is_recording());
    let result = finished(h.recorder.end_video_capture().unwrap().wait());
    assert_close(result.captured_duration_secs, (FRAME * 2).as_secs_f64(), 0.001);
}

#[test]
fn test_photo_while_paused_uses_last_written_frame() {
    let h = Harness::new(|_| {});
    h.recorder.start_video_capture_to(h.path("paused.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..10);
    h.clock.set(Duration::from_secs(1));
    h.recorder.pause_video_capture();
    h.frames(Duration::from_secs(1), 0..5);

    let photo = h.recorder.capture_video_frame_as_photo().unwrap();
    assert_eq!(photo.metadata.timestamp, FRAME * 9);
    assert_eq!((photo.metadata.width, photo.metadata.height), (8, 6));
    h.recorder.cancel_video_capture().unwrap();
}

#[test]
fn test_photo_without_live_frame_reports_error() {
    let h = Harness::new(|_| {});

    let err = h.recorder.capture_video_frame_as_photo().unwrap_err();
    assert_eq!(err, RecorderError::Busy(RecorderState::Idle));

    // Starting: no frame has reached the file yet
    h.recorder.start_video_capture_to(h.path("empty.mp4")).unwrap();
    assert_eq!(
        h.recorder.capture_video_frame_as_photo().unwrap_err(),
        RecorderError::Busy(RecorderState::Starting)
    );

    let photos: Vec<_> = h
        .delegate
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Photo { .. }))
        .collect();
    assert_eq!(
        photos,
        vec![
            Call::Photo {
                timestamp: None,
                error: Some(RecorderError::Busy(RecorderState::Idle))
            },
            Call::Photo {
                timestamp: None,
                error: Some(RecorderError::Busy(RecorderState::Starting))
            },
        ]
    );
    assert_eq!(h.delegate.count(&Call::WillCapturePhoto), 2);
}

#[test]
fn test_photo_after_recording_finished_is_busy() {
    let h = Harness::new(|_| {});
    h.recorder.start_video_capture_to(h.path("done.mp4")).unwrap();
    h.frames(Duration::ZERO, 0..3);
    finished(h.recorder.end_video_capture().unwrap().wait());

    assert_eq!(
        h.recorder.capture_video_frame_as_photo().unwrap_err(),
        RecorderError::Busy(RecorderState::Finished)
    );
    // The side buffer still answers thumbnail queries
    assert!(h.recorder.capture_current_video_thumbnail().is_ok());
}
