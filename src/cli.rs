// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Recording from a live source with an optional scripted pause
//! - Extracting thumbnails from finished recordings
//! - Listing encoders and printing the configuration

use camera_recorder::capture::{CaptureOptions, LiveCapture, VideoSource};
use camera_recorder::media::MediaType;
use camera_recorder::media::encoders::detect_encoders;
use camera_recorder::pipelines::video::{
    CaptureOutcome, DropReason, GstSinkFactory, RecorderDelegate, VideoRecorder,
    extract_thumbnail_from_file,
};
use camera_recorder::storage::format_video_length;
use camera_recorder::{FilterType, RecorderConfig, RecorderError};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Options for `record`
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Video source: test, pipewire or v4l2
    #[arg(short, long, default_value = "test")]
    source: VideoSource,

    /// PipeWire node or V4L2 device path
    #[arg(long)]
    device: Option<String>,

    /// Recording duration in seconds (wall clock, pauses included)
    #[arg(short, long, default_value = "10")]
    duration: u64,

    /// Output file path (default: capture directory, generated name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable audio recording
    #[arg(short, long)]
    audio: bool,

    /// Colour filter applied to every frame
    #[arg(short, long)]
    filter: Option<FilterType>,

    /// Stop by itself once this many seconds are written
    #[arg(long)]
    max_duration: Option<f64>,

    /// Pause after this many seconds
    #[arg(long)]
    pause_at: Option<f64>,

    /// Length of the scripted pause in seconds
    #[arg(long, default_value = "2")]
    pause_for: f64,

    /// Replace the output file if it exists
    #[arg(long)]
    overwrite: bool,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    #[arg(long, default_value = "30")]
    fps: u32,
}

/// Prints lifecycle events and counts dropped samples
#[derive(Default)]
struct ConsoleDelegate {
    dropped_video: AtomicU64,
    dropped_audio: AtomicU64,
}

impl RecorderDelegate for ConsoleDelegate {
    fn did_start_video_capture(&self) {
        println!("Recording started");
    }

    fn did_pause_video_capture(&self) {
        println!();
        println!("Paused");
    }

    fn did_resume_video_capture(&self) {
        println!("Resumed");
    }

    fn did_drop_sample(&self, media: MediaType, reason: DropReason) {
        let counter = match media {
            MediaType::Video => &self.dropped_video,
            MediaType::Audio => &self.dropped_audio,
        };
        let dropped = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if reason != DropReason::NotRecording {
            debug!(%media, ?reason, dropped, "Sample dropped");
        }
    }
}

/// Record a video from the selected live source
pub fn record_video(args: RecordArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = RecorderConfig::load_default()?;
    config.audio_capture_enabled = args.audio;
    config.overwrite_existing = args.overwrite;
    config.video_frame_rate = args.fps.max(1);
    if let Some(filter) = args.filter {
        config.filter = filter;
    }
    if args.max_duration.is_some() {
        config.maximum_capture_duration_secs = args.max_duration;
    }
    config.validate()?;

    println!("Recording Configuration");
    println!("=======================");
    println!("  Source: {:?}", args.source);
    println!("  Resolution: {}x{} @ {}fps", args.width, args.height, config.video_frame_rate);
    println!("  Filter: {}", config.filter);
    println!("  Audio: {}", if args.audio { "enabled" } else { "disabled" });

    let delegate = Arc::new(ConsoleDelegate::default());
    let recorder = VideoRecorder::new(config, delegate.clone(), Arc::new(GstSinkFactory));

    let path = match args.output {
        Some(path) => recorder.start_video_capture_to(path)?,
        None => recorder.start_video_capture()?,
    };
    println!("  Output: {}", path.display());

    let options = CaptureOptions {
        source: args.source,
        device: args.device,
        width: args.width,
        height: args.height,
        frame_rate: args.fps.max(1),
        audio: args.audio,
        ..CaptureOptions::default()
    };
    let capture = match LiveCapture::start(&options, recorder.clone()) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = recorder.cancel_video_capture();
            return Err(e.into());
        }
    };

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Recording... (press Ctrl+C to stop early)");

    let start = Instant::now();
    let target_duration = Duration::from_secs(args.duration);
    let pause_window = args.pause_at.map(|at| {
        let begin = Duration::from_secs_f64(at.max(0.0));
        (begin, begin + Duration::from_secs_f64(args.pause_for.max(0.0)))
    });
    let mut capture_error = None;

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        if let Err(e) = capture.check() {
            capture_error = Some(e);
            break;
        }
        if !recorder.state().is_active() {
            // Maximum duration reached or the writer failed
            break;
        }

        if let Some((begin, end)) = pause_window {
            let elapsed = start.elapsed();
            if elapsed >= begin && elapsed < end && recorder.is_recording() {
                recorder.pause_video_capture();
            } else if elapsed >= end && recorder.is_paused() {
                recorder.resume_video_capture();
            }
        }

        // Print progress
        print!(
            "\rRecording: {}{}",
            format_video_length(recorder.captured_video_seconds()),
            if recorder.is_paused() { " (paused)" } else { "" }
        );
        std::io::Write::flush(&mut std::io::stdout())?;

        std::thread::sleep(camera_recorder::constants::timing::PROGRESS_UPDATE_INTERVAL);
    }
    println!();

    let completion = recorder.end_video_capture();
    if let Err(e) = capture.stop() {
        warn!(error = %e, "Capture pipeline did not stop cleanly");
    }
    if let Some(e) = capture_error {
        println!("Capture stopped: {}", e);
    }

    let outcome = match completion {
        Ok(completion) => completion.wait(),
        Err(RecorderError::Busy(state)) => {
            return Err(format!("Recorder in state {:?}, nothing to finish", state).into());
        }
        Err(e) => return Err(e.into()),
    };

    let dropped_video = delegate.dropped_video.load(Ordering::Relaxed);
    let dropped_audio = delegate.dropped_audio.load(Ordering::Relaxed);

    match outcome {
        CaptureOutcome::Finished(result) => {
            println!("Video saved: {}", result.path.display());
            println!(
                "  Length: {} (audio {:.2}s)",
                format_video_length(result.captured_duration_secs),
                result.captured_audio_secs
            );
            println!(
                "  Paused for: {:.2}s",
                recorder.cumulative_pause_offset().as_secs_f64()
            );
            println!("  Thumbnails: {}", result.thumbnails.len());
            println!("  Dropped samples: {} video, {} audio", dropped_video, dropped_audio);
            Ok(())
        }
        CaptureOutcome::Failed { partial, error } => {
            if let Some(partial) = partial {
                println!("Partial recording kept: {}", partial.path.display());
            }
            Err(error.into())
        }
        CaptureOutcome::Cancelled => {
            println!("Recording cancelled");
            Ok(())
        }
    }
}

/// Save the frame at `time` seconds of a recording as an image
pub fn extract_thumbnail(
    input: PathBuf,
    time: f64,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let thumbnail = extract_thumbnail_from_file(&input, time)?;
    let output = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "thumbnail".to_string());
        input.with_file_name(format!("{}_{:.0}ms.png", stem, time * 1000.0))
    });

    thumbnail.save(&output)?;
    println!(
        "Saved {}x{} frame at {:.3}s to {}",
        thumbnail.width(),
        thumbnail.height(),
        thumbnail.timestamp.as_secs_f64(),
        output.display()
    );
    Ok(())
}

/// List encoders, hardware first
pub fn list_encoders() -> Result<(), Box<dyn std::error::Error>> {
    gstreamer::init()?;
    let report = detect_encoders();

    if report.video.is_empty() {
        println!("No video encoders found.");
    } else {
        println!("Video encoders:");
        for encoder in &report.video {
            println!(
                "  {:<14} {:<22} {:?}{}",
                encoder.element_name,
                encoder.display_name,
                encoder.codec,
                if encoder.is_hardware { " [hw]" } else { "" }
            );
        }
    }

    println!();
    if report.audio.is_empty() {
        println!("No audio encoders found.");
    } else {
        println!("Audio encoders: {}", report.audio.join(", "));
    }
    Ok(())
}

/// Print the configuration, optionally writing the defaults first
pub fn show_config(write_defaults: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = RecorderConfig::default_path();

    let config = if write_defaults {
        let path = path
            .as_ref()
            .ok_or("No configuration directory on this platform")?;
        let config = RecorderConfig::default();
        config.save(path)?;
        println!("Wrote {}", path.display());
        config
    } else {
        RecorderConfig::load_default()?
    };

    if let Some(path) = &path {
        println!("# {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
