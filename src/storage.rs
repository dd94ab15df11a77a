// SPDX-License-Identifier: GPL-3.0-only

//! Destination checks and file naming for recordings

use crate::constants::recording;
use crate::errors::RecorderError;
use chrono::{DateTime, Local};
use std::path::Path;
use tracing::{debug, warn};

/// Free bytes available to unprivileged users on the filesystem holding `path`
///
/// Walks up to the nearest existing ancestor so the query works for files
/// that have not been created yet. Returns `None` where the platform offers
/// no answer.
pub fn available_disk_space(path: &Path) -> Option<u64> {
    let existing = path.ancestors().find(|p| p.exists())?;

    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(existing.as_os_str().as_bytes()).ok()?;
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                warn!(
                    path = %existing.display(),
                    error = %std::io::Error::last_os_error(),
                    "statvfs failed"
                );
                return None;
            }
            #[allow(clippy::unnecessary_cast)]
            Some(stat.f_bavail as u64 * stat.f_frsize as u64)
        }
    }
    #[cfg(not(unix))]
    {
        let _ = existing;
        None
    }
}

/// Check that a recording may be written to `path`
///
/// Checks the existing file, the parent directory, then free space. Nothing
/// on disk is touched; an existing file allowed by `overwrite` is left for
/// [`replace_existing`] once the session is committed.
pub fn validate_destination(
    path: &Path,
    overwrite: bool,
    minimum_free_bytes: u64,
) -> Result<(), RecorderError> {
    if path.is_dir() {
        return Err(RecorderError::BadOutputFile(format!(
            "{} is a directory",
            path.display()
        )));
    }

    let exists = path.exists();
    if exists && !overwrite {
        return Err(RecorderError::OutputFileExists(path.to_path_buf()));
    }

    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => {
            return Err(RecorderError::BadOutputFile(format!(
                "{} has no parent directory",
                path.display()
            )));
        }
    };

    if !parent.is_dir() {
        return Err(RecorderError::BadOutputFile(format!(
            "directory {} does not exist",
            parent.display()
        )));
    }

    if !is_writable_dir(parent) {
        return Err(RecorderError::BadOutputFile(format!(
            "directory {} is not writable",
            parent.display()
        )));
    }

    match available_disk_space(parent) {
        Some(available) if available < minimum_free_bytes => {
            return Err(RecorderError::CaptureFailed(format!(
                "not enough free disk space ({} bytes available, {} required)",
                available, minimum_free_bytes
            )));
        }
        Some(available) => debug!(available, "Free disk space checked"),
        None => debug!("Free disk space unknown on this platform"),
    }

    Ok(())
}

/// Remove a destination that is about to be overwritten
pub fn replace_existing(path: &Path) -> Result<(), RecorderError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed existing destination");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RecorderError::BadOutputFile(format!(
            "failed to replace {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(unix)]
fn is_writable_dir(dir: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable_dir(dir: &Path) -> bool {
    std::fs::metadata(dir)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Timestamp string used in generated names, e.g. `20240131_154501`
pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Generated recording file name, e.g. `video_20240131_154501.mp4`
pub fn generate_file_name(extension: &str, at: DateTime<Local>) -> String {
    format!(
        "{}_{}.{}",
        recording::FILE_PREFIX,
        format_timestamp(at),
        extension
    )
}

/// Human readable video length: `MM:SS` below an hour, `H:MM:SS` above
pub fn format_video_length(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_video_length() {
        assert_eq!(format_video_length(0.0), "00:00");
        assert_eq!(format_video_length(5.9), "00:05");
        assert_eq!(format_video_length(125.0), "02:05");
        assert_eq!(format_video_length(3723.0), "1:02:03");
        assert_eq!(format_video_length(-3.0), "00:00");
        assert_eq!(format_video_length(f64::NAN), "00:00");
    }

    #[test]
    fn test_generate_file_name() {
        let at = Local.with_ymd_and_hms(2024, 1, 31, 15, 45, 1).unwrap();
        assert_eq!(generate_file_name("mp4", at), "video_20240131_154501.mp4");
    }

    #[test]
    fn test_existing_file_rejected_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"data").unwrap();

        let result = validate_destination(&path, false, 0);
        assert_eq!(result, Err(RecorderError::OutputFileExists(path.clone())));
        assert!(path.exists(), "Rejected start must not touch the file");
    }

    #[test]
    fn test_overwrite_validation_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"data").unwrap();

        assert!(validate_destination(&path, true, 0).is_ok());
        assert!(path.exists());

        replace_existing(&path).unwrap();
        assert!(!path.exists());
        // Nothing left to replace is fine
        replace_existing(&path).unwrap();
    }

    #[test]
    fn test_missing_parent_is_bad_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("clip.mp4");
        assert!(matches!(
            validate_destination(&path, false, 0),
            Err(RecorderError::BadOutputFile(_))
        ));
    }

    #[test]
    fn test_insufficient_space_is_capture_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        if available_disk_space(dir.path()).is_none() {
            return;
        }
        assert!(matches!(
            validate_destination(&path, false, u64::MAX),
            Err(RecorderError::CaptureFailed(_))
        ));
    }
}
