//! Size-based rotation of the server's stdout capture.
//!
//! The capture file is opened in append mode on every launch. Before a launch
//! it is moved aside when it has grown past the limit:
//!
//! ```text
//! 1.nats.out                       <- fresh file for this launch
//! 1.nats.out.20250101T120000.123   <- newest rotation
//! 1.nats.out.20241231T080000.456
//! ```
//!
//! Suffixes sort chronologically as plain strings, so pruning keeps the
//! lexicographically largest `max_files` entries.

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::types::LogRotationConfig;

/// Move `path` aside if it is at least `config.max_size` bytes.
///
/// Returns the new location of the old content, or `None` when the file is
/// missing or still small.
pub fn rotate_log_if_needed(path: &Path, config: &LogRotationConfig) -> io::Result<Option<PathBuf>> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if size < config.max_size {
        return Ok(None);
    }

    let target = rotated_name(path);
    fs::rename(path, &target)?;
    tracing::info!(
        capture = %path.display(),
        rotated_to = %target.display(),
        bytes = size,
        "Rotated server output"
    );

    for stale in stale_rotations(path, config.max_files)? {
        match fs::remove_file(&stale) {
            Ok(()) => tracing::debug!(path = %stale.display(), "Removed old server output"),
            Err(e) => tracing::warn!(path = %stale.display(), error = %e, "Failed to remove old server output"),
        }
    }

    Ok(Some(target))
}

fn rotated_name(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
    path.with_file_name(name)
}

/// Rotations of `path` beyond the newest `keep`.
fn stale_rotations(path: &Path, keep: usize) -> io::Result<Vec<PathBuf>> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = format!("{}.", path.file_name().unwrap_or_default().to_string_lossy());

    let mut rotations: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
        })
        .collect();

    rotations.sort_unstable_by(|a, b| b.cmp(a));
    Ok(rotations.into_iter().skip(keep).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(max_size: u64, max_files: usize) -> LogRotationConfig {
        LogRotationConfig {
            max_size,
            max_files,
        }
    }

    #[test]
    fn test_small_capture_stays() {
        let dir = TempDir::new().unwrap();
        let capture = dir.path().join("1.nats.out");
        fs::write(&capture, "[INF] Server is ready\n").unwrap();

        assert_eq!(rotate_log_if_needed(&capture, &config(1024, 5)).unwrap(), None);
        assert!(capture.exists());
    }

    #[test]
    fn test_large_capture_moves_aside() {
        let dir = TempDir::new().unwrap();
        let capture = dir.path().join("1.nats.out");
        fs::write(&capture, vec![b'x'; 2048]).unwrap();

        let rotated = rotate_log_if_needed(&capture, &config(1024, 5))
            .unwrap()
            .unwrap();
        assert!(!capture.exists());
        assert_eq!(fs::metadata(&rotated).unwrap().len(), 2048);
        assert!(
            rotated
                .file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("1.nats.out.")
        );
    }

    #[test]
    fn test_missing_capture_is_fine() {
        let dir = TempDir::new().unwrap();
        let result = rotate_log_if_needed(&dir.path().join("absent.out"), &config(1, 5));
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_only_newest_rotations_kept() {
        let dir = TempDir::new().unwrap();
        let capture = dir.path().join("1.nats.out");
        for day in 1..=4 {
            fs::write(dir.path().join(format!("1.nats.out.2024010{day}T000000.000")), "old").unwrap();
        }
        // Another replica's rotations are not ours to prune.
        fs::write(dir.path().join("2.nats.out.20240101T000000.000"), "other").unwrap();
        fs::write(&capture, vec![b'x'; 64]).unwrap();

        let rotated = rotate_log_if_needed(&capture, &config(16, 2)).unwrap().unwrap();

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "1.nats.out.20240104T000000.000".to_string(),
                rotated.file_name().unwrap().to_string_lossy().into_owned(),
                "2.nats.out.20240101T000000.000".to_string(),
            ]
        );
    }
}
