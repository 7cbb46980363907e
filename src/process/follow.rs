//! Tailing the server's log file.
//!
//! In debug mode the supervisor mirrors every line the server writes to its
//! log file into the supervisor's own log, so a single stream shows both.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Follows a growing log file line by line.
#[derive(Debug, Clone)]
pub struct LogFollower {
    path: PathBuf,
    poll_interval: Duration,
}

impl LogFollower {
    /// Follower for `path`, checking for new data every `poll_interval`.
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
        }
    }

    /// Followed file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Feed complete lines to `sink` until `cancel` fires.
    ///
    /// If the file already exists, following starts at its current end so
    /// output from earlier runs is not replayed. A file that appears later is
    /// read from the beginning.
    pub async fn follow<F>(&self, cancel: CancellationToken, mut sink: F)
    where
        F: FnMut(&str) + Send,
    {
        let mut reader = match self.open(&cancel).await {
            Some(reader) => reader,
            None => return,
        };

        let mut line = String::new();
        loop {
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(self.poll_interval) => {},
                    }
                },
                Ok(_) if line.ends_with('\n') => {
                    sink(line.trim_end_matches(['\r', '\n']));
                    line.clear();
                },
                // Partial line; keep it until the rest arrives.
                Ok(_) => {},
                Err(e) => {
                    tracing::debug!(path = %self.path.display(), error = %e, "Stopped following log");
                    return;
                },
            }
            if cancel.is_cancelled() {
                return;
            }
        }
    }

    async fn open(&self, cancel: &CancellationToken) -> Option<BufReader<File>> {
        if let Ok(mut file) = File::open(&self.path).await {
            if let Err(e) = file.seek(SeekFrom::End(0)).await {
                tracing::debug!(path = %self.path.display(), error = %e, "Failed to seek log");
            }
            return Some(BufReader::new(file));
        }
        loop {
            tokio::select! {
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(self.poll_interval) => {},
            }
            if let Ok(file) = File::open(&self.path).await {
                return Some(BufReader::new(file));
            }
        }
    }
}
