//! Per-replica file locations.
//!
//! Every file the supervisor produces is named after the stable replica
//! identifier, so restarts reuse the same paths instead of accumulating
//! files.

use std::path::{Path, PathBuf};

/// Files owned by one replica inside its work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePaths {
    work_dir: PathBuf,
    replica_id: String,
}

impl NodePaths {
    /// Paths for `replica_id` under `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>, replica_id: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            replica_id: replica_id.into(),
        }
    }

    /// Directory holding all replica files.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Replica identifier the names derive from.
    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// Rendered server configuration: `<replica>.nats.conf`.
    pub fn config_file(&self) -> PathBuf {
        self.work_dir.join(format!("{}.nats.conf", self.replica_id))
    }

    /// Server log file passed with `-l`: `<replica>.nats.log`.
    pub fn log_file(&self) -> PathBuf {
        self.work_dir.join(format!("{}.nats.log", self.replica_id))
    }

    /// Captured stdout/stderr of the server: `<replica>.nats.out`.
    pub fn capture_file(&self) -> PathBuf {
        self.work_dir.join(format!("{}.nats.out", self.replica_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derive_from_replica() {
        let paths = NodePaths::new("/tmp/natsvisor", "131");
        assert_eq!(paths.config_file(), Path::new("/tmp/natsvisor/131.nats.conf"));
        assert_eq!(paths.log_file(), Path::new("/tmp/natsvisor/131.nats.log"));
        assert_eq!(paths.capture_file(), Path::new("/tmp/natsvisor/131.nats.out"));
    }

    #[test]
    fn test_paths_are_stable() {
        let a = NodePaths::new("/w", "7");
        let b = NodePaths::new("/w", "7");
        assert_eq!(a.config_file(), b.config_file());
        assert_ne!(a.config_file(), NodePaths::new("/w", "8").config_file());
    }
}
