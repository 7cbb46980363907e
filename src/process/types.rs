//! Type definitions for process supervision.
//!
//! This module contains the launch description, the handle returned by a
//! successful start and the lifecycle state of the managed server.

use crate::constants::{DEFAULT_MAX_CAPTURE_FILES, DEFAULT_MAX_CAPTURE_SIZE};
use crate::render::NodePaths;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Configuration for rotating the stdout capture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRotationConfig {
    /// Maximum file size in bytes before rotation.
    pub max_size: u64,
    /// Maximum number of rotated files to keep.
    pub max_files: usize,
}

impl Default for LogRotationConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_CAPTURE_SIZE,
            max_files: DEFAULT_MAX_CAPTURE_FILES,
        }
    }
}

impl LogRotationConfig {
    /// Create a config with custom size limit in megabytes.
    pub const fn with_size_mb(mb: u64) -> Self {
        Self {
            max_size: mb * 1024 * 1024,
            max_files: DEFAULT_MAX_CAPTURE_FILES,
        }
    }

    /// Set the maximum number of rotated files to keep.
    #[must_use]
    pub const fn max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }
}

/// Everything needed to launch the server once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Server executable (absolute, relative or resolved through `PATH`).
    pub executable: PathBuf,
    /// Rendered configuration, passed with `-c`.
    pub config_path: PathBuf,
    /// Server log file, passed with `-l`.
    pub log_path: PathBuf,
    /// File receiving the child's stdout and stderr.
    pub capture_path: PathBuf,
    /// Working directory, stable across restarts.
    pub working_dir: PathBuf,
    /// Extra environment variables.
    pub env: BTreeMap<String, String>,
}

impl LaunchSpec {
    /// Launch description for a replica's files.
    pub fn new(executable: impl Into<PathBuf>, paths: &NodePaths, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            config_path: paths.config_file(),
            log_path: paths.log_file(),
            capture_path: paths.capture_file(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
        }
    }

    /// Add environment variables.
    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }
}

/// Identifies one launched server process.
///
/// Handles from earlier launches never report as alive, even if the OS
/// reuses the pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    /// OS process id.
    pub pid: u32,
    /// Launch counter of the owning supervisor.
    pub generation: u64,
    /// When the process was spawned.
    pub started_at: Instant,
}

/// Lifecycle state of the managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Nothing launched yet.
    NotStarted,
    /// Spawn in progress.
    Starting,
    /// Running with the given pid.
    Running { pid: u32 },
    /// Exited on its own. `code` is `None` when killed by a signal.
    Exited { pid: u32, code: Option<i32> },
    /// Stopped by the supervisor.
    Terminated { pid: u32 },
}

impl ProcessState {
    /// Whether a process is (believed to be) running.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::Starting => f.write_str("starting"),
            Self::Running { pid } => write!(f, "running (pid {pid})"),
            Self::Exited { pid, code: Some(code) } => write!(f, "exited (pid {pid}, code {code})"),
            Self::Exited { pid, code: None } => write!(f, "exited (pid {pid}, signal)"),
            Self::Terminated { pid } => write!(f, "terminated (pid {pid})"),
        }
    }
}
