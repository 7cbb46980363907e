//! Error types for the supervision core.
//!
//! Every component reports failures through [`Error`]. The node supervision
//! loop is the only place that decides whether an error ends the current
//! cycle (and is retried after backoff) or is absorbed as degraded state.

use std::path::PathBuf;

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Supervisor errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The configuration template could not be read.
    #[error("failed to read template {}: {source}", path.display())]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rendered configuration could not be written.
    #[error("failed to write config {}: {source}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A discovery attempt did not complete in time.
    #[error("discovery of '{service}' timed out after {timeout_ms}ms")]
    DiscoveryTimeout { service: String, timeout_ms: u64 },

    /// A discovery attempt failed with a transient error.
    #[error("discovery of '{service}' failed: {reason}")]
    Discovery { service: String, reason: String },

    /// A discovered endpoint record did not carry a usable cluster address.
    #[error("malformed endpoint record: {reason}")]
    MalformedEndpoint { reason: String },

    /// The server executable could not be started.
    #[error("failed to launch {}: {source}", executable.display())]
    ProcessLaunch {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A server process is already tracked and alive.
    #[error("server process already running (pid {pid})")]
    ProcessAlreadyRunning { pid: u32 },

    /// Terminating the server failed. Logged, never propagated by the loop.
    #[error("failed to terminate pid {pid}: {reason}")]
    Termination { pid: u32, reason: String },

    /// An address string was not a valid `host:port`.
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a template read error.
    pub fn template_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::TemplateRead {
            path: path.into(),
            source,
        }
    }

    /// Create a config write error.
    pub fn config_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a transient discovery error.
    pub fn discovery(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Discovery {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed endpoint error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEndpoint {
            reason: reason.into(),
        }
    }

    /// Create an invalid address error.
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error ends the current supervision cycle.
    ///
    /// Cycle-fatal errors are retried by starting a new cycle after backoff.
    /// Discovery errors never reach the loop (the resolver fails open), and
    /// termination errors are swallowed where they occur.
    pub const fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            Self::TemplateRead { .. }
                | Self::ConfigWrite { .. }
                | Self::ProcessLaunch { .. }
                | Self::ProcessAlreadyRunning { .. }
                | Self::Config(_)
        )
    }

    /// Whether a discovery attempt that failed with this error may be retried.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryTimeout { .. } | Self::Discovery { .. }
        )
    }
}
