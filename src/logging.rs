//! Structured logging for the supervisor.
//!
//! Every supervision cycle runs inside a `cycle` span carrying the replica
//! id and a fresh cycle id, so the lines of one discover/render/launch/monitor
//! pass can be grouped in a log aggregator. Lines mirrored from the server
//! log use the [`SERVER_LOG_TARGET`] target.

use serde::{Deserialize, Serialize};
use std::io;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Target used for lines mirrored from the server's log file.
pub const SERVER_LOG_TARGET: &str = "nats";

/// Output style of the supervisor's own log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, for a terminal.
    #[default]
    Pretty,
    /// One JSON object per event on stdout.
    Json,
    /// Single-line, for a terminal.
    Compact,
}

/// Settings for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output style.
    pub format: LogFormat,
    /// Default filter when `RUST_LOG` is unset.
    pub level: Level,
    /// Emit an event when a span opens and closes.
    pub with_spans: bool,
    /// Print the event target (module path or `nats`).
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: Level::INFO,
            with_spans: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// JSON with span open/close events, as used in deployments.
    pub const fn json() -> Self {
        Self {
            format: LogFormat::Json,
            level: Level::INFO,
            with_spans: true,
            with_target: true,
        }
    }

    /// From the `[logging]` section. Unparseable levels mean info.
    pub fn from_settings(format: LogFormat, level: &str) -> Self {
        let level = Level::from_str(level).unwrap_or(Level::INFO);
        match format {
            LogFormat::Json => Self::json().level(level),
            other => Self::default().format(other).level(level),
        }
    }

    /// Replace the default level.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Replace the output style.
    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.with_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn output_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_target(self.with_target)
            .with_span_events(self.span_events());
        match self.format {
            LogFormat::Pretty => base.with_writer(io::stderr).boxed(),
            LogFormat::Compact => base.compact().with_writer(io::stderr).boxed(),
            LogFormat::Json => base
                .json()
                .with_current_span(true)
                .with_writer(io::stdout)
                .boxed(),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. A second call leaves the
/// first subscriber in place.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let installed = tracing_subscriber::registry()
        .with(config.output_layer())
        .with(filter)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Global subscriber already set");
    }
}

/// Fresh id for one supervision cycle, `cyc_` followed by 32 hex digits.
pub fn generate_cycle_id() -> String {
    format!("cyc_{}", uuid::Uuid::new_v4().simple())
}

/// Span covering one supervision cycle.
///
/// ```
/// let span = natsvisor::cycle_span!("1", natsvisor::logging::generate_cycle_id(), 3);
/// let _guard = span.enter();
/// tracing::info!("Discovering peers");
/// ```
#[macro_export]
macro_rules! cycle_span {
    ($replica:expr, $cycle_id:expr, $cycle:expr) => {
        tracing::info_span!(
            "cycle",
            replica = %$replica,
            cycle_id = %$cycle_id,
            cycle = $cycle,
        )
    };
}

/// Log the end of a cycle with its outcome and runtime.
pub fn log_cycle_complete(cycle_id: &str, outcome: &str, duration_ms: u64) {
    tracing::info!(cycle_id, outcome, duration_ms, "Cycle completed");
}

/// Mirror one server log line.
pub fn log_server_line(replica: &str, line: &str) {
    tracing::info!(target: SERVER_LOG_TARGET, replica, "{line}");
}
