//! Observable state of the supervision loop.

use serde::Serialize;
use std::fmt;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    /// Created, `run` not entered yet.
    Bootstrapping,
    /// Resolving peers.
    Discovering,
    /// Rendering and writing the configuration.
    Rendering,
    /// Spawning the server.
    Launching,
    /// Server running; polling liveness and cancellation.
    Monitoring,
    /// Cancellation observed; stopping the server.
    ShuttingDown,
    /// Loop finished. No further launches happen.
    Stopped,
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bootstrapping => "bootstrapping",
            Self::Discovering => "discovering",
            Self::Rendering => "rendering",
            Self::Launching => "launching",
            Self::Monitoring => "monitoring",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// How a supervision cycle ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The server exited on its own; the loop starts a new cycle.
    UnplannedExit {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
    },
    /// Shutdown was requested; the loop stops.
    Cancelled,
}

impl CycleOutcome {
    /// Short label for logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::UnplannedExit { .. } => "unplanned_exit",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Counters kept across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    /// Cycles entered.
    pub cycles_started: u64,
    /// Server exits not requested by the supervisor.
    pub unplanned_exits: u64,
    /// Cycles that ended with an error before monitoring.
    pub failed_cycles: u64,
    /// Discoveries that failed open.
    pub failed_open_discoveries: u64,
    /// Pid of the running server, if any.
    pub current_pid: Option<u32>,
}
