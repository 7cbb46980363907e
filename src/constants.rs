//! Centralized constants for template tokens, defaults and intervals.
//!
//! All magic numbers in the supervisor are defined here with their
//! rationale, so tuning happens in one place.

// =============================================================================
// Template Tokens
// =============================================================================

/// Client-facing service port.
pub const TOKEN_SERVER_PORT: &str = "NATS_SERVER_PORT";

/// Cluster-routing port.
pub const TOKEN_CLUSTER_PORT: &str = "NATS_CLUSTER_PORT";

/// HTTP monitoring port.
pub const TOKEN_MONITOR_PORT: &str = "NATS_HTTP_MONITOR_PORT";

/// Misspelled monitoring token found in templates shipped with older
/// deployments. Substituted with the same value as [`TOKEN_MONITOR_PORT`].
pub const TOKEN_MONITOR_PORT_LEGACY: &str = "NATS_HTTP_MOINTOR_PORT";

/// Bind host of the server.
pub const TOKEN_SERVER_HOST: &str = "NATS_SERVER_HOST";

/// Client auth user.
pub const TOKEN_SERVER_AUTH_USER: &str = "NATS_SERVER_AUTH_USER";

/// Client auth password.
pub const TOKEN_SERVER_AUTH_PASSWORD: &str = "NATS_SERVER_AUTH_PASSWORD";

/// Route auth user.
pub const TOKEN_CLUSTER_ROUTE_USER: &str = "NATS_CLUSTER_ROUTE_USER";

/// Route auth password.
pub const TOKEN_CLUSTER_ROUTE_PASSWORD: &str = "NATS_CLUSTER_ROUTE_PASSWORD";

/// Server log file path.
pub const TOKEN_LOG_FILE: &str = "NATS_LOG_FILE";

/// Peer-routes block.
pub const TOKEN_CLUSTER_ROUTES: &str = "NATS_CLUSTER_ROUTES";

/// Every token the renderer knows, in no particular order.
pub const ALL_TOKENS: [&str; 11] = [
    TOKEN_SERVER_PORT,
    TOKEN_CLUSTER_PORT,
    TOKEN_MONITOR_PORT,
    TOKEN_MONITOR_PORT_LEGACY,
    TOKEN_SERVER_HOST,
    TOKEN_SERVER_AUTH_USER,
    TOKEN_SERVER_AUTH_PASSWORD,
    TOKEN_CLUSTER_ROUTE_USER,
    TOKEN_CLUSTER_ROUTE_PASSWORD,
    TOKEN_LOG_FILE,
    TOKEN_CLUSTER_ROUTES,
];

/// Default scheme for route URIs.
pub const DEFAULT_ROUTE_SCHEME: &str = "nats-route";

// =============================================================================
// Endpoint Roles
// =============================================================================

/// Registration name of the client-facing endpoint.
pub const ROLE_SERVER: &str = "NATS_Server";

/// Registration name of the cluster-routing endpoint.
pub const ROLE_CLUSTER: &str = "NATS_Cluster";

/// Registration name of the monitoring endpoint.
pub const ROLE_MONITOR: &str = "NATS_Monitor";

/// Default client port.
pub const DEFAULT_SERVER_PORT: u16 = 4222;

/// Default cluster-routing port.
pub const DEFAULT_CLUSTER_PORT: u16 = 6222;

/// Default HTTP monitoring port.
pub const DEFAULT_MONITOR_PORT: u16 = 8222;

/// Default advertised host when nothing else is configured.
pub const LOCALHOST: &str = "127.0.0.1";

// =============================================================================
// Process Launch
// =============================================================================

/// Default server executable, resolved through `PATH`.
pub const DEFAULT_EXECUTABLE: &str = "nats-server";

/// Default template file, relative to the working directory.
pub const DEFAULT_TEMPLATE: &str = "nats.template.conf";

/// Environment flag telling the server it runs under an external supervisor.
pub const ENV_RUNTIME_MODE: &str = "NATS_DOCKERIZED";

/// Maximum stdout capture size before rotation (10 MB).
pub const DEFAULT_MAX_CAPTURE_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated stdout captures to keep.
pub const DEFAULT_MAX_CAPTURE_FILES: usize = 5;

// =============================================================================
// Supervision Timing
// =============================================================================

/// Liveness poll interval (1 second).
/// Also bounds shutdown latency, since cancellation is checked per tick.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Grace window between SIGTERM and SIGKILL (5 seconds).
pub const DEFAULT_GRACE_TIMEOUT_MS: u64 = 5000;

/// Pause between an unplanned exit and the next cycle (1 second).
pub const DEFAULT_RESTART_DELAY_MS: u64 = 1000;

/// Base delay after a failed cycle (1 second).
pub const DEFAULT_CYCLE_BACKOFF_BASE_MS: u64 = 1000;

/// Ceiling for the failed-cycle delay (60 seconds).
pub const DEFAULT_CYCLE_BACKOFF_MAX_MS: u64 = 60_000;

/// Poll step while waiting for a terminated process to exit.
pub const TERMINATE_POLL_MS: u64 = 50;

/// How long to wait for a killed process to be reaped (2 seconds).
pub const REAP_TIMEOUT_MS: u64 = 2000;

// =============================================================================
// Discovery
// =============================================================================

/// Resolution attempts before failing open (5).
pub const DEFAULT_DISCOVERY_ATTEMPTS: u32 = 5;

/// Per-attempt timeout (2 seconds).
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 2000;

/// First retry delay (200 ms), doubled per attempt.
pub const DEFAULT_DISCOVERY_BACKOFF_BASE_MS: u64 = 200;

/// Retry delay ceiling (5 seconds).
pub const DEFAULT_DISCOVERY_BACKOFF_MAX_MS: u64 = 5000;

// =============================================================================
// Paths
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "natsvisor.toml";

/// Directory name under the system temp dir used when `work_dir` is unset.
pub const DEFAULT_WORK_DIR_NAME: &str = "natsvisor";
