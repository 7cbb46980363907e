//! Supervisor configuration.
//!
//! Settings are loaded from a TOML file (`natsvisor.toml` by default). Every
//! section is optional and falls back to defaults, except that a node needs a
//! service identity and a replica id.
//!
//! # Example Configuration
//!
//! ```toml
//! [node]
//! service = "fabric:/Nats/NatsService"
//! replica_id = "1"
//! host_env = "Fabric_NodeIPOrFQDN"
//!
//! [endpoints]
//! server_port = 4222
//! cluster_port = 6222
//! monitor_port = 8222
//!
//! [credentials]
//! server_user = "app"
//! server_password = "secret"
//!
//! [discovery]
//! kind = "file"
//! path = "registry.json"
//! ```
//!
//! Relative paths are resolved against the directory of the config file.
//! Credentials may be overridden per field through environment variables
//! named after the template tokens (`NATS_SERVER_AUTH_PASSWORD`, ...) and are
//! re-read from the file at the start of every supervision cycle.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::constants;
use crate::discovery::{
    DiscoverySettings, FileDiscovery, PeerResolver, ServiceDiscovery, StaticDiscovery,
};
use crate::endpoints::{AddressProvider, EndpointRole, FixedAddress, NodeEndpoints, ServiceIdentity};
use crate::logging::{LogConfig, LogFormat};
use crate::process::LaunchSpec;
use crate::reliability::Backoff;
use crate::render::{ClusterCredentials, NodePaths};
use crate::supervisor::{
    CredentialSource, NodeSpec, StaticCredentials, SupervisorSettings, apply_env_overrides,
};

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub const fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root of `natsvisor.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity and placement of this node.
    pub node: NodeSettings,
    /// Ports assigned to this node.
    pub endpoints: EndpointSettings,
    /// Client and route credentials.
    pub credentials: ClusterCredentials,
    /// Server executable and template.
    pub server: ServerSettings,
    /// Peer discovery.
    pub discovery: DiscoveryConfig,
    /// Loop timing.
    pub supervisor: SupervisorConfig,
    /// Log output.
    pub logging: LoggingSettings,
    /// File this config was loaded from.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// `[node]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Identity all replicas register under.
    pub service: String,
    /// Stable id of this replica; names the per-node files.
    pub replica_id: String,
    /// Directory for rendered config, server log and stdout capture.
    pub work_dir: Option<PathBuf>,
    /// Advertised host.
    pub host: Option<String>,
    /// Environment variable holding the advertised host.
    pub host_env: Option<String>,
}

/// `[endpoints]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Client port (default 4222).
    pub server_port: u16,
    /// Cluster-routing port peers connect to (default 6222).
    pub cluster_port: u16,
    /// HTTP monitoring port (default 8222).
    pub monitor_port: u16,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            server_port: constants::DEFAULT_SERVER_PORT,
            cluster_port: constants::DEFAULT_CLUSTER_PORT,
            monitor_port: constants::DEFAULT_MONITOR_PORT,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server binary. Bare names are looked up on `PATH`.
    pub executable: PathBuf,
    /// Configuration template.
    pub template: PathBuf,
    /// Working directory of the server. Defaults to the work dir.
    pub working_dir: Option<PathBuf>,
    /// Scheme of route URIs.
    pub route_scheme: String,
    /// Mirror the server log into the supervisor log.
    pub follow_log: bool,
    /// Extra environment for the server.
    pub env: BTreeMap<String, String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(constants::DEFAULT_EXECUTABLE),
            template: PathBuf::from(constants::DEFAULT_TEMPLATE),
            working_dir: None,
            route_scheme: constants::DEFAULT_ROUTE_SCHEME.to_string(),
            follow_log: false,
            env: BTreeMap::new(),
        }
    }
}

/// Discovery back-end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    /// Fixed `peers` list.
    #[default]
    Static,
    /// JSON registry at `path`.
    File,
}

/// `[discovery]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Back-end used to look up peers.
    pub kind: DiscoveryKind,
    /// Cluster addresses for static discovery.
    pub peers: Vec<String>,
    /// Registry file for file discovery.
    pub path: Option<PathBuf>,
    /// Lookups before falling back to no peers.
    pub attempts: u32,
    /// Timeout of a single lookup.
    pub attempt_timeout_ms: u64,
    /// Delay after the first failed lookup, doubled each retry.
    pub backoff_base_ms: u64,
    /// Ceiling for the lookup retry delay.
    pub backoff_max_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            kind: DiscoveryKind::Static,
            peers: Vec::new(),
            path: None,
            attempts: constants::DEFAULT_DISCOVERY_ATTEMPTS,
            attempt_timeout_ms: constants::DEFAULT_DISCOVERY_TIMEOUT_MS,
            backoff_base_ms: constants::DEFAULT_DISCOVERY_BACKOFF_BASE_MS,
            backoff_max_ms: constants::DEFAULT_DISCOVERY_BACKOFF_MAX_MS,
        }
    }
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Liveness and cancellation check interval.
    pub poll_interval_ms: u64,
    /// Time the server gets to stop after SIGTERM before it is killed.
    pub grace_timeout_ms: u64,
    /// Pause between an unplanned exit and the next launch.
    pub restart_delay_ms: u64,
    /// Delay after the first failed cycle, doubled each retry.
    pub cycle_backoff_base_ms: u64,
    /// Ceiling for the failed-cycle delay.
    pub cycle_backoff_max_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            grace_timeout_ms: constants::DEFAULT_GRACE_TIMEOUT_MS,
            restart_delay_ms: constants::DEFAULT_RESTART_DELAY_MS,
            cycle_backoff_base_ms: constants::DEFAULT_CYCLE_BACKOFF_BASE_MS,
            cycle_backoff_max_ms: constants::DEFAULT_CYCLE_BACKOFF_MAX_MS,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        tracing::debug!(
            path = %path.display(),
            service = %config.node.service,
            replica = %config.node.replica_id,
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Validate configuration.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error listing every problem found:
    /// - Empty service identity or replica id
    /// - Zero or duplicate ports
    /// - Zero poll interval or zero discovery attempts
    /// - File discovery without a registry path, or unparseable static peers
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Node identity
        if self.node.service.trim().is_empty() {
            errors.push("node.service cannot be empty".to_string());
        }
        if self.node.replica_id.trim().is_empty() {
            errors.push("node.replica_id cannot be empty".to_string());
        } else if self
            .node
            .replica_id
            .contains(|c: char| std::path::is_separator(c) || c == '\0')
        {
            errors.push(format!(
                "node.replica_id '{}' cannot contain path separators",
                self.node.replica_id
            ));
        }

        // 2. Ports
        let ports = [
            ("server_port", self.endpoints.server_port),
            ("cluster_port", self.endpoints.cluster_port),
            ("monitor_port", self.endpoints.monitor_port),
        ];
        let mut seen = HashSet::new();
        for (name, port) in ports {
            if port == 0 {
                errors.push(format!("endpoints.{name} cannot be 0"));
            } else if !seen.insert(port) {
                errors.push(format!("endpoints.{name} {port} is assigned to another endpoint"));
            } else if port < 1024 {
                warnings.push(format!(
                    "endpoints.{name} {port} is a privileged port (< 1024)"
                ));
            }
        }

        // 3. Timing
        if self.supervisor.poll_interval_ms == 0 {
            errors.push("supervisor.poll_interval_ms cannot be 0".to_string());
        }
        if self.supervisor.cycle_backoff_max_ms < self.supervisor.cycle_backoff_base_ms {
            warnings.push(
                "supervisor.cycle_backoff_max_ms is below cycle_backoff_base_ms, every retry waits the maximum"
                    .to_string(),
            );
        }

        // 4. Discovery
        if self.discovery.attempts == 0 {
            errors.push("discovery.attempts cannot be 0".to_string());
        }
        match self.discovery.kind {
            DiscoveryKind::File if self.discovery.path.is_none() => {
                errors.push("discovery.path is required when kind = \"file\"".to_string());
            },
            DiscoveryKind::Static => {
                if let Err(e) = StaticDiscovery::parse(self.discovery.peers.as_slice()) {
                    errors.push(format!("discovery.peers: {e}"));
                }
            },
            DiscoveryKind::File => {},
        }

        // 5. Files
        let template = self.resolve(&self.server.template);
        if !template.exists() {
            warnings.push(format!("Template does not exist: {}", template.display()));
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }

    /// Resolve `path` against the config file's directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.source.as_deref().and_then(Path::parent) {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn resolve_executable(&self) -> PathBuf {
        // Bare names go through PATH.
        if self.server.executable.components().count() > 1 {
            self.resolve(&self.server.executable)
        } else {
            self.server.executable.clone()
        }
    }

    /// Directory for the per-replica files.
    pub fn work_dir(&self) -> PathBuf {
        self.node.work_dir.as_ref().map_or_else(
            || std::env::temp_dir().join(constants::DEFAULT_WORK_DIR_NAME),
            |dir| self.resolve(dir),
        )
    }

    /// Per-replica file locations.
    pub fn paths(&self) -> NodePaths {
        NodePaths::new(self.work_dir(), self.node.replica_id.clone())
    }

    /// How the advertised host is found.
    pub fn address_provider(&self) -> Box<dyn AddressProvider> {
        match (&self.node.host, &self.node.host_env) {
            (Some(host), _) => Box::new(FixedAddress::new(host.clone())),
            (None, Some(var)) => Box::new(FixedAddress::from_env(var)),
            (None, None) => Box::new(FixedAddress::localhost()),
        }
    }

    /// This node's endpoints, with the host resolved once.
    pub fn node_endpoints(&self, provider: &dyn AddressProvider) -> NodeEndpoints {
        NodeEndpoints::new(
            provider.public_host(EndpointRole::Cluster),
            self.endpoints.server_port,
            self.endpoints.cluster_port,
            self.endpoints.monitor_port,
        )
    }

    /// Everything the supervisor needs to know about this node.
    pub fn node_spec(&self, endpoints: NodeEndpoints) -> NodeSpec {
        let paths = self.paths();
        let working_dir = self
            .server
            .working_dir
            .as_ref()
            .map_or_else(|| self.work_dir(), |dir| self.resolve(dir));
        let launch = LaunchSpec::new(self.resolve_executable(), &paths, working_dir)
            .with_env(self.server.env.clone());
        NodeSpec {
            service: ServiceIdentity::new(self.node.service.clone()),
            paths,
            endpoints,
            template: self.resolve(&self.server.template),
            launch,
        }
    }

    /// Discovery back-end selected by `[discovery] kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if a static peer is not a valid `host:port` or file
    /// discovery has no path.
    pub fn discovery(&self) -> Result<Arc<dyn ServiceDiscovery>> {
        match self.discovery.kind {
            DiscoveryKind::Static => {
                let discovery = StaticDiscovery::parse(self.discovery.peers.as_slice())
                    .context("Invalid static peer list")?;
                Ok(Arc::new(discovery))
            },
            DiscoveryKind::File => {
                let path = self
                    .discovery
                    .path
                    .as_ref()
                    .context("discovery.path is required for file discovery")?;
                Ok(Arc::new(FileDiscovery::new(self.resolve(path))))
            },
        }
    }

    /// Retry settings for the resolver.
    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            attempts: self.discovery.attempts,
            attempt_timeout: Duration::from_millis(self.discovery.attempt_timeout_ms),
            backoff: Backoff::from_millis(
                self.discovery.backoff_base_ms,
                self.discovery.backoff_max_ms,
            ),
        }
    }

    /// Resolver over the configured back-end.
    pub fn resolver(&self) -> Result<PeerResolver> {
        Ok(PeerResolver::new(self.discovery()?, self.discovery_settings()))
    }

    /// Loop timing and server options.
    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            poll_interval: Duration::from_millis(self.supervisor.poll_interval_ms),
            grace_timeout: Duration::from_millis(self.supervisor.grace_timeout_ms),
            restart_delay: Duration::from_millis(self.supervisor.restart_delay_ms),
            cycle_backoff: Backoff::from_millis(
                self.supervisor.cycle_backoff_base_ms,
                self.supervisor.cycle_backoff_max_ms,
            ),
            route_scheme: self.server.route_scheme.clone(),
            follow_log: self.server.follow_log,
        }
    }

    /// Logging setup from `[logging]`.
    pub fn log_config(&self) -> LogConfig {
        LogConfig::from_settings(self.logging.format, &self.logging.level)
    }

    /// Credentials as configured now, with environment overrides applied.
    pub fn current_credentials(&self) -> ClusterCredentials {
        apply_env_overrides(self.credentials.clone(), |var| std::env::var(var).ok())
    }

    /// Source re-reading credentials every cycle.
    ///
    /// A config loaded from disk is re-read from that file; an in-memory
    /// config always yields its own credentials.
    pub fn credential_source(&self) -> Arc<dyn CredentialSource> {
        match &self.source {
            Some(path) => Arc::new(FileCredentials::new(path.clone())),
            None => Arc::new(StaticCredentials::new(self.current_credentials())),
        }
    }
}

/// Reads `[credentials]` from the config file on every call.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    /// Source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialSource for FileCredentials {
    fn load(&self) -> crate::Result<ClusterCredentials> {
        #[derive(Deserialize)]
        struct CredentialsOnly {
            #[serde(default)]
            credentials: ClusterCredentials,
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            crate::Error::Config(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let parsed: CredentialsOnly = toml::from_str(&content).map_err(|e| {
            crate::Error::Config(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        Ok(apply_env_overrides(parsed.credentials, |var| {
            std::env::var(var).ok()
        }))
    }
}
