//! Common test utilities for integration tests.
//!
//! Provides a `TestNode` that wires a real [`NodeSupervisor`] to:
//! - a `/bin/sh` script standing in for the server binary
//! - a `CountingDiscovery` that records how often peers were resolved
//! - a temporary work directory holding template, config and logs
//!
//! # Example
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_launch() {
//!     let node = TestNode::builder().script("exec sleep 30").build();
//!     let (mut supervisor, discovery) = node.supervisor();
//!     // ...
//! }
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use natsvisor::discovery::{
    DiscoverySettings, EndpointRecord, PeerResolver, ServiceDiscovery,
};
use natsvisor::endpoints::{EndpointPayload, EndpointRole, NodeEndpoints, ServiceIdentity};
use natsvisor::process::LaunchSpec;
use natsvisor::reliability::Backoff;
use natsvisor::render::{ClusterCredentials, NodePaths};
use natsvisor::supervisor::{
    NodeSpec, NodeSupervisor, StaticCredentials, SupervisorPhase, SupervisorSettings,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

/// Cluster address this node advertises.
pub const SELF_CLUSTER: &str = "127.0.0.1:6222";

/// Template exercising every token.
pub const TEMPLATE: &str = "\
listen: NATS_SERVER_HOST:NATS_SERVER_PORT
http: NATS_HTTP_MONITOR_PORT
authorization {
  user: NATS_SERVER_AUTH_USER
  password: NATS_SERVER_AUTH_PASSWORD
}
log_file: \"NATS_LOG_FILE\"
cluster {
  listen: NATS_SERVER_HOST:NATS_CLUSTER_PORT
  authorization {
    user: NATS_CLUSTER_ROUTE_USER
    password: NATS_CLUSTER_ROUTE_PASSWORD
  }
NATS_CLUSTER_ROUTES}
";

/// Discovery returning fixed cluster addresses and counting calls.
pub struct CountingDiscovery {
    calls: AtomicUsize,
    peers: Vec<String>,
    failing: bool,
}

impl CountingDiscovery {
    pub fn new(peers: &[&str]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            peers: peers.iter().map(ToString::to_string).collect(),
            failing: false,
        }
    }

    /// Discovery that fails every call with a transient error.
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            peers: Vec::new(),
            failing: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceDiscovery for CountingDiscovery {
    async fn resolve(&self, service: &ServiceIdentity) -> natsvisor::Result<Vec<EndpointRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(natsvisor::Error::discovery(service.as_str(), "registry unavailable"));
        }
        Ok(self
            .peers
            .iter()
            .map(|peer| {
                let mut payload = EndpointPayload::default();
                payload.endpoints.insert(
                    EndpointRole::Cluster.registration_name().to_string(),
                    peer.clone(),
                );
                EndpointRecord::from_payload(&payload)
            })
            .collect())
    }
}

/// Write an executable `/bin/sh` script.
pub fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-nats-server.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Builder for [`TestNode`].
pub struct TestNodeBuilder {
    script: String,
    peers: Vec<String>,
    failing_discovery: bool,
    with_template: bool,
}

impl TestNodeBuilder {
    /// Body of the fake server script. `$2` is the config path, `$4` the log path.
    pub fn script(mut self, body: &str) -> Self {
        self.script = body.to_string();
        self
    }

    pub fn peers(mut self, peers: &[&str]) -> Self {
        self.peers = peers.iter().map(ToString::to_string).collect();
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.failing_discovery = true;
        self
    }

    pub fn without_template(mut self) -> Self {
        self.with_template = false;
        self
    }

    pub fn build(self) -> TestNode {
        let dir = TempDir::new().unwrap();
        let executable = write_script(dir.path(), &self.script);
        let template = dir.path().join("nats.template.conf");
        if self.with_template {
            std::fs::write(&template, TEMPLATE).unwrap();
        }
        let discovery = if self.failing_discovery {
            CountingDiscovery::failing()
        } else {
            let peers: Vec<&str> = self.peers.iter().map(String::as_str).collect();
            CountingDiscovery::new(&peers)
        };
        TestNode {
            dir,
            executable,
            template,
            discovery: Arc::new(discovery),
        }
    }
}

/// A supervised node in a temporary directory.
pub struct TestNode {
    pub dir: TempDir,
    pub executable: PathBuf,
    pub template: PathBuf,
    pub discovery: Arc<CountingDiscovery>,
}

impl TestNode {
    pub fn builder() -> TestNodeBuilder {
        TestNodeBuilder {
            script: "exec sleep 30".to_string(),
            peers: Vec::new(),
            failing_discovery: false,
            with_template: true,
        }
    }

    pub fn paths(&self) -> NodePaths {
        NodePaths::new(self.dir.path(), "1")
    }

    /// Fast timing suitable for tests.
    pub fn settings() -> SupervisorSettings {
        SupervisorSettings {
            poll_interval: Duration::from_millis(50),
            grace_timeout: Duration::from_secs(2),
            restart_delay: Duration::from_millis(50),
            cycle_backoff: Backoff::from_millis(50, 200),
            ..SupervisorSettings::default()
        }
    }

    pub fn supervisor(&self) -> NodeSupervisor {
        let paths = self.paths();
        let node = NodeSpec {
            service: ServiceIdentity::new("fabric:/Nats/NatsService"),
            endpoints: NodeEndpoints::new("127.0.0.1", 4222, 6222, 8222),
            template: self.template.clone(),
            launch: LaunchSpec::new(&self.executable, &paths, self.dir.path()),
            paths,
        };
        let resolver = PeerResolver::new(
            Arc::clone(&self.discovery) as Arc<dyn ServiceDiscovery>,
            DiscoverySettings {
                attempts: 2,
                attempt_timeout: Duration::from_millis(500),
                backoff: Backoff::from_millis(10, 20),
            },
        );
        let credentials = ClusterCredentials::new("app", "app-pw", "route", "route-pw");
        NodeSupervisor::new(
            node,
            resolver,
            Arc::new(StaticCredentials::new(credentials)),
            Self::settings(),
        )
        .unwrap()
    }

    pub fn rendered_config(&self) -> String {
        std::fs::read_to_string(self.paths().config_file()).unwrap()
    }

    pub fn captured_output(&self) -> String {
        std::fs::read_to_string(self.paths().capture_file()).unwrap_or_default()
    }
}

/// Wait until the supervisor reports `phase`.
pub async fn wait_for_phase(rx: &mut watch::Receiver<SupervisorPhase>, phase: SupervisorPhase) {
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|p| *p == phase))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase}"))
        .unwrap();
}

/// Poll `condition` until it holds or ten seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 10s");
}
