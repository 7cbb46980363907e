//! Endpoint model for a node and its peers.
//!
//! A node owns three endpoints assigned by the host platform for its
//! lifetime: the client-facing service port, the cluster-routing port and the
//! HTTP monitoring port. Each one is reported back to the platform as a
//! `host:port` string, and the platform publishes the set as a JSON payload
//! that other replicas read during peer discovery.

use crate::constants::{LOCALHOST, ROLE_CLUSTER, ROLE_MONITOR, ROLE_SERVER};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Logical endpoint roles of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointRole {
    /// Client-facing service endpoint.
    Server,
    /// Cluster-routing endpoint used by peers to form the mesh.
    Cluster,
    /// HTTP monitoring endpoint.
    Monitor,
}

impl EndpointRole {
    /// All roles, in registration order.
    pub const ALL: [Self; 3] = [Self::Server, Self::Cluster, Self::Monitor];

    /// Name under which the role is registered with service discovery.
    pub const fn registration_name(self) -> &'static str {
        match self {
            Self::Server => ROLE_SERVER,
            Self::Cluster => ROLE_CLUSTER,
            Self::Monitor => ROLE_MONITOR,
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.registration_name())
    }
}

/// Identity of the clustered service in the discovery subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceIdentity(String);

impl ServiceIdentity {
    /// Create a service identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as registered.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated `host:port` address of a node's cluster-routing endpoint.
///
/// IPv6 hosts must be bracketed (`[fd00::1]:4248`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    /// Create an address from an already-separated host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        let address = format!("{host}:{port}");
        validate_host(&host).map_err(|reason| Error::invalid_address(&address, reason))?;
        if port == 0 {
            return Err(Error::invalid_address(address, "port must be non-zero"));
        }
        Ok(Self { host, port })
    }

    /// Host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for PeerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let (host, port) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| Error::invalid_address(trimmed, "expected host:port"))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::invalid_address(trimmed, "port is not a number in 1-65535"))?;
        Self::new(host, port)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn validate_host(host: &str) -> std::result::Result<(), &'static str> {
    if host.is_empty() {
        return Err("host is empty");
    }
    if host.starts_with('[') != host.ends_with(']') {
        return Err("unbalanced IPv6 brackets");
    }
    let inner = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some("") => return Err("empty IPv6 literal"),
        Some(inner) => inner,
        None if host.contains(':') => return Err("IPv6 hosts must be bracketed"),
        None => host,
    };
    if inner.chars().any(|c| {
        c.is_whitespace() || matches!(c, '/' | '@' | '"' | '\'' | ',' | '\\' | '[' | ']')
    }) {
        return Err("host contains a forbidden character");
    }
    Ok(())
}

/// The three endpoints assigned to this node, plus its advertised host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoints {
    /// Host the server binds to and peers connect to.
    pub host: String,
    /// Client-facing service port.
    pub server_port: u16,
    /// Cluster-routing port.
    pub cluster_port: u16,
    /// HTTP monitoring port.
    pub monitor_port: u16,
}

impl NodeEndpoints {
    /// Create the endpoint set.
    pub fn new(host: impl Into<String>, server_port: u16, cluster_port: u16, monitor_port: u16) -> Self {
        Self {
            host: host.into(),
            server_port,
            cluster_port,
            monitor_port,
        }
    }

    /// Port assigned to a role.
    pub const fn port(&self, role: EndpointRole) -> u16 {
        match role {
            EndpointRole::Server => self.server_port,
            EndpointRole::Cluster => self.cluster_port,
            EndpointRole::Monitor => self.monitor_port,
        }
    }

    /// This node's own cluster-routing address, as peers see it.
    pub fn cluster_address(&self) -> Result<PeerAddress> {
        PeerAddress::new(self.host.clone(), self.cluster_port)
    }
}

/// Capability answering "what is my public host for this endpoint".
///
/// Resolved once at startup; the rest of the supervisor only sees the
/// resulting [`NodeEndpoints`].
pub trait AddressProvider: Send + Sync {
    /// Public host for the given role.
    fn public_host(&self, role: EndpointRole) -> String;
}

/// Provider returning the same host for every role.
#[derive(Debug, Clone)]
pub struct FixedAddress {
    host: String,
}

impl FixedAddress {
    /// Provider for an explicit host.
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Provider for the loopback address.
    pub fn localhost() -> Self {
        Self::new(LOCALHOST)
    }

    /// Provider reading the host from an environment variable once.
    ///
    /// Falls back to the loopback address when the variable is unset or
    /// empty.
    pub fn from_env(var: &str) -> Self {
        match std::env::var(var) {
            Ok(host) if !host.trim().is_empty() => Self::new(host.trim()),
            _ => {
                tracing::warn!(var = %var, "Host variable not set, advertising localhost");
                Self::localhost()
            },
        }
    }
}

impl AddressProvider for FixedAddress {
    fn public_host(&self, _role: EndpointRole) -> String {
        self.host.clone()
    }
}

/// JSON payload a node publishes for discovery.
///
/// ```json
/// {"Endpoints": {"NATS_Server": "10.0.0.4:4222", "NATS_Cluster": "10.0.0.4:4248"}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPayload {
    /// Addresses keyed by registration role name.
    #[serde(rename = "Endpoints", default)]
    pub endpoints: BTreeMap<String, String>,
}

impl EndpointPayload {
    /// Parse a registration payload.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::malformed(format!("invalid payload JSON: {e}")))
    }

    /// The validated cluster-routing address of the record.
    pub fn cluster_address(&self) -> Result<PeerAddress> {
        let raw = self
            .endpoints
            .get(EndpointRole::Cluster.registration_name())
            .ok_or_else(|| Error::malformed(format!("missing {} role", EndpointRole::Cluster)))?;
        raw.parse::<PeerAddress>()
            .map_err(|e| Error::malformed(e.to_string()))
    }
}

/// Reports each endpoint back to the host platform as `host:port`.
pub struct EndpointReporter<'a> {
    endpoints: &'a NodeEndpoints,
    provider: &'a dyn AddressProvider,
}

impl<'a> EndpointReporter<'a> {
    /// Reporter over the node's endpoints.
    pub fn new(endpoints: &'a NodeEndpoints, provider: &'a dyn AddressProvider) -> Self {
        Self {
            endpoints,
            provider,
        }
    }

    /// Address string for a role.
    pub fn report(&self, role: EndpointRole) -> String {
        format!("{}:{}", self.provider.public_host(role), self.endpoints.port(role))
    }

    /// The payload published for discovery, covering all roles.
    pub fn registration_payload(&self) -> EndpointPayload {
        EndpointPayload {
            endpoints: EndpointRole::ALL
                .into_iter()
                .map(|role| (role.registration_name().to_string(), self.report(role)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_parse() {
        let addr: PeerAddress = "10.0.0.5:4248".parse().unwrap();
        assert_eq!(addr.host(), "10.0.0.5");
        assert_eq!(addr.port(), 4248);
        assert_eq!(addr.to_string(), "10.0.0.5:4248");
    }

    #[test]
    fn test_peer_address_trims_whitespace() {
        let addr: PeerAddress = "  node-a:7 ".parse().unwrap();
        assert_eq!(addr.to_string(), "node-a:7");
    }

    #[test]
    fn test_peer_address_ipv6() {
        let addr: PeerAddress = "[fd00::1]:4248".parse().unwrap();
        assert_eq!(addr.host(), "[fd00::1]");
        assert!("fd00::1:4248".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn test_peer_address_rejects_garbage() {
        for bad in ["", "host", ":4248", "host:0", "host:99999", "host:abc", "a b:1", "u@h:1"] {
            assert!(bad.parse::<PeerAddress>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_node_cluster_address() {
        let endpoints = NodeEndpoints::new("10.0.0.4", 4222, 4248, 8222);
        assert_eq!(endpoints.cluster_address().unwrap().to_string(), "10.0.0.4:4248");
        assert_eq!(endpoints.port(EndpointRole::Monitor), 8222);
    }

    #[test]
    fn test_payload_cluster_address() {
        let payload = EndpointPayload::parse(
            r#"{"Endpoints":{"NATS_Server":"h:4222","NATS_Cluster":"h:4248","NATS_Monitor":"h:8222"}}"#,
        )
        .unwrap();
        assert_eq!(payload.cluster_address().unwrap().to_string(), "h:4248");
    }

    #[test]
    fn test_payload_missing_cluster_role() {
        let payload = EndpointPayload::parse(r#"{"Endpoints":{"NATS_Server":"h:4222"}}"#).unwrap();
        assert!(matches!(
            payload.cluster_address(),
            Err(Error::MalformedEndpoint { .. })
        ));
    }

    #[test]
    fn test_payload_invalid_json() {
        assert!(matches!(
            EndpointPayload::parse("not json"),
            Err(Error::MalformedEndpoint { .. })
        ));
    }

    #[test]
    fn test_reporter_formats_every_role() {
        let endpoints = NodeEndpoints::new("ignored", 4222, 4248, 8222);
        let provider = FixedAddress::new("10.1.2.3");
        let reporter = EndpointReporter::new(&endpoints, &provider);

        assert_eq!(reporter.report(EndpointRole::Server), "10.1.2.3:4222");
        assert_eq!(reporter.report(EndpointRole::Cluster), "10.1.2.3:4248");

        let payload = reporter.registration_payload();
        assert_eq!(payload.endpoints.len(), 3);
        assert_eq!(payload.cluster_address().unwrap().to_string(), "10.1.2.3:4248");
    }

    #[test]
    fn test_fixed_address_from_unset_env_falls_back() {
        let provider = FixedAddress::from_env("NATSVISOR_TEST_SURELY_UNSET_VAR");
        assert_eq!(provider.public_host(EndpointRole::Server), LOCALHOST);
    }
}
