//! Peer discovery for the clustered server.
//!
//! The platform's discovery subsystem returns one endpoint record per
//! registered replica of the service, healthy or not. Each record carries a
//! JSON payload mapping endpoint roles to addresses; the resolver keeps only
//! the cluster-routing role and drops this node's own address.
//!
//! Discovery is allowed to fail. Timeouts and transient errors are retried
//! with exponential backoff for a bounded number of attempts, after which the
//! resolver fails open: it returns an empty peer set and the node starts as a
//! single-node server. That outcome is reported as
//! [`ResolutionOutcome::FailedOpen`] and logged at warn level.
//!
//! ## Module Structure
//!
//! - [`StaticDiscovery`]: fixed peer list from configuration
//! - [`FileDiscovery`]: JSON registry file re-read on every call

mod file;
mod static_list;

pub use file::FileDiscovery;
pub use static_list::StaticDiscovery;

use crate::constants::{
    DEFAULT_DISCOVERY_ATTEMPTS, DEFAULT_DISCOVERY_BACKOFF_BASE_MS,
    DEFAULT_DISCOVERY_BACKOFF_MAX_MS, DEFAULT_DISCOVERY_TIMEOUT_MS,
};
use crate::endpoints::{EndpointPayload, PeerAddress, ServiceIdentity};
use crate::error::{Error, Result};
use crate::reliability::Backoff;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// The platform's service-discovery mechanism.
#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    /// All endpoint records currently registered under `service`.
    async fn resolve(&self, service: &ServiceIdentity) -> Result<Vec<EndpointRecord>>;
}

/// One registered replica, as returned by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRecord {
    /// Raw registration payload (JSON).
    pub address: String,
}

impl EndpointRecord {
    /// Record from a raw payload.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Record from a typed payload.
    pub fn from_payload(payload: &EndpointPayload) -> Self {
        // Serializing a map of strings cannot fail.
        Self::new(serde_json::to_string(payload).unwrap_or_default())
    }

    /// Cluster-routing address carried by the record.
    pub fn cluster_address(&self) -> Result<PeerAddress> {
        EndpointPayload::parse(&self.address)?.cluster_address()
    }
}

/// Retry settings for peer resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverySettings {
    /// Attempts before failing open (at least one is always made).
    pub attempts: u32,
    /// Timeout of each attempt.
    pub attempt_timeout: Duration,
    /// Delay between attempts.
    pub backoff: Backoff,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_DISCOVERY_ATTEMPTS,
            attempt_timeout: Duration::from_millis(DEFAULT_DISCOVERY_TIMEOUT_MS),
            backoff: Backoff::from_millis(
                DEFAULT_DISCOVERY_BACKOFF_BASE_MS,
                DEFAULT_DISCOVERY_BACKOFF_MAX_MS,
            ),
        }
    }
}

/// How a resolution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Discovery answered.
    Resolved {
        /// Attempt that succeeded (1-based).
        attempt: u32,
    },
    /// Every attempt failed; the peer set is empty.
    FailedOpen {
        /// Attempts made.
        attempts: u32,
        /// Last error seen.
        last_error: String,
    },
}

/// Result of one peer resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerResolution {
    /// Cluster addresses of other replicas, deduplicated and sorted.
    pub peers: BTreeSet<PeerAddress>,
    /// Records skipped because their payload was malformed.
    pub malformed: usize,
    /// How the resolution ended.
    pub outcome: ResolutionOutcome,
}

impl PeerResolution {
    /// Whether discovery was given up on.
    pub const fn failed_open(&self) -> bool {
        matches!(self.outcome, ResolutionOutcome::FailedOpen { .. })
    }
}

/// Resolves the cluster addresses of sibling replicas.
#[derive(Clone)]
pub struct PeerResolver {
    discovery: Arc<dyn ServiceDiscovery>,
    settings: DiscoverySettings,
}

impl PeerResolver {
    /// Resolver over a discovery back-end.
    pub fn new(discovery: Arc<dyn ServiceDiscovery>, settings: DiscoverySettings) -> Self {
        Self {
            discovery,
            settings,
        }
    }

    /// Retry settings in use.
    pub const fn settings(&self) -> &DiscoverySettings {
        &self.settings
    }

    /// Resolve peers of `service`, excluding `own`.
    ///
    /// Never fails: after the last failed attempt the result is an empty
    /// peer set with a [`ResolutionOutcome::FailedOpen`] outcome.
    pub async fn resolve(&self, service: &ServiceIdentity, own: &PeerAddress) -> PeerResolution {
        let attempts = self.settings.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.attempt(service).await {
                Ok(records) => {
                    let (peers, malformed) = extract_peers(&records, own);
                    tracing::debug!(
                        service = %service,
                        attempt = attempt,
                        records = records.len(),
                        peers = peers.len(),
                        "Resolved cluster peers"
                    );
                    return PeerResolution {
                        peers,
                        malformed,
                        outcome: ResolutionOutcome::Resolved { attempt },
                    };
                },
                Err(e) => {
                    last_error = e.to_string();
                    if !e.is_retryable() {
                        tracing::warn!(service = %service, error = %e, "Discovery failed permanently");
                        return Self::fail_open(service, attempt, last_error);
                    }
                    if attempt < attempts {
                        let backoff = self.settings.backoff.delay(attempt);
                        tracing::debug!(
                            service = %service,
                            attempt = attempt,
                            backoff_ms = backoff.as_millis(),
                            error = %e,
                            "Discovery failed, retrying..."
                        );
                        tokio::time::sleep(backoff).await;
                    }
                },
            }
        }

        Self::fail_open(service, attempts, last_error)
    }

    async fn attempt(&self, service: &ServiceIdentity) -> Result<Vec<EndpointRecord>> {
        let timeout = self.settings.attempt_timeout;
        tokio::time::timeout(timeout, self.discovery.resolve(service))
            .await
            .map_err(|_| Error::DiscoveryTimeout {
                service: service.to_string(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }

    fn fail_open(service: &ServiceIdentity, attempts: u32, last_error: String) -> PeerResolution {
        tracing::warn!(
            service = %service,
            attempts = attempts,
            error = %last_error,
            "Peer discovery gave up, starting without cluster routes"
        );
        PeerResolution {
            peers: BTreeSet::new(),
            malformed: 0,
            outcome: ResolutionOutcome::FailedOpen {
                attempts,
                last_error,
            },
        }
    }
}

/// Extract foreign cluster addresses, skipping malformed records.
fn extract_peers(records: &[EndpointRecord], own: &PeerAddress) -> (BTreeSet<PeerAddress>, usize) {
    let mut peers = BTreeSet::new();
    let mut malformed = 0;

    for record in records {
        match record.cluster_address() {
            Ok(addr) if addr == *own => {},
            Ok(addr) => {
                peers.insert(addr);
            },
            Err(e) => {
                malformed += 1;
                tracing::warn!(record = %record.address, error = %e, "Skipping endpoint record");
            },
        }
    }

    (peers, malformed)
}
