//! Discovery over a fixed list of cluster addresses.

use super::{EndpointRecord, ServiceDiscovery};
use crate::endpoints::{EndpointPayload, EndpointRole, PeerAddress, ServiceIdentity};
use crate::error::Result;
use async_trait::async_trait;

/// Returns the same peers for every service identity.
///
/// Useful for fixed-size clusters whose members are known up front. The
/// list may include this node; the resolver drops it.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    peers: Vec<PeerAddress>,
}

impl StaticDiscovery {
    /// Discovery over `peers`.
    pub fn new(peers: impl IntoIterator<Item = PeerAddress>) -> Self {
        Self {
            peers: peers.into_iter().collect(),
        }
    }

    /// Parse each entry as `host:port`.
    pub fn parse<S: AsRef<str>>(peers: &[S]) -> Result<Self> {
        let peers = peers
            .iter()
            .map(|p| p.as_ref().parse())
            .collect::<Result<Vec<PeerAddress>>>()?;
        Ok(Self { peers })
    }
}

#[async_trait]
impl ServiceDiscovery for StaticDiscovery {
    async fn resolve(&self, _service: &ServiceIdentity) -> Result<Vec<EndpointRecord>> {
        Ok(self
            .peers
            .iter()
            .map(|peer| {
                let mut payload = EndpointPayload::default();
                payload.endpoints.insert(
                    EndpointRole::Cluster.registration_name().to_string(),
                    peer.to_string(),
                );
                EndpointRecord::from_payload(&payload)
            })
            .collect())
    }
}
