//! Discovery backed by a JSON registry file.
//!
//! The file maps service identities to the registration payloads of their
//! replicas:
//!
//! ```json
//! {
//!   "fabric:/Nats/NatsService": [
//!     {"Endpoints": {"NATS_Server": "10.0.0.4:4222", "NATS_Cluster": "10.0.0.4:4248"}},
//!     {"Endpoints": {"NATS_Server": "10.0.0.5:4222", "NATS_Cluster": "10.0.0.5:4248"}}
//!   ]
//! }
//! ```
//!
//! The file is re-read on every call, so an external agent can rewrite it
//! as replicas come and go.

use super::{EndpointRecord, ServiceDiscovery};
use crate::endpoints::ServiceIdentity;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Discovery reading a registry file.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    path: PathBuf,
}

impl FileDiscovery {
    /// Discovery over the registry at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ServiceDiscovery for FileDiscovery {
    async fn resolve(&self, service: &ServiceIdentity) -> Result<Vec<EndpointRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Registry file not found, no peers");
                return Ok(Vec::new());
            },
            Err(e) => {
                return Err(Error::discovery(
                    service.as_str(),
                    format!("failed to read {}: {e}", self.path.display()),
                ));
            },
        };

        // A parse failure may be a writer caught mid-update, so it is retryable.
        let mut registry: HashMap<String, Vec<serde_json::Value>> = serde_json::from_str(&content)
            .map_err(|e| {
                Error::discovery(
                    service.as_str(),
                    format!("failed to parse {}: {e}", self.path.display()),
                )
            })?;

        Ok(registry
            .remove(service.as_str())
            .unwrap_or_default()
            .into_iter()
            .map(|payload| EndpointRecord::new(payload.to_string()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const REGISTRY: &str = r#"{
        "fabric:/Nats/NatsService": [
            {"Endpoints": {"NATS_Server": "10.0.0.4:4222", "NATS_Cluster": "10.0.0.4:4248"}},
            {"Endpoints": {"NATS_Server": "10.0.0.5:4222", "NATS_Cluster": "10.0.0.5:4248"}}
        ],
        "fabric:/Other/Service": [
            {"Endpoints": {"NATS_Cluster": "10.9.9.9:4248"}}
        ]
    }"#;

    #[tokio::test]
    async fn test_reads_records_for_service() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        std::fs::write(&path, REGISTRY).unwrap();

        let discovery = FileDiscovery::new(&path);
        let records = discovery
            .resolve(&ServiceIdentity::new("fabric:/Nats/NatsService"))
            .await
            .unwrap();

        let addrs: Vec<String> = records
            .iter()
            .map(|r| r.cluster_address().unwrap().to_string())
            .collect();
        assert_eq!(addrs, vec!["10.0.0.4:4248", "10.0.0.5:4248"]);
    }

    #[tokio::test]
    async fn test_unknown_service_has_no_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        std::fs::write(&path, REGISTRY).unwrap();

        let records = FileDiscovery::new(&path)
            .resolve(&ServiceIdentity::new("fabric:/Missing"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_has_no_records() {
        let temp_dir = TempDir::new().unwrap();
        let records = FileDiscovery::new(temp_dir.path().join("absent.json"))
            .resolve(&ServiceIdentity::new("svc"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_retryable_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let err = FileDiscovery::new(&path)
            .resolve(&ServiceIdentity::new("svc"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
