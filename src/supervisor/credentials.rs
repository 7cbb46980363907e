//! Credential sources.
//!
//! Credentials are read at the start of every cycle so a rotated password is
//! picked up by the next restart without restarting the supervisor.

use crate::constants::{
    TOKEN_CLUSTER_ROUTE_PASSWORD, TOKEN_CLUSTER_ROUTE_USER, TOKEN_SERVER_AUTH_PASSWORD,
    TOKEN_SERVER_AUTH_USER,
};
use crate::error::Result;
use crate::render::ClusterCredentials;

/// Supplies the credentials for one cycle.
pub trait CredentialSource: Send + Sync {
    /// Current credentials.
    fn load(&self) -> Result<ClusterCredentials>;
}

/// Fixed credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(ClusterCredentials);

impl StaticCredentials {
    /// Always return `credentials`.
    pub const fn new(credentials: ClusterCredentials) -> Self {
        Self(credentials)
    }
}

impl CredentialSource for StaticCredentials {
    fn load(&self) -> Result<ClusterCredentials> {
        Ok(self.0.clone())
    }
}

/// Replace credential fields with environment values where present.
///
/// The variables share their names with the template tokens
/// (`NATS_SERVER_AUTH_USER`, ...). Empty values are ignored.
pub fn apply_env_overrides<F>(mut credentials: ClusterCredentials, lookup: F) -> ClusterCredentials
where
    F: Fn(&str) -> Option<String>,
{
    let fields = [
        (TOKEN_SERVER_AUTH_USER, &mut credentials.server_user),
        (TOKEN_SERVER_AUTH_PASSWORD, &mut credentials.server_password),
        (TOKEN_CLUSTER_ROUTE_USER, &mut credentials.route_user),
        (TOKEN_CLUSTER_ROUTE_PASSWORD, &mut credentials.route_password),
    ];
    for (var, field) in fields {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            *field = value;
        }
    }
    credentials
}
