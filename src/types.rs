//! Core plugin types: deployment requests, client configuration, and the
//! soft-error payload.
//!
//! These types form the data model shared by the strategy trait, the
//! transport layer, and the backend implementations.  They are all
//! [`Serialize`]/[`Deserialize`] so they can be transmitted over TCP as
//! JSON.

use serde::{Deserialize, Serialize};

/// Caller-supplied request parameters for a Deploy / Undeploy call.
///
/// The dispatcher treats this value as opaque; it is interpreted only by
/// the active strategy (and the local strategy ignores every field).
/// Immutable once received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Kubernetes namespace the release is installed into.
    #[serde(default)]
    pub namespace: String,
    /// Storage class requested for the Redis persistent volume.
    #[serde(default)]
    pub storage_class: String,
    /// Externally reachable NodePort, if the caller wants one.  When unset
    /// the cluster-internal service address is returned instead.
    #[serde(default)]
    pub node_port: Option<u16>,
}

/// Result of a successful Deploy: everything a client needs to connect.
///
/// `addrs` is never empty on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Reachable `host:port` addresses, in preference order.
    pub addrs: Vec<String>,
    /// Redis logical database index.
    #[serde(default)]
    pub db: u32,
    /// Username, if the instance requires authentication.
    #[serde(default)]
    pub user: Option<String>,
    /// Password, if the instance requires authentication.
    #[serde(default)]
    pub password: Option<String>,
    /// Route read commands to the lowest-latency node.
    #[serde(default)]
    pub route_by_latency: bool,
    /// Route read commands randomly across nodes.
    #[serde(default)]
    pub route_randomly: bool,
}

impl ClientConfig {
    /// Build a config pointing at a single address with no credentials and
    /// the default database index.
    pub fn single(addr: String) -> Self {
        Self {
            addrs: vec![addr],
            ..Default::default()
        }
    }
}

/// Soft-error payload returned by Undeploy.
///
/// Carried as a *normal* response value rather than a transport-level
/// failure, so callers can distinguish "could not undeploy" from "plugin
/// unreachable".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable failure description.
    pub message: String,
}

impl From<crate::error::DeployError> for ErrorPayload {
    fn from(e: crate::error::DeployError) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}
