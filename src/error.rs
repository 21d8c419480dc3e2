//! Deployment error types.
//!
//! All errors in this crate are represented by the [`DeployError`] enum,
//! which derives [`thiserror::Error`] for ergonomic error handling and also
//! implements [`Serialize`]/[`Deserialize`] so errors can travel back to the
//! host orchestrator over the TCP transport.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for plugin operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
pub enum DeployError {
    /// A backend client could not be constructed or its ambient
    /// configuration (Docker socket, kubeconfig, helm binary) is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend system exists but could not be reached.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Undeploy was called without a recorded deployment.
    #[error("not deployed: {0}")]
    NotFound(String),

    /// A backend control-plane operation (create/start/restart/install/
    /// uninstall) failed.
    #[error("{op} failed: {reason}")]
    BackendOperation {
        /// Short name of the operation that failed, e.g. `"container restart"`.
        op: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The exposed port or service address could not be discovered.
    #[error("port resolution failed: {0}")]
    PortResolution(String),

    /// The caller's deadline expired before the operation was dispatched.
    #[error("timeout")]
    Timeout,

    /// A wire / codec-level transport error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeployError {
    /// Create a [`DeployError::BackendOperation`] from an operation name and
    /// anything that implements [`std::fmt::Display`].
    pub fn backend<E: std::fmt::Display>(op: &str, e: E) -> Self {
        Self::BackendOperation {
            op: op.to_owned(),
            reason: e.to_string(),
        }
    }

    /// Create a [`DeployError::Connectivity`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn connectivity<E: std::fmt::Display>(e: E) -> Self {
        Self::Connectivity(e.to_string())
    }

    /// Create a [`DeployError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }
}
