//! Deployment strategy trait and its two variants.
//!
//! A strategy owns the full lifecycle of the single canonically-named
//! Redis instance on its backend.  Exactly one variant is selected at
//! process start and never switched:
//!
//! | Module | Backend |
//! |---|---|
//! | [`local`] | Local container runtime (Docker). |
//! | [`kubernetes`] | Kubernetes cluster via Helm charts. |

pub mod kubernetes;
pub mod local;

use async_trait::async_trait;

use crate::context::OpContext;
use crate::error::DeployError;
use crate::types::{ClientConfig, DeploymentConfig};

pub use kubernetes::KubernetesStrategy;
pub use local::LocalStrategy;

/// Standard Redis server port.
pub const REDIS_PORT: u16 = 6379;

/// The polymorphic Deploy/Undeploy contract.
///
/// Both operations are coarse-grained and blocking (image pulls, chart
/// installs: seconds to minutes).  Deploy is idempotent against an
/// already-running canonical deployment; Undeploy is only meaningful after
/// a recorded successful Deploy.  Neither operation retries internally —
/// every backend failure is terminal for that call.
#[async_trait]
pub trait DeploymentStrategy: Send + Sync {
    /// Bring the canonical Redis instance up (or reuse it) and return how
    /// to connect.  On success the returned config carries at least one
    /// address.
    async fn deploy(
        &self,
        ctx: &OpContext,
        config: &DeploymentConfig,
    ) -> Result<ClientConfig, DeployError>;

    /// Tear the canonical Redis instance down.
    async fn undeploy(
        &self,
        ctx: &OpContext,
        config: &DeploymentConfig,
    ) -> Result<(), DeployError>;
}
