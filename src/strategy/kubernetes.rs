//! Chart-backed deployment strategy for Kubernetes clusters.
//!
//! Installs the canonical Redis chart as a single canonically-named
//! release.  Deploy is idempotent at two levels: the chart repository is
//! registered only when missing from the registration file (no network
//! access otherwise), and the install is skipped entirely when a release
//! with the canonical name already exists in any namespace.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::backend::{ChartClient, ClusterClient};
use crate::context::OpContext;
use crate::error::DeployError;
use crate::repo::{RepoEntry, RepoRegistry};
use crate::strategy::{DeploymentStrategy, REDIS_PORT};
use crate::types::{ClientConfig, DeploymentConfig};

/// Canonical chart repository registration.
pub const CHART_REPO_NAME: &str = "groundhog2k";
/// URL the canonical chart repository is served from.
pub const CHART_REPO_URL: &str = "https://groundhog2k.github.io/helm-charts/";
/// Canonical chart reference.
pub const CHART: &str = "groundhog2k/redis";
/// Canonical release name; at most one managed release per cluster.
pub const RELEASE_NAME: &str = "corral-redis";

/// Fixed memory limit applied to every install.
const MEMORY_LIMIT: &str = "512Mi";

/// The canonical repository as a registration entry.
pub fn chart_repo() -> RepoEntry {
    RepoEntry::new(CHART_REPO_NAME, CHART_REPO_URL)
}

// ---------------------------------------------------------------------------
// Install values
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChartValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<ServiceValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<StorageValues>,
    resources: ResourceValues,
}

#[derive(Debug, Serialize)]
struct ServiceValues {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(rename = "nodePort")]
    node_port: u16,
}

#[derive(Debug, Serialize)]
struct StorageValues {
    #[serde(rename = "className")]
    class_name: String,
}

#[derive(Debug, Serialize)]
struct ResourceValues {
    limits: LimitValues,
}

#[derive(Debug, Serialize)]
struct LimitValues {
    memory: String,
}

/// Render the install values for a request: fixed memory limit, the
/// caller's storage class, and a NodePort service only when the caller
/// asked to be reachable from outside the cluster.
fn render_values(config: &DeploymentConfig) -> Result<String, DeployError> {
    let values = ChartValues {
        service: config.node_port.map(|port| ServiceValues {
            service_type: "NodePort".to_owned(),
            node_port: port,
        }),
        storage: (!config.storage_class.is_empty()).then(|| StorageValues {
            class_name: config.storage_class.clone(),
        }),
        resources: ResourceValues {
            limits: LimitValues {
                memory: MEMORY_LIMIT.to_owned(),
            },
        },
    };
    serde_yaml::to_string(&values)
        .map_err(|e| DeployError::Configuration(format!("render chart values: {e}")))
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Deployment strategy against a Kubernetes cluster.
///
/// All bookkeeping lives in the cluster itself (the release under its
/// canonical name), so unlike the local strategy there is no in-process
/// mutable state to guard.
pub struct KubernetesStrategy<H, C> {
    helm: H,
    cluster: C,
    repos: RepoRegistry,
}

impl<H: ChartClient, C: ClusterClient> KubernetesStrategy<H, C> {
    /// Build a strategy around injected package-manager and cluster
    /// clients.
    pub fn new(helm: H, cluster: C, repos: RepoRegistry) -> Self {
        Self {
            helm,
            cluster,
            repos,
        }
    }
}

#[async_trait::async_trait]
impl<H: ChartClient, C: ClusterClient> DeploymentStrategy for KubernetesStrategy<H, C> {
    #[instrument(skip_all, fields(namespace = %config.namespace))]
    async fn deploy(
        &self,
        _ctx: &OpContext,
        config: &DeploymentConfig,
    ) -> Result<ClientConfig, DeployError> {
        self.repos.ensure_registered(&chart_repo()).await?;

        let values = render_values(config)?;

        let releases = self.helm.list_releases().await?;
        if let Some(existing) = releases.iter().find(|r| r.name == RELEASE_NAME) {
            debug!(
                namespace = existing.namespace,
                "release already installed, skipping install"
            );
        } else {
            self.helm
                .install(RELEASE_NAME, CHART, &config.namespace, &values)
                .await?;
            info!(
                release = RELEASE_NAME,
                namespace = config.namespace,
                "chart installed"
            );
        }

        let addr = match config.node_port {
            // The caller asked for an externally reachable port: combine it
            // with the cluster API endpoint's host.
            Some(port) => format!("{}:{port}", self.cluster.api_server_host().await?),
            None => {
                let ip = self
                    .cluster
                    .service_cluster_ip(&config.namespace, &format!("{RELEASE_NAME}-master"))
                    .await?;
                format!("{ip}:{REDIS_PORT}")
            }
        };

        Ok(ClientConfig::single(addr))
    }

    #[instrument(skip_all)]
    async fn undeploy(
        &self,
        _ctx: &OpContext,
        _config: &DeploymentConfig,
    ) -> Result<(), DeployError> {
        self.helm.uninstall(RELEASE_NAME).await?;
        info!(release = RELEASE_NAME, "release uninstalled");
        Ok(())
    }
}
