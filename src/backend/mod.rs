//! Backend-client capability traits and their concrete implementations.
//!
//! The strategies never talk to Docker, Helm or the Kubernetes API
//! directly; they go through the narrow traits defined here so each
//! strategy can be tested against a substitutable fake client.
//!
//! | Module | Purpose |
//! |---|---|
//! | [`docker`] | [`ContainerRuntime`] backed by the Docker Engine API (bollard). |
//! | [`helm`] | [`ChartClient`] backed by the `helm` binary. |
//! | [`cluster`] | [`ClusterClient`] backed by `kube` and the ambient kubeconfig. |

pub mod cluster;
pub mod docker;
pub mod helm;

use async_trait::async_trait;

use crate::error::DeployError;

/// Minimal view of a container returned by a name lookup.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Runtime-assigned container identifier.
    pub id: String,
    /// Whether the container is currently in the `running` state.
    pub running: bool,
}

/// Control-plane operations against a local container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Ensure `image` is present locally, pulling it if absent.
    async fn pull_image(&self, image: &str) -> Result<(), DeployError>;

    /// Look up a container by name, running or not.
    async fn find_container(&self, name: &str) -> Result<Option<ContainerSummary>, DeployError>;

    /// Create a container from `image` named `name`, exposing `port` and
    /// asking the host to bind an ephemeral public port on all interfaces.
    /// Returns the new container's identifier.
    async fn create_container(
        &self,
        name: &str,
        image: &str,
        port: u16,
    ) -> Result<String, DeployError>;

    /// Restart a container.
    async fn restart_container(&self, id: &str) -> Result<(), DeployError>;

    /// Start a container.  Starting an already-running container is a no-op.
    async fn start_container(&self, id: &str) -> Result<(), DeployError>;

    /// Discover the host port the runtime mapped onto the container's
    /// exposed `port`.
    async fn host_port(&self, id: &str, port: u16) -> Result<u16, DeployError>;

    /// Force-remove a container.
    async fn remove_container(&self, id: &str) -> Result<(), DeployError>;
}

/// A release known to the package manager.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ReleaseInfo {
    /// Release name.
    pub name: String,
    /// Namespace the release is installed in.
    pub namespace: String,
}

/// Chart lifecycle operations against the cluster package manager.
#[async_trait]
pub trait ChartClient: Send + Sync {
    /// List releases across all namespaces.
    async fn list_releases(&self) -> Result<Vec<ReleaseInfo>, DeployError>;

    /// Locate `chart`, load it, and install it as `release` under
    /// `namespace` with the given rendered YAML values.
    async fn install(
        &self,
        release: &str,
        chart: &str,
        namespace: &str,
        values_yaml: &str,
    ) -> Result<(), DeployError>;

    /// Uninstall a release by name.
    async fn uninstall(&self, release: &str) -> Result<(), DeployError>;
}

/// Read-only queries against the Kubernetes cluster itself.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Host of the cluster API endpoint, scheme stripped.
    async fn api_server_host(&self) -> Result<String, DeployError>;

    /// Cluster-internal IP of a service.
    async fn service_cluster_ip(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<String, DeployError>;
}
