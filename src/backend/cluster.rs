//! [`ClusterClient`] implementation backed by `kube`.
//!
//! A fresh client session is built from the ambient configuration on every
//! call: the `KUBECONFIG` path if set, otherwise `~/.kube/config`.  Failure
//! to locate or parse the configuration is a
//! [`DeployError::Configuration`].

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use tracing::debug;

use crate::backend::ClusterClient;
use crate::error::DeployError;

/// Kubernetes cluster client using the ambient kubeconfig.
#[derive(Debug, Default)]
pub struct KubeCluster;

impl KubeCluster {
    pub fn new() -> Self {
        Self
    }

    /// Load client configuration from `KUBECONFIG` or the home-directory
    /// default.
    async fn load_config(&self) -> Result<Config, DeployError> {
        let kubeconfig = Kubeconfig::read()
            .map_err(|e| DeployError::Configuration(format!("failed to locate k8s config: {e}")))?;
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| DeployError::Configuration(format!("invalid k8s config: {e}")))
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn api_server_host(&self) -> Result<String, DeployError> {
        let config = self.load_config().await?;
        let host = config
            .cluster_url
            .host()
            .ok_or_else(|| {
                DeployError::Configuration("cluster URL carries no host".to_owned())
            })?
            .to_owned();
        debug!(host, "resolved API server host");
        Ok(host)
    }

    async fn service_cluster_ip(
        &self,
        namespace: &str,
        service: &str,
    ) -> Result<String, DeployError> {
        let config = self.load_config().await?;
        let client = Client::try_from(config).map_err(DeployError::connectivity)?;
        let services: Api<Service> = Api::namespaced(client, namespace);
        let found = services.get(service).await.map_err(|e| {
            DeployError::PortResolution(format!("service {namespace}/{service}: {e}"))
        })?;

        found
            .spec
            .and_then(|spec| spec.cluster_ip)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| {
                DeployError::PortResolution(format!(
                    "service {namespace}/{service} has no cluster IP"
                ))
            })
    }
}
