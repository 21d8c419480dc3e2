//! [`ContainerRuntime`] implementation backed by the Docker Engine API.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use futures_util::TryStreamExt;
use tracing::{debug, instrument};

use crate::backend::{ContainerRuntime, ContainerSummary};
use crate::error::DeployError;

/// Docker-backed container runtime.
///
/// Connects through the platform's default daemon socket; the connection
/// is lazy, so construction succeeds even when the daemon is down and the
/// first operation surfaces the [`DeployError::Connectivity`] instead.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect with the platform's local defaults (`DOCKER_HOST` or the
    /// standard daemon socket).
    pub fn connect() -> Result<Self, DeployError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DeployError::Configuration(format!("docker client: {e}")))?;
        Ok(Self { docker })
    }
}

/// Classify a bollard error: answers from the daemon are backend-operation
/// failures, everything else means we never reached it.
fn classify(op: &str, e: bollard::errors::Error) -> DeployError {
    match e {
        bollard::errors::Error::DockerResponseServerError { message, .. } => {
            DeployError::backend(op, message)
        }
        other => DeployError::connectivity(other),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    #[instrument(skip(self))]
    async fn pull_image(&self, image: &str) -> Result<(), DeployError> {
        self.docker
            .create_image(
                Some(CreateImageOptions {
                    from_image: image,
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| classify("image pull", e))?;
        debug!(image, "image present");
        Ok(())
    }

    async fn find_container(&self, name: &str) -> Result<Option<ContainerSummary>, DeployError> {
        let candidates = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters: HashMap::from([("name", vec![name])]),
                ..Default::default()
            }))
            .await
            .map_err(|e| classify("container list", e))?;

        Ok(candidates.into_iter().next().map(|c| ContainerSummary {
            id: c.id.unwrap_or_default(),
            running: c.state.as_deref() == Some("running"),
        }))
    }

    #[instrument(skip(self))]
    async fn create_container(
        &self,
        name: &str,
        image: &str,
        port: u16,
    ) -> Result<String, DeployError> {
        let exposed = format!("{port}/tcp");
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name,
                    platform: None,
                }),
                Config {
                    image: Some(image.to_owned()),
                    exposed_ports: Some(HashMap::from([(exposed.clone(), HashMap::new())])),
                    tty: Some(false),
                    host_config: Some(HostConfig {
                        port_bindings: Some(HashMap::from([(
                            exposed,
                            // No host port: the daemon allocates an ephemeral one.
                            Some(vec![PortBinding {
                                host_ip: Some("0.0.0.0".to_owned()),
                                host_port: None,
                            }]),
                        )])),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| classify("container create", e))?;
        Ok(created.id)
    }

    async fn restart_container(&self, id: &str) -> Result<(), DeployError> {
        self.docker
            .restart_container(id, None::<RestartContainerOptions>)
            .await
            .map_err(|e| classify("container restart", e))
    }

    async fn start_container(&self, id: &str) -> Result<(), DeployError> {
        match self
            .docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            // 304: already started.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(classify("container start", e)),
        }
    }

    async fn host_port(&self, id: &str, port: u16) -> Result<u16, DeployError> {
        let inspected = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| classify("container inspect", e))?;

        let bindings = inspected
            .network_settings
            .and_then(|ns| ns.ports)
            .and_then(|mut ports| ports.remove(&format!("{port}/tcp")).flatten())
            .unwrap_or_default();

        bindings
            .into_iter()
            .find_map(|b| b.host_port.and_then(|p| p.parse::<u16>().ok()))
            .ok_or_else(|| {
                DeployError::PortResolution(format!("no host binding for {port}/tcp"))
            })
    }

    async fn remove_container(&self, id: &str) -> Result<(), DeployError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| classify("container remove", e))
    }
}
