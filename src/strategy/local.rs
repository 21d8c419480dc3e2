//! Container-backed deployment strategy.
//!
//! Runs the canonical Redis image as a single named container on a local
//! runtime.  Deploy is reuse-or-create: an existing container under the
//! canonical name is restarted/started rather than duplicated, so repeated
//! Deploy calls leave exactly one running instance.

use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::backend::ContainerRuntime;
use crate::context::OpContext;
use crate::error::DeployError;
use crate::strategy::{DeploymentStrategy, REDIS_PORT};
use crate::types::{ClientConfig, DeploymentConfig};

/// Canonical Redis image for local deployments.
pub const REDIS_IMAGE: &str = "redis:6.2.4-alpine";
/// Canonical container name; at most one managed instance per runtime.
pub const CONTAINER_NAME: &str = "corral_redis";

/// Recorded after a successful Deploy, read by Undeploy.
#[derive(Debug, Clone)]
struct LocalState {
    container_id: String,
    host_port: u16,
}

/// Deployment strategy against a local container runtime.
///
/// # Thread safety
///
/// The transport may dispatch concurrent calls; the recorded state is a
/// single-writer resource, so the mutex is held across the whole
/// reuse-or-create sequence.  The read-then-act window against the daemon
/// itself (a second plugin process racing on the canonical name) remains
/// an accepted limitation.
pub struct LocalStrategy<R> {
    runtime: R,
    state: Mutex<Option<LocalState>>,
}

impl<R: ContainerRuntime> LocalStrategy<R> {
    /// Build a strategy around an injected container runtime client.
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            state: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl<R: ContainerRuntime> DeploymentStrategy for LocalStrategy<R> {
    #[instrument(skip_all)]
    async fn deploy(
        &self,
        _ctx: &OpContext,
        _config: &DeploymentConfig,
    ) -> Result<ClientConfig, DeployError> {
        let mut state = self.state.lock().await;

        self.runtime.pull_image(REDIS_IMAGE).await?;

        let id = match self.runtime.find_container(CONTAINER_NAME).await? {
            Some(existing) => {
                debug!(id = existing.id, running = existing.running, "reusing existing container");
                if !existing.running {
                    self.runtime
                        .restart_container(&existing.id)
                        .await
                        .map_err(|e| {
                            DeployError::backend(
                                "container restart",
                                format!("found an existing local instance but could not restart it: {e}"),
                            )
                        })?;
                }
                existing.id
            }
            None => {
                self.runtime
                    .create_container(CONTAINER_NAME, REDIS_IMAGE, REDIS_PORT)
                    .await?
            }
        };

        // No-op when the container is already running.
        self.runtime.start_container(&id).await?;

        let host_port = self.runtime.host_port(&id, REDIS_PORT).await?;

        *state = Some(LocalState {
            container_id: id.clone(),
            host_port,
        });

        info!(id, host_port, "local redis deployed");
        Ok(ClientConfig::single(format!("127.0.0.1:{host_port}")))
    }

    #[instrument(skip_all)]
    async fn undeploy(
        &self,
        _ctx: &OpContext,
        _config: &DeploymentConfig,
    ) -> Result<(), DeployError> {
        let mut state = self.state.lock().await;

        let Some(deployed) = state.as_ref() else {
            return Err(DeployError::NotFound("redis was not deployed".to_owned()));
        };
        let id = deployed.container_id.clone();

        self.runtime.remove_container(&id).await?;

        // Clear only after the removal is confirmed: a failed removal must
        // not silently look "undeployed".
        *state = None;
        info!(id, "local redis undeployed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::backend::ContainerSummary;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Pull,
        Find,
        Create,
        Restart,
        Start,
        Inspect,
        Remove,
    }

    #[derive(Default)]
    struct FakeState {
        calls: Vec<Call>,
        /// name -> (id, running)
        containers: HashMap<String, (String, bool)>,
        /// id -> host port
        ports: HashMap<String, u16>,
        next_port: u16,
        fail_restart: bool,
        fail_remove: bool,
    }

    /// In-memory container runtime mimicking the daemon's reuse semantics.
    struct FakeRuntime {
        state: StdMutex<FakeState>,
    }

    impl FakeRuntime {
        fn new() -> Self {
            Self {
                state: StdMutex::new(FakeState {
                    next_port: 49153,
                    ..Default::default()
                }),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        fn count(&self, call: Call) -> usize {
            self.calls().iter().filter(|c| **c == call).count()
        }

        fn container_count(&self) -> usize {
            self.state.lock().unwrap().containers.len()
        }
    }

    #[async_trait::async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn pull_image(&self, _image: &str) -> Result<(), DeployError> {
            self.state.lock().unwrap().calls.push(Call::Pull);
            Ok(())
        }

        async fn find_container(
            &self,
            name: &str,
        ) -> Result<Option<ContainerSummary>, DeployError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Find);
            Ok(state.containers.get(name).map(|(id, running)| ContainerSummary {
                id: id.clone(),
                running: *running,
            }))
        }

        async fn create_container(
            &self,
            name: &str,
            _image: &str,
            _port: u16,
        ) -> Result<String, DeployError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Create);
            let id = format!("cid-{}", state.containers.len() + 1);
            let port = state.next_port;
            state.next_port += 1;
            state.containers.insert(name.to_owned(), (id.clone(), false));
            state.ports.insert(id.clone(), port);
            Ok(id)
        }

        async fn restart_container(&self, id: &str) -> Result<(), DeployError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Restart);
            if state.fail_restart {
                return Err(DeployError::backend("container restart", "daemon refused"));
            }
            for entry in state.containers.values_mut() {
                if entry.0 == id {
                    entry.1 = true;
                }
            }
            Ok(())
        }

        async fn start_container(&self, id: &str) -> Result<(), DeployError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Start);
            for entry in state.containers.values_mut() {
                if entry.0 == id {
                    entry.1 = true;
                }
            }
            Ok(())
        }

        async fn host_port(&self, id: &str, _port: u16) -> Result<u16, DeployError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Inspect);
            state.ports.get(id).copied().ok_or_else(|| {
                DeployError::PortResolution("no host binding for 6379/tcp".to_owned())
            })
        }

        async fn remove_container(&self, id: &str) -> Result<(), DeployError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Remove);
            if state.fail_remove {
                return Err(DeployError::backend("container remove", "device busy"));
            }
            state.containers.retain(|_, (cid, _)| cid != id);
            Ok(())
        }
    }

    fn background() -> OpContext {
        OpContext::background()
    }

    fn config() -> DeploymentConfig {
        DeploymentConfig::default()
    }

    #[tokio::test]
    async fn deploy_creates_starts_and_reports_address() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        let conf = strategy.deploy(&background(), &config()).await.unwrap();

        assert_eq!(conf.addrs, vec!["127.0.0.1:49153"]);
        assert_eq!(conf.db, 0);
        assert!(conf.user.is_none() && conf.password.is_none());
        assert_eq!(strategy.runtime.count(Call::Create), 1);
        assert_eq!(strategy.runtime.count(Call::Start), 1);
    }

    #[tokio::test]
    async fn deploy_is_idempotent() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        let first = strategy.deploy(&background(), &config()).await.unwrap();
        let second = strategy.deploy(&background(), &config()).await.unwrap();

        // Identical address, exactly one container, exactly one create.
        assert_eq!(first.addrs, second.addrs);
        assert_eq!(strategy.runtime.count(Call::Create), 1);
        assert_eq!(strategy.runtime.container_count(), 1);
    }

    #[tokio::test]
    async fn deploy_restarts_a_stopped_container() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        strategy.deploy(&background(), &config()).await.unwrap();

        // Stop the container behind the strategy's back.
        {
            let mut state = strategy.runtime.state.lock().unwrap();
            state.containers.get_mut(CONTAINER_NAME).unwrap().1 = false;
        }

        strategy.deploy(&background(), &config()).await.unwrap();
        assert_eq!(strategy.runtime.count(Call::Restart), 1);
        assert_eq!(strategy.runtime.count(Call::Create), 1);
    }

    #[tokio::test]
    async fn restart_failure_is_fatal_for_the_call() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        strategy.deploy(&background(), &config()).await.unwrap();
        {
            let mut state = strategy.runtime.state.lock().unwrap();
            state.containers.get_mut(CONTAINER_NAME).unwrap().1 = false;
            state.fail_restart = true;
        }

        let err = strategy.deploy(&background(), &config()).await.unwrap_err();
        assert!(matches!(err, DeployError::BackendOperation { .. }));
        assert!(err.to_string().contains("could not restart"));
    }

    #[tokio::test]
    async fn missing_port_mapping_is_port_resolution_error() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        strategy.deploy(&background(), &config()).await.unwrap();
        {
            let mut state = strategy.runtime.state.lock().unwrap();
            state.ports.clear();
            state.containers.get_mut(CONTAINER_NAME).unwrap().1 = false;
        }

        let err = strategy.deploy(&background(), &config()).await.unwrap_err();
        assert!(matches!(err, DeployError::PortResolution(_)));
    }

    #[tokio::test]
    async fn undeploy_before_deploy_is_not_found() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        let err = strategy.undeploy(&background(), &config()).await.unwrap_err();
        assert!(matches!(err, DeployError::NotFound(_)));
        // No backend work happened.
        assert!(strategy.runtime.calls().is_empty());
    }

    #[tokio::test]
    async fn second_undeploy_is_not_found() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        strategy.deploy(&background(), &config()).await.unwrap();
        strategy.undeploy(&background(), &config()).await.unwrap();

        let err = strategy.undeploy(&background(), &config()).await.unwrap_err();
        assert!(matches!(err, DeployError::NotFound(_)));
        assert_eq!(strategy.runtime.container_count(), 0);
    }

    #[tokio::test]
    async fn failed_removal_keeps_state_recorded() {
        let strategy = LocalStrategy::new(FakeRuntime::new());
        strategy.deploy(&background(), &config()).await.unwrap();
        strategy.runtime.state.lock().unwrap().fail_remove = true;

        let err = strategy.undeploy(&background(), &config()).await.unwrap_err();
        assert!(matches!(err, DeployError::BackendOperation { .. }));

        // The deployment must still be visible: a retry reaches the daemon
        // again instead of failing NotFound.
        strategy.runtime.state.lock().unwrap().fail_remove = false;
        strategy.undeploy(&background(), &config()).await.unwrap();
    }
}
