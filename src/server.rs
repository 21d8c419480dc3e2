//! The RPC-facing dispatcher.
//!
//! [`PluginServer`] holds the single active strategy (chosen once at
//! startup) and translates between the wire contract and the strategy
//! contract: Deploy failures surface as transport-level errors, Undeploy
//! failures become a soft-error payload, and an already-expired deadline
//! fails immediately with [`DeployError::Timeout`] before any backend work.

use tracing::{instrument, warn};

use crate::context::OpContext;
use crate::error::DeployError;
use crate::message::PluginMessage;
use crate::strategy::DeploymentStrategy;
use crate::types::{ClientConfig, DeploymentConfig, ErrorPayload};

/// Dispatches inbound calls to the active [`DeploymentStrategy`].
pub struct PluginServer {
    strategy: Box<dyn DeploymentStrategy>,
}

impl PluginServer {
    /// Build a server around the strategy selected at process start.
    pub fn new(strategy: Box<dyn DeploymentStrategy>) -> Self {
        Self { strategy }
    }

    /// Deploy: check the deadline, then delegate synchronously and pass the
    /// strategy's result or error through unchanged.
    pub async fn deploy(
        &self,
        ctx: &OpContext,
        config: &DeploymentConfig,
    ) -> Result<ClientConfig, DeployError> {
        if ctx.expired() {
            return Err(DeployError::Timeout);
        }
        self.strategy.deploy(ctx, config).await
    }

    /// Undeploy: check the deadline, then delegate.  A strategy failure is
    /// wrapped into the soft-error payload; success returns `None` — the
    /// canonical absent payload.
    pub async fn undeploy(
        &self,
        ctx: &OpContext,
        config: &DeploymentConfig,
    ) -> Result<Option<ErrorPayload>, DeployError> {
        if ctx.expired() {
            return Err(DeployError::Timeout);
        }
        match self.strategy.undeploy(ctx, config).await {
            Ok(()) => Ok(None),
            Err(e) => Ok(Some(ErrorPayload::from(e))),
        }
    }

    /// Map a request envelope to the matching operation and wrap the result
    /// in a response envelope.
    #[instrument(skip_all, fields(request = %request))]
    pub async fn dispatch(&self, request: PluginMessage) -> PluginMessage {
        match request {
            PluginMessage::Deploy { config, timeout_ms } => {
                let ctx = OpContext::from_timeout_ms(timeout_ms);
                match self.deploy(&ctx, &config).await {
                    Ok(conf) => PluginMessage::Deployed(conf),
                    Err(e) => PluginMessage::Error(e),
                }
            }
            PluginMessage::Undeploy { config, timeout_ms } => {
                let ctx = OpContext::from_timeout_ms(timeout_ms);
                match self.undeploy(&ctx, &config).await {
                    Ok(None) => PluginMessage::Undeployed,
                    Ok(Some(payload)) => PluginMessage::UndeployFailed(payload),
                    Err(e) => PluginMessage::Error(e),
                }
            }
            // Response variants should never arrive as requests.
            other => {
                warn!(msg = %other, "unexpected message variant received as request");
                PluginMessage::Error(DeployError::Transport(format!(
                    "unexpected message: {other}"
                )))
            }
        }
    }
}
