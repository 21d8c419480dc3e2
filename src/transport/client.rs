//! TCP client used by the host orchestrator to issue plugin requests.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::DeployError;
use crate::message::PluginMessage;
use crate::types::{ClientConfig, DeploymentConfig, ErrorPayload};

/// A lightweight client that sends one [`PluginMessage`] per connection and
/// returns the server's response.
pub struct PluginClient {
    addr: SocketAddr,
}

impl PluginClient {
    /// Client for the plugin whose handshake line announced `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Send a request and wait for the corresponding response.
    ///
    /// Opens a fresh connection, writes the JSON-serialized request,
    /// half-closes the write side, then reads the full response.
    pub async fn request(&self, msg: &PluginMessage) -> Result<PluginMessage, DeployError> {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .map_err(DeployError::transport)?;

        let payload = serde_json::to_vec(msg).map_err(DeployError::transport)?;
        stream
            .write_all(&payload)
            .await
            .map_err(DeployError::transport)?;
        // Half-close so the server sees EOF on the request.
        stream.shutdown().await.map_err(DeployError::transport)?;

        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .await
            .map_err(DeployError::transport)?;

        let response: PluginMessage =
            serde_json::from_slice(&buf).map_err(DeployError::transport)?;
        debug!(%response, "response received");
        Ok(response)
    }

    /// Deploy with an optional relative deadline.
    pub async fn deploy(
        &self,
        config: DeploymentConfig,
        timeout_ms: Option<u64>,
    ) -> Result<ClientConfig, DeployError> {
        match self
            .request(&PluginMessage::Deploy { config, timeout_ms })
            .await?
        {
            PluginMessage::Deployed(conf) => Ok(conf),
            PluginMessage::Error(e) => Err(e),
            other => Err(DeployError::Transport(format!(
                "unexpected response: {other}"
            ))),
        }
    }

    /// Undeploy with an optional relative deadline.  `Ok(None)` is success;
    /// `Ok(Some(_))` carries the backend's soft failure.
    pub async fn undeploy(
        &self,
        config: DeploymentConfig,
        timeout_ms: Option<u64>,
    ) -> Result<Option<ErrorPayload>, DeployError> {
        match self
            .request(&PluginMessage::Undeploy { config, timeout_ms })
            .await?
        {
            PluginMessage::Undeployed => Ok(None),
            PluginMessage::UndeployFailed(payload) => Ok(Some(payload)),
            PluginMessage::Error(e) => Err(e),
            other => Err(DeployError::Transport(format!(
                "unexpected response: {other}"
            ))),
        }
    }
}
