//! TCP listener that dispatches incoming plugin requests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::DeployError;
use crate::message::PluginMessage;
use crate::server::PluginServer;

/// Upper bound on a single request body.
const MAX_REQUEST_BYTES: u64 = 1024 * 1024;

/// A listener that accepts TCP connections and feeds each request to a
/// [`PluginServer`].
///
/// The protocol is deliberately small: the client writes one
/// JSON-serialized [`PluginMessage`] and half-closes its write side; the
/// server reads to EOF, dispatches, writes the JSON response, and closes.
pub struct PluginListener {
    listener: TcpListener,
    server: Arc<PluginServer>,
}

impl PluginListener {
    /// Bind to `addr` (typically `127.0.0.1:0` for an OS-assigned port).
    pub async fn bind(addr: &str, server: Arc<PluginServer>) -> Result<Self, DeployError> {
        let listener = TcpListener::bind(addr).await.map_err(DeployError::transport)?;
        info!(addr = %listener.local_addr().map_err(DeployError::transport)?, "plugin listening");
        Ok(Self { listener, server })
    }

    /// The bound address, e.g. to print the readiness handshake line.
    pub fn local_addr(&self) -> Result<SocketAddr, DeployError> {
        self.listener.local_addr().map_err(DeployError::transport)
    }

    /// Accept connections until the process exits.  Each connection is
    /// handled on its own task; nothing here serializes calls.
    pub async fn serve(&self) -> Result<(), DeployError> {
        loop {
            let (stream, remote) = self
                .listener
                .accept()
                .await
                .map_err(DeployError::transport)?;
            debug!(%remote, "connection accepted");

            let server = Arc::clone(&self.server);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &server).await {
                    error!(%remote, error = %e, "connection handler error");
                }
            });
        }
    }
}

/// Process a single connection: read request → dispatch → write response.
async fn handle_connection(
    stream: TcpStream,
    server: &PluginServer,
) -> Result<(), DeployError> {
    let (read_half, mut write_half) = stream.into_split();

    let mut buf = Vec::new();
    read_half
        .take(MAX_REQUEST_BYTES)
        .read_to_end(&mut buf)
        .await
        .map_err(DeployError::transport)?;

    let response = match serde_json::from_slice::<PluginMessage>(&buf) {
        Ok(request) => {
            debug!(%request, "request received");
            server.dispatch(request).await
        }
        Err(e) => {
            warn!(error = %e, "malformed request");
            PluginMessage::Error(DeployError::Transport(format!("malformed request: {e}")))
        }
    };

    let payload = serde_json::to_vec(&response).map_err(DeployError::transport)?;
    write_half
        .write_all(&payload)
        .await
        .map_err(DeployError::transport)?;
    write_half.shutdown().await.map_err(DeployError::transport)?;
    Ok(())
}
