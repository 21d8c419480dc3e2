//! Plugin protocol messages transmitted over TCP.
//!
//! [`PluginMessage`] is the top-level envelope for all request and response
//! variants exchanged between the host orchestrator and the plugin.  Each
//! TCP connection carries exactly one request followed by one response.

use serde::{Deserialize, Serialize};

use crate::error::DeployError;
use crate::types::{ClientConfig, DeploymentConfig, ErrorPayload};

/// Top-level message envelope for the plugin wire protocol.
///
/// The client sends a *request* variant and the server replies with the
/// corresponding *response* variant (or [`PluginMessage::Error`] for a
/// transport-level failure).  An expired `timeout_ms` fails the call with
/// [`DeployError::Timeout`] before any backend work happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PluginMessage {
    // ----- Requests --------------------------------------------------------
    /// Provision the canonical Redis instance.
    Deploy {
        config: DeploymentConfig,
        /// Relative deadline for the call, in milliseconds.
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// Tear the canonical Redis instance down.
    Undeploy {
        config: DeploymentConfig,
        /// Relative deadline for the call, in milliseconds.
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    // ----- Responses -------------------------------------------------------
    /// Deploy succeeded; here is how to connect.
    Deployed(ClientConfig),
    /// Undeploy succeeded.  Success carries no payload; this absence *is*
    /// the canonical "no error" answer.
    Undeployed,
    /// The backend refused to undeploy.  A soft error, not a transport
    /// fault: the plugin itself is healthy.
    UndeployFailed(ErrorPayload),
    /// A transport-level failure (Deploy errors and expired deadlines land
    /// here).
    Error(DeployError),
}

impl std::fmt::Display for PluginMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deploy { config, .. } => {
                write!(f, "Deploy(namespace={})", config.namespace)
            }
            Self::Undeploy { config, .. } => {
                write!(f, "Undeploy(namespace={})", config.namespace)
            }
            Self::Deployed(conf) => write!(f, "Deployed(addrs={})", conf.addrs.join(",")),
            Self::Undeployed => f.write_str("Undeployed"),
            Self::UndeployFailed(payload) => {
                write!(f, "UndeployFailed({})", payload.message)
            }
            Self::Error(e) => write!(f, "Error({})", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serde_roundtrip() {
        let msg = PluginMessage::Deploy {
            config: DeploymentConfig {
                namespace: "redis-test".into(),
                storage_class: "standard".into(),
                node_port: Some(30841),
            },
            timeout_ms: Some(60_000),
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: PluginMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(
            de,
            PluginMessage::Deploy {
                timeout_ms: Some(60_000),
                ..
            }
        ));
    }

    #[test]
    fn request_without_timeout_deserializes() {
        // Callers that carry no deadline omit the field entirely.
        let json = r#"{"Undeploy":{"config":{}}}"#;
        let de: PluginMessage = serde_json::from_str(json).expect("deserialize");
        assert!(matches!(de, PluginMessage::Undeploy { timeout_ms: None, .. }));
    }

    #[test]
    fn error_message_roundtrip() {
        let msg = PluginMessage::Error(DeployError::Timeout);
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: PluginMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(de, PluginMessage::Error(DeployError::Timeout)));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(PluginMessage::Undeployed.to_string(), "Undeployed");
        let msg = PluginMessage::Error(DeployError::Timeout);
        assert_eq!(msg.to_string(), "Error(timeout)");
    }
}
