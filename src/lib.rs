//! # redis-deploy-plugin — Redis provisioning plugin
//!
//! `redis-deploy-plugin` is a short-lived subprocess that a host
//! orchestrator spawns when it needs a Redis instance.  It exposes exactly
//! two remote operations — Deploy and Undeploy — over a loopback TCP
//! transport, and fulfils them with one of two interchangeable backends: a
//! local Docker daemon, or a Kubernetes cluster driven through Helm.  A
//! successful Deploy answers with the address and credentials needed to
//! connect to the instance; Undeploy tears the same instance down again.
//!
//! The plugin manages at most one canonically-named deployment per backend
//! and follows the usual conventions of this codebase (Tokio async runtime,
//! `tracing` for observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data model: `DeploymentConfig`, `ClientConfig`, `ErrorPayload`. |
//! | [`error`] | [`DeployError`] enum covering all failure modes. |
//! | [`context`] | [`OpContext`] — per-call deadline checked before dispatch. |
//! | [`message`] | [`PluginMessage`] protocol envelope for the TCP transport. |
//! | [`strategy`] | [`DeploymentStrategy`] trait and its Local / Kubernetes variants. |
//! | [`backend`] | Backend-client traits plus Docker, Helm and kube implementations. |
//! | [`repo`] | Idempotent Helm chart-repository registration. |
//! | [`server`] | [`PluginServer`] — dispatches requests to the active strategy. |
//! | [`transport`] | TCP client/server moving [`PluginMessage`] values as JSON. |

pub mod backend;
pub mod context;
pub mod error;
pub mod message;
pub mod repo;
pub mod server;
pub mod strategy;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use context::OpContext;
pub use error::DeployError;
pub use message::PluginMessage;
pub use server::PluginServer;
pub use strategy::DeploymentStrategy;
pub use types::{ClientConfig, DeploymentConfig, ErrorPayload};
