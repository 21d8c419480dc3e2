//! Loopback TCP transport for plugin messages.
//!
//! This module provides [`PluginListener`](server::PluginListener) and
//! [`PluginClient`](client::PluginClient) that communicate
//! [`PluginMessage`](crate::message::PluginMessage) values as JSON over
//! short-lived TCP connections: each connection carries exactly one
//! request followed by one response.

pub mod client;
pub mod server;
