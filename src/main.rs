//! Plugin process bootstrap.
//!
//! Selects the deployment backend from the single optional positional
//! argument, binds an OS-assigned loopback port, prints exactly one
//! `<ip>:<port>` line to stdout as the readiness handshake, and serves
//! until killed by the host orchestrator.  All logging goes to stderr —
//! stdout belongs to the handshake.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use redis_deploy_plugin::backend::cluster::KubeCluster;
use redis_deploy_plugin::backend::docker::DockerRuntime;
use redis_deploy_plugin::backend::helm::HelmCli;
use redis_deploy_plugin::repo::{HttpIndexFetcher, RepoRegistry};
use redis_deploy_plugin::strategy::{KubernetesStrategy, LocalStrategy};
use redis_deploy_plugin::transport::server::PluginListener;
use redis_deploy_plugin::{DeploymentStrategy, PluginServer};

#[derive(Parser)]
#[command(about = "Redis deployment plugin", version)]
struct Cli {
    /// Deployment backend: "local" (default) or "kubernetes"/"k8s".
    mode: Option<String>,
}

fn build_strategy(mode: &str) -> anyhow::Result<Box<dyn DeploymentStrategy>> {
    match mode {
        "kubernetes" | "k8s" => {
            let repos = RepoRegistry::from_env(Box::new(HttpIndexFetcher::new()))
                .context("helm repository locations")?;
            Ok(Box::new(KubernetesStrategy::new(
                HelmCli::new(),
                KubeCluster::new(),
                repos,
            )))
        }
        other => {
            if other != "local" {
                warn!(mode = other, "unrecognized mode, falling back to local");
            }
            let runtime = DockerRuntime::connect().context("docker client")?;
            Ok(Box::new(LocalStrategy::new(runtime)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mode = cli.mode.as_deref().unwrap_or("local");
    info!(mode, "starting redis deployment plugin");

    let strategy = build_strategy(mode)?;
    let server = Arc::new(PluginServer::new(strategy));

    let listener = PluginListener::bind("127.0.0.1:0", Arc::clone(&server))
        .await
        .context("bind loopback listener")?;

    // The sole readiness signal: the host orchestrator parses this line.
    println!("{}", listener.local_addr()?);

    listener.serve().await?;
    Ok(())
}
