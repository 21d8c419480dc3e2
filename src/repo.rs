//! Idempotent Helm chart-repository registration.
//!
//! Mirrors what `helm repo add` maintains on disk: a `repositories.yaml`
//! registration file plus a cached copy of each repository's index.  The
//! canonical entry is only ever added; when it is already present the
//! registry performs **no network access at all**.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DeployError;

/// A single repository registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoEntry {
    /// Short name charts are addressed by, e.g. `groundhog2k`.
    pub name: String,
    /// Base URL serving `index.yaml` and the chart archives.
    pub url: String,
    /// Fields helm itself maintains (credentials, CA paths); preserved
    /// verbatim so we never clobber another tool's registration.
    #[serde(flatten)]
    pub rest: serde_yaml::Mapping,
}

impl RepoEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            rest: serde_yaml::Mapping::new(),
        }
    }
}

/// On-disk shape of helm's `repositories.yaml`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RepoFile {
    #[serde(default, rename = "apiVersion")]
    api_version: String,
    #[serde(default)]
    generated: String,
    #[serde(default)]
    repositories: Vec<RepoEntry>,
    #[serde(flatten)]
    rest: serde_yaml::Mapping,
}

impl RepoFile {
    fn has(&self, name: &str) -> bool {
        self.repositories.iter().any(|r| r.name == name)
    }
}

/// Downloads a repository's `index.yaml`.
///
/// Injected into [`RepoRegistry`] so tests can assert that an
/// already-registered repository triggers no download.
#[async_trait]
pub trait IndexFetcher: Send + Sync {
    /// Fetch the index document for the repository rooted at `url`.
    async fn fetch_index(&self, url: &str) -> Result<String, DeployError>;
}

/// [`IndexFetcher`] over HTTP.
pub struct HttpIndexFetcher {
    client: reqwest::Client,
}

impl HttpIndexFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpIndexFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexFetcher for HttpIndexFetcher {
    async fn fetch_index(&self, url: &str) -> Result<String, DeployError> {
        let index_url = format!("{}/index.yaml", url.trim_end_matches('/'));
        let unreachable = |e: &dyn std::fmt::Display| {
            DeployError::Connectivity(format!(
                "{url} is not a valid chart repository or cannot be reached: {e}"
            ))
        };
        let response = self
            .client
            .get(&index_url)
            .send()
            .await
            .map_err(|e| unreachable(&e))?
            .error_for_status()
            .map_err(|e| unreachable(&e))?;
        response.text().await.map_err(|e| unreachable(&e))
    }
}

/// Helm repository registration state on the local filesystem.
pub struct RepoRegistry {
    config_path: PathBuf,
    cache_dir: PathBuf,
    fetcher: Box<dyn IndexFetcher>,
}

impl RepoRegistry {
    /// Registry at explicit paths.
    pub fn new(
        config_path: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        fetcher: Box<dyn IndexFetcher>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            cache_dir: cache_dir.into(),
            fetcher,
        }
    }

    /// Registry at helm's standard locations, honouring the
    /// `HELM_REPOSITORY_CONFIG` / `HELM_REPOSITORY_CACHE` overrides first.
    pub fn from_env(fetcher: Box<dyn IndexFetcher>) -> Result<Self, DeployError> {
        let config_path = match std::env::var_os("HELM_REPOSITORY_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => dirs::config_dir()
                .ok_or_else(|| {
                    DeployError::Configuration("no user configuration directory".to_owned())
                })?
                .join("helm")
                .join("repositories.yaml"),
        };
        let cache_dir = match std::env::var_os("HELM_REPOSITORY_CACHE") {
            Some(path) => PathBuf::from(path),
            None => dirs::cache_dir()
                .ok_or_else(|| DeployError::Configuration("no user cache directory".to_owned()))?
                .join("helm")
                .join("repository"),
        };
        Ok(Self::new(config_path, cache_dir, fetcher))
    }

    /// Ensure `entry` is registered.
    ///
    /// When the registration file already carries the entry this is a pure
    /// read and returns `false`.  Otherwise the repository index is
    /// downloaded, validated, cached, and the updated registration is
    /// persisted; returns `true`.
    pub async fn ensure_registered(&self, entry: &RepoEntry) -> Result<bool, DeployError> {
        let mut file = self.read_file().await?;
        if file.has(&entry.name) {
            debug!(repo = entry.name, "chart repository already registered");
            return Ok(false);
        }

        let index = self.fetcher.fetch_index(&entry.url).await?;
        // Reject bodies that are not an index document before persisting
        // anything, the way helm validates a downloaded index.
        serde_yaml::from_str::<serde_yaml::Value>(&index).map_err(|e| {
            DeployError::Connectivity(format!(
                "{} is not a valid chart repository: {e}",
                entry.url
            ))
        })?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| repo_io_error(&self.cache_dir, e))?;
        let index_path = self.cache_dir.join(format!("{}-index.yaml", entry.name));
        tokio::fs::write(&index_path, index)
            .await
            .map_err(|e| repo_io_error(&index_path, e))?;

        file.repositories.push(entry.clone());
        self.write_file(&file).await?;

        info!(repo = entry.name, url = entry.url, "chart repository registered");
        Ok(true)
    }

    async fn read_file(&self) -> Result<RepoFile, DeployError> {
        let raw = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(raw) => raw,
            // A missing file simply means nothing is registered yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RepoFile::default()),
            Err(e) => return Err(repo_io_error(&self.config_path, e)),
        };
        serde_yaml::from_str(&raw).map_err(|e| {
            DeployError::Configuration(format!(
                "unreadable repository file {}: {e}",
                self.config_path.display()
            ))
        })
    }

    async fn write_file(&self, file: &RepoFile) -> Result<(), DeployError> {
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| repo_io_error(parent, e))?;
        }
        let raw = serde_yaml::to_string(file)
            .map_err(|e| DeployError::Configuration(format!("serialize repository file: {e}")))?;
        tokio::fs::write(&self.config_path, raw)
            .await
            .map_err(|e| repo_io_error(&self.config_path, e))
    }
}

fn repo_io_error(path: &Path, e: std::io::Error) -> DeployError {
    DeployError::Configuration(format!("repository state {}: {e}", path.display()))
}
