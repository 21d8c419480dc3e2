//! [`ChartClient`] implementation that drives the `helm` binary.
//!
//! Helm's release bookkeeping lives server-side in the cluster, so the CLI
//! is the package-manager client here: `helm list -A -o json` for release
//! discovery, `helm install` with values piped over stdin, `helm
//! uninstall` for teardown.  Every non-zero exit is surfaced as a normal
//! propagated error, never a process abort.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::backend::{ChartClient, ReleaseInfo};
use crate::error::DeployError;

/// Chart client shelling out to a `helm` executable.
pub struct HelmCli {
    bin: String,
}

impl HelmCli {
    /// Use the `helm` found on `PATH`.
    pub fn new() -> Self {
        Self::with_binary("helm")
    }

    /// Use an explicit helm executable, e.g. for tests.
    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Run helm with `args`, feeding `stdin` if given, and return stdout.
    async fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<String, DeployError> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            DeployError::Configuration(format!("failed to launch {}: {e}", self.bin))
        })?;

        if let Some(input) = stdin {
            let mut pipe = child.stdin.take().ok_or_else(|| {
                DeployError::Configuration("helm stdin not captured".to_owned())
            })?;
            pipe.write_all(input.as_bytes())
                .await
                .map_err(DeployError::connectivity)?;
            // Drop closes the pipe so helm sees EOF.
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(DeployError::connectivity)?;

        let op = format!("helm {}", args.first().copied().unwrap_or_default());
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeployError::backend(&op, stderr.trim()));
        }

        debug!(op, "helm command succeeded");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartClient for HelmCli {
    async fn list_releases(&self) -> Result<Vec<ReleaseInfo>, DeployError> {
        let stdout = self
            .run(&["list", "--all-namespaces", "--output", "json"], None)
            .await?;
        serde_json::from_str(&stdout)
            .map_err(|e| DeployError::backend("helm list", format!("unparseable output: {e}")))
    }

    #[instrument(skip(self, values_yaml))]
    async fn install(
        &self,
        release: &str,
        chart: &str,
        namespace: &str,
        values_yaml: &str,
    ) -> Result<(), DeployError> {
        self.run(
            &[
                "install", release, chart, "--namespace", namespace, "--values", "-",
            ],
            Some(values_yaml),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn uninstall(&self, release: &str) -> Result<(), DeployError> {
        match self.run(&["uninstall", release], None).await {
            Ok(_) => Ok(()),
            Err(DeployError::BackendOperation { reason, .. })
                if reason.contains("not found") =>
            {
                Err(DeployError::NotFound(format!("release {release} not found")))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The fake helm used below is a shell script, so these tests only run
    // where /bin/sh exists (which is everywhere we test).
    fn fake_helm(dir: &std::path::Path, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("helm");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn list_parses_json_output() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = fake_helm(
            tmp.path(),
            r#"echo '[{"name":"corral-redis","namespace":"default"}]'"#,
        );
        let helm = HelmCli::with_binary(bin);
        let releases = helm.list_releases().await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].name, "corral-redis");
        assert_eq!(releases[0].namespace, "default");
    }

    #[tokio::test]
    async fn nonzero_exit_is_backend_error() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = fake_helm(tmp.path(), "echo 'chart load failed' >&2; exit 1");
        let helm = HelmCli::with_binary(bin);
        let err = helm
            .install("corral-redis", "groundhog2k/redis", "default", "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::BackendOperation { .. }));
        assert!(err.to_string().contains("chart load failed"));
    }

    #[tokio::test]
    async fn uninstall_missing_release_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let bin = fake_helm(
            tmp.path(),
            "echo 'Error: uninstall: Release not loaded: corral-redis: release: not found' >&2; exit 1",
        );
        let helm = HelmCli::with_binary(bin);
        let err = helm.uninstall("corral-redis").await.unwrap_err();
        assert!(matches!(err, DeployError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_binary_is_configuration_error() {
        let helm = HelmCli::with_binary("/nonexistent/helm-for-test");
        let err = helm.list_releases().await.unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }

    #[tokio::test]
    async fn install_pipes_values_over_stdin() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("values.yaml");
        let bin = fake_helm(tmp.path(), &format!("cat > {}", marker.display()));
        let helm = HelmCli::with_binary(bin);
        helm.install("corral-redis", "groundhog2k/redis", "default", "storage:\n  className: zfs\n")
            .await
            .unwrap();
        let written = std::fs::read_to_string(marker).unwrap();
        assert!(written.contains("className: zfs"));
    }
}
