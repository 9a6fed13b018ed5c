//! Host status probing
//!
//! Read-only checks of what the bootstrap sequence would change: which
//! packages are already installed, whether the tunnel binary is available,
//! and whether the artifact has already been downloaded.

use std::path::PathBuf;

use crate::command::CommandRunner;
use crate::config::BootstrapConfig;

/// Installation state of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageStatus {
    pub name: String,
    pub installed: bool,
}

/// Snapshot of the host
#[derive(Debug, Clone)]
pub struct HostStatus {
    pub packages: Vec<PackageStatus>,
    /// First line of `<tunnel> --version`, when the binary runs
    pub tunnel_version: Option<String>,
    /// Artifact path, when it could be resolved
    pub artifact_path: Option<PathBuf>,
    pub artifact_present: bool,
}

impl HostStatus {
    /// Whether every package is installed and the tunnel binary runs
    pub fn is_ready(&self) -> bool {
        self.tunnel_version.is_some() && self.packages.iter().all(|p| p.installed)
    }

    pub fn missing_packages(&self) -> impl Iterator<Item = &str> {
        self.packages
            .iter()
            .filter(|p| !p.installed)
            .map(|p| p.name.as_str())
    }
}

/// Probe the host without modifying it
pub async fn probe(config: &BootstrapConfig, runner: &dyn CommandRunner, arch: &str) -> HostStatus {
    let kind = config.package_manager;

    let mut packages = Vec::with_capacity(config.packages.len());
    for name in &config.packages {
        let installed = match runner.probe(&kind.query_installed_command(name)).await {
            Ok(output) => kind.is_installed(&output),
            Err(e) => {
                tracing::debug!("Could not query {}: {}", name, e);
                false
            }
        };
        packages.push(PackageStatus {
            name: name.clone(),
            installed,
        });
    }

    let tunnel_version = match runner.probe(&config.tunnel.version_command()).await {
        Ok(output) if output.outcome.success() => Some(
            output
                .stdout
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
        ),
        _ => None,
    };

    let artifact_path = config.resolve_artifact(arch).ok().map(|a| a.path);
    let artifact_present = artifact_path.as_ref().is_some_and(|p| p.exists());

    HostStatus {
        packages,
        tunnel_version,
        artifact_path,
        artifact_present,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandSpec, ExitOutcome, ProbeOutput};
    use crate::error::BootstrapError;
    use async_trait::async_trait;

    /// Reports `ffmpeg` and the tunnel as installed, everything else missing
    struct FakeHost;

    #[async_trait]
    impl CommandRunner for FakeHost {
        async fn run(&self, _command: &CommandSpec) -> Result<ExitOutcome, BootstrapError> {
            unreachable!("status must not run commands")
        }

        async fn probe(&self, command: &CommandSpec) -> Result<ProbeOutput, BootstrapError> {
            let rendered = command.to_string();
            let (code, stdout) = if rendered.ends_with(" ffmpeg") {
                (0, "install ok installed")
            } else if rendered == "cloudflared --version" {
                (0, "cloudflared version 2024.1.0 (built 2024-01-01)\n")
            } else {
                (1, "")
            };
            Ok(ProbeOutput {
                outcome: ExitOutcome::from_code(code),
                stdout: stdout.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_probe_reports_missing_packages() {
        let mut config = BootstrapConfig::default();
        config.packages = vec!["ffmpeg".to_string(), "python3-opencv".to_string()];

        let status = probe(&config, &FakeHost, "x86_64").await;

        assert_eq!(
            status.missing_packages().collect::<Vec<_>>(),
            vec!["python3-opencv"]
        );
        assert_eq!(
            status.tunnel_version.as_deref(),
            Some("cloudflared version 2024.1.0 (built 2024-01-01)")
        );
        assert!(!status.is_ready());
    }
}
