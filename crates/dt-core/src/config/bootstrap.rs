//! Bootstrap configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::command::{CommandSpec, Privilege};
use crate::error::BootstrapError;
use crate::package::PackageManagerKind;

/// Packages needed by the viewer: OpenCV, FFmpeg codecs and GStreamer
fn default_packages() -> Vec<String> {
    [
        "python3-opencv",
        "ffmpeg",
        "libavcodec-extra",
        "gstreamer1.0-tools",
        "gstreamer1.0-plugins-good",
        "gstreamer1.0-libav",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Configuration for the bootstrap sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Package manager used for the refresh, install and repair steps
    pub package_manager: PackageManagerKind,

    /// Whether package-manager commands run through `sudo`
    pub privilege: Privilege,

    /// Packages installed in one `install` invocation
    pub packages: Vec<String>,

    /// Tunnel release artifact
    pub artifact: ArtifactConfig,

    /// Tunnel invocation
    pub tunnel: TunnelConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            package_manager: PackageManagerKind::default(),
            privilege: Privilege::default(),
            packages: default_packages(),
            artifact: ArtifactConfig::default(),
            tunnel: TunnelConfig::default(),
        }
    }
}

/// Where the tunnel package comes from and where it is saved
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Download URL (derived from the package manager and CPU when unset)
    pub url: Option<String>,

    /// Local file (the URL's file name in the working directory when unset)
    pub path: Option<PathBuf>,

    /// Expected SHA-256 of the file, hex encoded
    pub sha256: Option<String>,

    /// Connect timeout for the download
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            sha256: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Tunnel binary and the local service it exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Installed tunnel binary
    pub binary: String,

    /// Local URL handed to `tunnel --url`
    pub local_url: String,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            binary: "cloudflared".to_string(),
            local_url: "http://localhost:8000".to_string(),
        }
    }
}

impl TunnelConfig {
    /// The tunnel invocation: `<binary> tunnel --url <local_url>`
    pub fn launch_command(&self) -> CommandSpec {
        CommandSpec::new(&self.binary)
            .args(["tunnel", "--url"])
            .arg(&self.local_url)
    }

    /// Command that succeeds when the binary is on `PATH`
    pub fn version_command(&self) -> CommandSpec {
        CommandSpec::new(&self.binary).arg("--version")
    }
}

/// Artifact URL and destination after defaults are applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub url: String,
    pub path: PathBuf,
}

impl BootstrapConfig {
    /// Resolve the artifact URL and local path for a CPU architecture
    pub fn resolve_artifact(&self, arch: &str) -> Result<ResolvedArtifact, BootstrapError> {
        let url = match &self.artifact.url {
            Some(url) => url.clone(),
            None => self.package_manager.artifact_url(arch)?,
        };

        let path = match &self.artifact.path {
            Some(path) => path.clone(),
            None => PathBuf::from(file_name_from_url(&url).ok_or_else(|| {
                BootstrapError::Download {
                    url: url.clone(),
                    reason: "URL has no file name; set artifact.path".to_string(),
                }
            })?),
        };

        Ok(ResolvedArtifact { url, path })
    }
}

/// Last path segment of a URL, without query or fragment
fn file_name_from_url(url: &str) -> Option<&str> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let (_, path) = after_scheme.split_once('/')?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_command_literal() {
        let tunnel = TunnelConfig::default();
        let cmd = tunnel.launch_command();
        assert_eq!(cmd.program, "cloudflared");
        assert_eq!(cmd.args, vec!["tunnel", "--url", "http://localhost:8000"]);
    }

    #[test]
    fn test_resolve_default_artifact() {
        let config = BootstrapConfig::default();
        let artifact = config.resolve_artifact("x86_64").unwrap();
        assert!(artifact.url.ends_with("/cloudflared-linux-amd64.deb"));
        assert_eq!(artifact.path, PathBuf::from("cloudflared-linux-amd64.deb"));
    }

    #[test]
    fn test_resolve_explicit_artifact() {
        let mut config = BootstrapConfig::default();
        config.artifact.url = Some("https://example.com/pkg/tunnel.deb?sig=abc".to_string());
        let artifact = config.resolve_artifact("riscv64").unwrap();
        assert_eq!(artifact.path, PathBuf::from("tunnel.deb"));

        config.artifact.path = Some(PathBuf::from("/tmp/t.deb"));
        let artifact = config.resolve_artifact("riscv64").unwrap();
        assert_eq!(artifact.path, PathBuf::from("/tmp/t.deb"));
    }

    #[test]
    fn test_url_without_file_name() {
        let mut config = BootstrapConfig::default();
        config.artifact.url = Some("https://example.com/".to_string());
        assert!(config.resolve_artifact("x86_64").is_err());
        assert_eq!(file_name_from_url("https://example.com"), None);
    }
}
