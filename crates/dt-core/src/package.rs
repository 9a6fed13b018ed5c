//! Package manager backends
//!
//! Maps each supported package manager to the concrete commands used by the
//! bootstrap sequence, and picks the tunnel release artifact matching the
//! package format and CPU architecture.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::{CommandSpec, ProbeOutput};
use crate::error::BootstrapError;

/// Base URL of the tunnel's "latest release" download area
pub const RELEASE_BASE_URL: &str =
    "https://github.com/cloudflare/cloudflared/releases/latest/download";

/// Supported system package managers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManagerKind {
    /// Debian/Ubuntu: apt-get + dpkg
    #[default]
    Apt,
    /// Fedora/RHEL: dnf + rpm
    Dnf,
}

impl PackageManagerKind {
    /// Refresh the package index
    pub fn refresh_command(&self) -> CommandSpec {
        match self {
            PackageManagerKind::Apt => CommandSpec::new("apt-get").arg("update"),
            PackageManagerKind::Dnf => CommandSpec::new("dnf").arg("makecache"),
        }
    }

    /// Install the given packages non-interactively
    pub fn install_command(&self, packages: &[String]) -> CommandSpec {
        let program = match self {
            PackageManagerKind::Apt => "apt-get",
            PackageManagerKind::Dnf => "dnf",
        };
        CommandSpec::new(program)
            .args(["install", "-y"])
            .args(packages.iter().cloned())
    }

    /// Install a downloaded package file
    pub fn artifact_install_command(&self, path: &Path) -> CommandSpec {
        let path = path.display().to_string();
        match self {
            PackageManagerKind::Apt => CommandSpec::new("dpkg").arg("-i").arg(path),
            PackageManagerKind::Dnf => CommandSpec::new("rpm")
                .args(["-U", "--replacepkgs"])
                .arg(path),
        }
    }

    /// Repair path run once when the artifact install fails
    pub fn repair_command(&self, path: &Path) -> CommandSpec {
        match self {
            PackageManagerKind::Apt => CommandSpec::new("apt-get").args(["install", "-f", "-y"]),
            PackageManagerKind::Dnf => CommandSpec::new("dnf")
                .args(["install", "-y"])
                .arg(path.display().to_string()),
        }
    }

    /// Query whether a package is installed
    pub fn query_installed_command(&self, package: &str) -> CommandSpec {
        match self {
            PackageManagerKind::Apt => CommandSpec::new("dpkg-query")
                .args(["-W", "-f=${Status}"])
                .arg(package),
            PackageManagerKind::Dnf => CommandSpec::new("rpm").arg("-q").arg(package),
        }
    }

    /// Interpret the output of [`Self::query_installed_command`]
    pub fn is_installed(&self, probe: &ProbeOutput) -> bool {
        match self {
            // dpkg-query also knows about removed packages ("deinstall ok config-files")
            PackageManagerKind::Apt => {
                probe.outcome.success() && probe.stdout.contains("install ok installed")
            }
            PackageManagerKind::Dnf => probe.outcome.success(),
        }
    }

    /// File name of the tunnel release artifact for a CPU architecture
    ///
    /// `arch` uses the names of `std::env::consts::ARCH`.
    pub fn artifact_file_name(&self, arch: &str) -> Result<String, BootstrapError> {
        let suffix = match (self, arch) {
            (PackageManagerKind::Apt, "x86_64") => "amd64.deb",
            (PackageManagerKind::Apt, "aarch64") => "arm64.deb",
            (PackageManagerKind::Apt, "arm") => "armhf.deb",
            (PackageManagerKind::Dnf, "x86_64") => "x86_64.rpm",
            (PackageManagerKind::Dnf, "aarch64") => "aarch64.rpm",
            (PackageManagerKind::Dnf, "arm") => "arm.rpm",
            _ => {
                return Err(BootstrapError::UnsupportedPlatform(format!(
                    "no tunnel package published for {} on {}",
                    arch, self
                )))
            }
        };
        Ok(format!("cloudflared-linux-{}", suffix))
    }

    /// Release URL of the tunnel artifact for a CPU architecture
    pub fn artifact_url(&self, arch: &str) -> Result<String, BootstrapError> {
        Ok(format!(
            "{}/{}",
            RELEASE_BASE_URL,
            self.artifact_file_name(arch)?
        ))
    }
}

impl std::fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageManagerKind::Apt => write!(f, "apt"),
            PackageManagerKind::Dnf => write!(f, "dnf"),
        }
    }
}
