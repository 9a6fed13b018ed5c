//! External command execution
//!
//! Every side effect of the bootstrap sequence is an external program. The
//! sequencer only sees [`CommandSpec`]s and the [`CommandRunner`] trait, so the
//! ordering and failure policy can be exercised without touching the host.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::BootstrapError;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Prefix the command with `sudo` when `elevate` is set
    pub fn elevated(self, elevate: bool) -> Self {
        if !elevate {
            return self;
        }

        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How an external process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub const SUCCESS: ExitOutcome = ExitOutcome { code: Some(0) };

    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "status {}", code),
            None => write!(f, "a signal"),
        }
    }
}

/// Output of a probing command
#[derive(Debug, Clone)]
pub struct ProbeOutput {
    pub outcome: ExitOutcome,
    pub stdout: String,
}

/// Whether package-manager commands are prefixed with `sudo`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// Use `sudo` unless already running as root
    #[default]
    Auto,
    /// Always use `sudo`
    Sudo,
    /// Never use `sudo`
    None,
}

impl Privilege {
    /// Whether commands need the `sudo` prefix on this host
    pub fn elevate(&self) -> bool {
        match self {
            Privilege::Auto => !running_as_root(),
            Privilege::Sudo => true,
            Privilege::None => false,
        }
    }
}

/// Check whether the effective user is root
#[cfg(unix)]
pub fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    true
}

/// Executes external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion with the console attached
    async fn run(&self, command: &CommandSpec) -> Result<ExitOutcome, BootstrapError>;

    /// Run a command quietly and capture its stdout
    async fn probe(&self, command: &CommandSpec) -> Result<ProbeOutput, BootstrapError>;
}

/// Runs commands on the local host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ExitOutcome, BootstrapError> {
        tracing::debug!("Spawning `{}`", command);

        let status = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| BootstrapError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        Ok(status.into())
    }

    async fn probe(&self, command: &CommandSpec) -> Result<ProbeOutput, BootstrapError> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| BootstrapError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        Ok(ProbeOutput {
            outcome: output.status.into(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = CommandSpec::new("dpkg-query")
            .args(["-W", "-f", "${Status} ok"])
            .arg("ffmpeg");
        assert_eq!(cmd.to_string(), "dpkg-query -W -f '${Status} ok' ffmpeg");
    }

    #[test]
    fn test_elevated_prefixes_sudo() {
        let cmd = CommandSpec::new("apt-get").arg("update").elevated(true);
        assert_eq!(cmd.program, "sudo");
        assert_eq!(cmd.args, vec!["apt-get", "update"]);

        let cmd = CommandSpec::new("apt-get").arg("update").elevated(false);
        assert_eq!(cmd.to_string(), "apt-get update");
    }

    #[test]
    fn test_exit_outcome_display() {
        assert_eq!(ExitOutcome::from_code(100).to_string(), "status 100");
        assert_eq!(ExitOutcome { code: None }.to_string(), "a signal");
        assert!(ExitOutcome::SUCCESS.success());
        assert!(!ExitOutcome::from_code(1).success());
    }

    #[test]
    fn test_privilege_explicit() {
        assert!(Privilege::Sudo.elevate());
        assert!(!Privilege::None.elevate());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_exit_code() {
        let runner = SystemRunner;
        let outcome = runner
            .run(&CommandSpec::new("sh").args(["-c", "exit 3"]))
            .await
            .unwrap();
        assert_eq!(outcome.code, Some(3));

        let probe = runner
            .probe(&CommandSpec::new("sh").args(["-c", "echo hello"]))
            .await
            .unwrap();
        assert!(probe.outcome.success());
        assert_eq!(probe.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_system_runner_missing_binary() {
        let err = SystemRunner
            .run(&CommandSpec::new("dt-definitely-not-a-real-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::Spawn { .. }));
    }
}
