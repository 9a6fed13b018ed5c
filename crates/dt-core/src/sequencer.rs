//! Bootstrap sequencer
//!
//! Runs the fixed setup procedure in order:
//!
//! 1. refresh the package index
//! 2. install the package list
//! 3. download the tunnel artifact
//! 4. install the artifact, with a single best-effort repair on failure
//! 5. run the tunnel in the foreground until it exits
//!
//! Steps 1-3 abort the sequence on failure. Step 4 never does: the repair
//! outcome is logged and the sequence moves on. The tunnel's own exit status
//! is reported but is not an error.

use std::fmt;

use crate::command::{CommandRunner, CommandSpec, ExitOutcome};
use crate::config::{BootstrapConfig, ResolvedArtifact};
use crate::error::BootstrapError;
use crate::fetch::{verify_sha256, ArtifactFetcher};

/// One step of the bootstrap sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    RefreshIndex,
    InstallPackages,
    DownloadArtifact,
    InstallArtifact,
    LaunchTunnel,
}

impl Step {
    /// All steps in execution order
    pub const ALL: [Step; 5] = [
        Step::RefreshIndex,
        Step::InstallPackages,
        Step::DownloadArtifact,
        Step::InstallArtifact,
        Step::LaunchTunnel,
    ];

    /// Failure policy of this step
    pub fn policy(&self) -> StepPolicy {
        match self {
            Step::RefreshIndex | Step::InstallPackages | Step::DownloadArtifact => {
                StepPolicy::Fatal
            }
            Step::InstallArtifact => StepPolicy::BestEffort,
            Step::LaunchTunnel => StepPolicy::Blocking,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::RefreshIndex => "refresh package index",
            Step::InstallPackages => "install packages",
            Step::DownloadArtifact => "download tunnel package",
            Step::InstallArtifact => "install tunnel package",
            Step::LaunchTunnel => "launch tunnel",
        };
        f.write_str(name)
    }
}

/// What happens when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Failure aborts the sequence
    Fatal,
    /// Failure triggers one repair attempt, then the sequence continues
    BestEffort,
    /// Runs until the process exits; the exit is not an error
    Blocking,
}

impl fmt::Display for StepPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPolicy::Fatal => "fatal",
            StepPolicy::BestEffort => "best effort",
            StepPolicy::Blocking => "blocking",
        };
        f.write_str(name)
    }
}

/// Which steps to run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Do not refresh the package index
    pub skip_refresh: bool,
    /// Stop after the artifact is installed
    pub skip_launch: bool,
}

impl RunOptions {
    fn skips(&self, step: Step) -> bool {
        match step {
            Step::RefreshIndex => self.skip_refresh,
            Step::LaunchTunnel => self.skip_launch,
            _ => false,
        }
    }
}

/// A step as it would be executed
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub step: Step,
    pub policy: StepPolicy,
    /// Human-readable actions, in order
    pub actions: Vec<String>,
    pub skipped: bool,
}

/// Result of one executed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Command exited successfully
    Succeeded,
    /// Artifact saved, with its size in bytes
    Downloaded { bytes: u64 },
    /// Artifact install failed and the repair path was attempted once.
    /// `repair` is `None` when the repair command could not be started.
    Recovered {
        install: Option<ExitOutcome>,
        repair: Option<ExitOutcome>,
    },
    /// Tunnel process ended
    TunnelExited(ExitOutcome),
    /// Not run because of the run options
    Skipped,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct SequenceReport {
    pub steps: Vec<(Step, StepOutcome)>,
}

impl SequenceReport {
    /// Outcome of a given step, if it was reached
    pub fn outcome(&self, step: Step) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }
}

/// Executes the bootstrap sequence against a runner and a fetcher
pub struct Sequencer<'a> {
    config: &'a BootstrapConfig,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn ArtifactFetcher,
    arch: String,
    elevate: bool,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        config: &'a BootstrapConfig,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn ArtifactFetcher,
    ) -> Self {
        Self {
            config,
            runner,
            fetcher,
            arch: std::env::consts::ARCH.to_string(),
            elevate: config.privilege.elevate(),
        }
    }

    /// Override the CPU architecture used to pick the artifact
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    /// Override whether package-manager commands are prefixed with `sudo`
    pub fn with_elevation(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }

    /// Artifact URL and local path for this host
    pub fn artifact(&self) -> Result<ResolvedArtifact, BootstrapError> {
        self.config.resolve_artifact(&self.arch)
    }

    fn refresh_command(&self) -> CommandSpec {
        self.config
            .package_manager
            .refresh_command()
            .elevated(self.elevate)
    }

    fn install_command(&self) -> CommandSpec {
        self.config
            .package_manager
            .install_command(&self.config.packages)
            .elevated(self.elevate)
    }

    fn artifact_install_command(&self, artifact: &ResolvedArtifact) -> CommandSpec {
        self.config
            .package_manager
            .artifact_install_command(&artifact.path)
            .elevated(self.elevate)
    }

    fn repair_command(&self, artifact: &ResolvedArtifact) -> CommandSpec {
        self.config
            .package_manager
            .repair_command(&artifact.path)
            .elevated(self.elevate)
    }

    /// Describe every step without running anything
    pub fn plan(&self, options: &RunOptions) -> Result<Vec<PlannedStep>, BootstrapError> {
        let artifact = self.artifact()?;

        let plan = Step::ALL
            .iter()
            .map(|&step| {
                let actions = match step {
                    Step::RefreshIndex => vec![self.refresh_command().to_string()],
                    Step::InstallPackages => vec![self.install_command().to_string()],
                    Step::DownloadArtifact => {
                        let mut actions =
                            vec![format!("GET {} -> {}", artifact.url, artifact.path.display())];
                        if let Some(sha256) = &self.config.artifact.sha256 {
                            actions.push(format!("verify sha256 {}", sha256));
                        }
                        actions
                    }
                    Step::InstallArtifact => vec![
                        self.artifact_install_command(&artifact).to_string(),
                        format!("on failure: {}", self.repair_command(&artifact)),
                    ],
                    Step::LaunchTunnel => {
                        vec![self.config.tunnel.launch_command().to_string()]
                    }
                };

                PlannedStep {
                    step,
                    policy: step.policy(),
                    actions,
                    skipped: options.skips(step),
                }
            })
            .collect();

        Ok(plan)
    }

    /// Run the whole sequence
    pub async fn run(&self, options: &RunOptions) -> Result<SequenceReport, BootstrapError> {
        let artifact = self.artifact()?;
        let mut report = SequenceReport::default();
        let total = Step::ALL.len();

        for (index, &step) in Step::ALL.iter().enumerate() {
            if options.skips(step) {
                tracing::info!("[{}/{}] Skipping: {}", index + 1, total, step);
                report.steps.push((step, StepOutcome::Skipped));
                continue;
            }

            tracing::info!("[{}/{}] {}", index + 1, total, step);

            let outcome = match step {
                Step::RefreshIndex => {
                    self.run_fatal(step, &self.refresh_command()).await?
                }
                Step::InstallPackages => {
                    self.run_fatal(step, &self.install_command()).await?
                }
                Step::DownloadArtifact => self.download(&artifact).await?,
                Step::InstallArtifact => self.install_artifact(&artifact).await,
                Step::LaunchTunnel => StepOutcome::TunnelExited(self.launch().await?),
            };

            report.steps.push((step, outcome));
        }

        Ok(report)
    }

    /// Run the tunnel in the foreground until it exits
    ///
    /// Only a failure to start the binary is an error.
    pub async fn launch(&self) -> Result<ExitOutcome, BootstrapError> {
        let command = self.config.tunnel.launch_command();
        tracing::info!("Exposing {} via `{}`", self.config.tunnel.local_url, command);

        let outcome = self.runner.run(&command).await?;
        tracing::info!("Tunnel exited with {}", outcome);
        Ok(outcome)
    }

    async fn run_fatal(
        &self,
        step: Step,
        command: &CommandSpec,
    ) -> Result<StepOutcome, BootstrapError> {
        let outcome = self.runner.run(command).await?;
        if outcome.success() {
            Ok(StepOutcome::Succeeded)
        } else {
            Err(BootstrapError::StepFailed {
                step,
                command: command.to_string(),
                outcome,
            })
        }
    }

    async fn download(&self, artifact: &ResolvedArtifact) -> Result<StepOutcome, BootstrapError> {
        if artifact.path.exists() {
            tracing::debug!("Overwriting existing {:?}", artifact.path);
        }

        let bytes = self.fetcher.fetch(&artifact.url, &artifact.path).await?;
        tracing::info!("Saved {} bytes to {:?}", bytes, artifact.path);

        if let Some(expected) = &self.config.artifact.sha256 {
            verify_sha256(&artifact.path, expected).await?;
            tracing::info!("Checksum verified");
        }

        Ok(StepOutcome::Downloaded { bytes })
    }

    async fn install_artifact(&self, artifact: &ResolvedArtifact) -> StepOutcome {
        let install = match self.runner.run(&self.artifact_install_command(artifact)).await {
            Ok(outcome) if outcome.success() => return StepOutcome::Succeeded,
            Ok(outcome) => {
                tracing::warn!("Package install exited with {}, trying repair", outcome);
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!("Package install failed: {}, trying repair", e);
                None
            }
        };

        let repair = match self.runner.run(&self.repair_command(artifact)).await {
            Ok(outcome) => {
                if !outcome.success() {
                    tracing::warn!("Repair exited with {}, continuing anyway", outcome);
                }
                Some(outcome)
            }
            Err(e) => {
                tracing::warn!("Repair failed: {}, continuing anyway", e);
                None
            }
        };

        StepOutcome::Recovered { install, repair }
    }
}
