//! dt-core: Configuration and bootstrap sequencing for dvr-tunnel
//!
//! This crate provides the configuration structures shared by the viewer and
//! the CLI, plus the bootstrap sequence that prepares a host and exposes the
//! viewer through a tunnel.

pub mod command;
pub mod config;
pub mod error;
pub mod fetch;
pub mod package;
pub mod sequencer;
pub mod status;

pub use command::{CommandRunner, CommandSpec, ExitOutcome, Privilege, SystemRunner};
pub use error::{BootstrapError, ConfigError, DtError};
pub use fetch::{ArtifactFetcher, HttpFetcher};
pub use package::PackageManagerKind;
pub use sequencer::{RunOptions, SequenceReport, Sequencer, Step, StepOutcome, StepPolicy};
