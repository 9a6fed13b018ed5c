//! Core error types for dvr-tunnel

use std::path::PathBuf;
use thiserror::Error;

use crate::command::ExitOutcome;
use crate::sequencer::Step;

/// Top-level error type for the dvr-tunnel crates
#[derive(Error, Debug)]
pub enum DtError {
    /// Bootstrap error
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while running the bootstrap sequence
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The external program could not be started at all
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A fatal step exited unsuccessfully
    #[error("Step '{step}' failed: `{command}` exited with {outcome}")]
    StepFailed {
        step: Step,
        command: String,
        outcome: ExitOutcome,
    },

    /// Artifact download failed
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// Downloaded artifact does not match the configured digest
    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// No artifact is published for this host
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
