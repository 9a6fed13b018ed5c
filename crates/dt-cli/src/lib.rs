//! dt-cli: Command-line interface for dvr-tunnel
//!
//! Provides the `dvr-tunnel` binary: host bootstrap, the DVR viewer and
//! configuration management.

pub mod commands;
pub mod output;
