//! dvr-tunnel CLI
//!
//! Single binary for the whole host:
//! - Bootstrap (install packages, fetch and install cloudflared, run the tunnel)
//! - DVR viewer (the local web service the tunnel exposes)
//! - Configuration management

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dt_core::config::{self, ConfigFile};
use dvr_tunnel::commands::{self, BootstrapOptions};

#[derive(Parser)]
#[command(name = "dvr-tunnel")]
#[command(author, version, about = "Bootstrap a DVR viewer host and expose it through a tunnel")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install packages and cloudflared, then run the tunnel in the foreground
    Bootstrap {
        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,
        /// Do not refresh the package index first
        #[arg(long)]
        skip_refresh: bool,
        /// Stop after installing; do not start the tunnel
        #[arg(long, conflicts_with = "launch_only")]
        skip_launch: bool,
        /// Only start the tunnel, assuming cloudflared is installed
        #[arg(long)]
        launch_only: bool,
    },

    /// Show the bootstrap commands for this host without running them
    Plan,

    /// Check which packages are installed and whether the tunnel binary runs
    Status,

    /// Run the DVR viewer web service
    Serve {
        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Show config file path
    Path,
    /// Write a config file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Bootstrap {
            dry_run,
            skip_refresh,
            skip_launch,
            launch_only,
        } => {
            let config = load(config_path)?;
            let options = BootstrapOptions {
                dry_run,
                skip_refresh,
                skip_launch,
                launch_only,
            };
            commands::bootstrap_command(&config.bootstrap, options).await?;
        }

        Commands::Plan => {
            let config = load(config_path)?;
            commands::plan_command(&config.bootstrap)?;
        }

        Commands::Status => {
            let config = load(config_path)?;
            commands::status_command(&config.bootstrap).await?;
        }

        Commands::Serve { bind } => {
            let config = load(config_path)?;
            let cancel = shutdown_token();
            commands::serve_command(config.viewer, bind, cancel).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                commands::config_show(config_path)?;
            }
            ConfigAction::Get { key } => {
                commands::config_get(config_path, &key)?;
            }
            ConfigAction::Set { key, value } => {
                commands::config_set(config_path, &key, &value)?;
            }
            ConfigAction::Path => {
                commands::config_path(config_path)?;
            }
            ConfigAction::Init { force } => {
                commands::config_init(config_path, force)?;
            }
        },
    }

    Ok(())
}

fn load(config_path: Option<&std::path::Path>) -> Result<ConfigFile> {
    config::load_or_default(config_path).with_context(|| {
        format!(
            "Failed to load configuration from {:?}",
            commands::resolve_config_path(config_path)
        )
    })
}

/// Token cancelled on Ctrl+C or SIGTERM
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel_clone.cancel();
    });

    cancel
}
