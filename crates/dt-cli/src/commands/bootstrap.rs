//! Bootstrap and plan command implementations

use anyhow::{Context, Result};

use dt_core::config::BootstrapConfig;
use dt_core::{HttpFetcher, RunOptions, Sequencer, StepOutcome, SystemRunner};

use crate::output::{format_plan, format_report, print_error, print_info, print_success, print_warning};

/// Flags of the bootstrap command
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapOptions {
    pub dry_run: bool,
    pub skip_refresh: bool,
    pub skip_launch: bool,
    pub launch_only: bool,
}

impl BootstrapOptions {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            skip_refresh: self.skip_refresh,
            skip_launch: self.skip_launch,
        }
    }
}

/// Print the commands a bootstrap would run
pub fn plan_command(config: &BootstrapConfig) -> Result<()> {
    show_plan(config, &RunOptions::default())
}

fn show_plan(config: &BootstrapConfig, options: &RunOptions) -> Result<()> {
    let runner = SystemRunner;
    let fetcher = HttpFetcher::new(config.artifact.connect_timeout)?;
    let sequencer = Sequencer::new(config, &runner, &fetcher);

    let plan = sequencer
        .plan(options)
        .context("Failed to resolve the tunnel package")?;
    println!("{}", format_plan(&plan));
    Ok(())
}

/// Execute the bootstrap command
pub async fn bootstrap_command(config: &BootstrapConfig, options: BootstrapOptions) -> Result<()> {
    if options.launch_only {
        return launch_only(config, options.dry_run).await;
    }

    if options.dry_run {
        print_info("Dry run: nothing will be executed");
        return show_plan(config, &options.run_options());
    }

    let runner = SystemRunner;
    let fetcher = HttpFetcher::new(config.artifact.connect_timeout)?;
    let sequencer = Sequencer::new(config, &runner, &fetcher);

    let report = match sequencer.run(&options.run_options()).await {
        Ok(report) => report,
        Err(e) => {
            print_error(&format!("Bootstrap failed: {}", e));
            return Err(e.into());
        }
    };

    for (step, outcome) in &report.steps {
        if let StepOutcome::Recovered { .. } = outcome {
            print_warning(&format!(
                "{} failed; the repair install was attempted once and the run continued",
                step
            ));
        }
    }

    println!("{}", format_report(&report));
    if options.skip_launch {
        print_success("Host is set up; start the tunnel with: dvr-tunnel bootstrap --launch-only");
    } else {
        print_info("Tunnel stopped");
    }

    Ok(())
}

async fn launch_only(config: &BootstrapConfig, dry_run: bool) -> Result<()> {
    let command = config.tunnel.launch_command();
    if dry_run {
        println!("{}", command);
        return Ok(());
    }

    let runner = SystemRunner;
    let fetcher = HttpFetcher::new(config.artifact.connect_timeout)?;
    let sequencer = Sequencer::new(config, &runner, &fetcher);

    print_info(&format!("Exposing {}", config.tunnel.local_url));
    match sequencer.launch().await {
        Ok(outcome) => {
            print_info(&format!("Tunnel exited with {}", outcome));
            Ok(())
        }
        Err(e) => {
            print_error(&format!("Failed to launch tunnel: {}", e));
            print_info("Is the tunnel installed? Try: dvr-tunnel bootstrap");
            Err(e.into())
        }
    }
}
