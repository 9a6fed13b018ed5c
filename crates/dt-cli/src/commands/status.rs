//! Status command implementation

use anyhow::Result;

use dt_core::config::BootstrapConfig;
use dt_core::{status, SystemRunner};

use crate::output::{format_status, print_success, print_warning};

/// Execute the status command
pub async fn status_command(config: &BootstrapConfig) -> Result<()> {
    let host = status::probe(config, &SystemRunner, std::env::consts::ARCH).await;

    println!("{}", format_status(&host));

    if host.is_ready() {
        print_success("Host is ready to launch the tunnel");
    } else {
        let missing: Vec<&str> = host.missing_packages().collect();
        if !missing.is_empty() {
            print_warning(&format!("Missing packages: {}", missing.join(", ")));
        }
        print_warning("Host is not ready. Try: dvr-tunnel bootstrap");
    }

    Ok(())
}
