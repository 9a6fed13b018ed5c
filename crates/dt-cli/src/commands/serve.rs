//! Serve command implementation

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use dt_core::config::ViewerConfig;

use crate::output::{print_info, print_success};

/// Run the DVR viewer until `cancel` fires
pub async fn serve_command(
    mut config: ViewerConfig,
    bind_override: Option<String>,
    cancel: CancellationToken,
) -> Result<()> {
    if let Some(bind) = bind_override {
        config.bind_address = bind;
    }

    print_info(&format!(
        "Starting DVR viewer on {} (DVR {}, channels {:?})",
        config.bind_address, config.dvr.ip, config.dvr.channels
    ));

    dt_viewer::serve(config, cancel)
        .await
        .context("DVR viewer failed")?;

    print_success("DVR viewer stopped");
    Ok(())
}
