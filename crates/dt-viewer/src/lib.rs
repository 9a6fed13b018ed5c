//! DVR viewer for dvr-tunnel
//!
//! Re-serves the RTSP channels of a DVR as MJPEG streams and mosaics to
//! browsers. This is the local service the tunnel exposes.

pub mod capture;
pub mod jpeg;
pub mod mjpeg;
pub mod mosaic;
pub mod net;
pub mod overlay;
pub mod pages;
pub mod routes;
pub mod rtsp;
pub mod state;

pub use routes::{create_router, ViewerState};
pub use state::StreamState;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use dt_core::config::ViewerConfig;
use dt_core::{ConfigError, DtError};

use crate::capture::CaptureOptions;

/// Run the viewer until `cancel` fires, then stop every capture worker
pub async fn serve(config: ViewerConfig, cancel: CancellationToken) -> Result<(), DtError> {
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        ConfigError::Invalid(format!(
            "Invalid bind address '{}': {}",
            config.bind_address, e
        ))
    })?;

    let streams = Arc::new(StreamState::new(
        config.dvr.clone(),
        CaptureOptions::from(&config),
    ));
    streams.start_streams(config.dvr.clone()).await;

    let state = ViewerState {
        streams: streams.clone(),
        fps: config.fps.max(1),
        jpeg_quality: config.jpeg_quality,
        shutdown: cancel.clone(),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let port = listener.local_addr()?.port();

    tracing::info!("Viewer listening on {}", addr);
    tracing::info!("On the LAN: http://{}:{}", net::lan_ip(&config.dvr.ip), port);
    tracing::info!("Local:      http://127.0.0.1:{}", port);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await;

    streams.stop_all().await;
    tracing::info!("Viewer stopped");

    result.map_err(DtError::from)
}
