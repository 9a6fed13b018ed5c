//! Per-channel capture workers
//!
//! Each worker keeps one ffmpeg process reading the channel's RTSP source and
//! publishes the newest JPEG frame, labeled with the channel name, on a watch
//! channel. When the source drops, a placeholder frame is published and
//! ffmpeg is restarted after the reconnect delay.

use std::process::Stdio;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use dt_core::config::ViewerConfig;

use crate::jpeg::{self, JpegFrameCodec};
use crate::overlay;

/// Latest frame of a channel; `None` until anything was published
pub type FrameSender = watch::Sender<Option<Bytes>>;
pub type FrameReceiver = watch::Receiver<Option<Bytes>>;

/// Settings shared by all capture workers
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub ffmpeg_path: String,
    pub source_timeout: Duration,
    pub reconnect_delay: Duration,
    /// Quality of frames re-encoded after labeling
    pub jpeg_quality: u8,
}

impl From<&ViewerConfig> for CaptureOptions {
    fn from(config: &ViewerConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            source_timeout: config.source_timeout,
            reconnect_delay: config.reconnect_delay,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// One channel to capture
#[derive(Debug, Clone)]
pub struct CaptureSource {
    pub channel: u8,
    pub url: String,
    /// URL safe to log
    pub display_url: String,
    pub target_height: u32,
}

/// ffmpeg arguments: RTSP over TCP in, scaled MJPEG on stdout
pub fn ffmpeg_args(source: &CaptureSource, options: &CaptureOptions) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-rtsp_transport".to_string(),
        "tcp".to_string(),
        "-timeout".to_string(),
        options.source_timeout.as_micros().to_string(),
        "-i".to_string(),
        source.url.clone(),
        "-an".to_string(),
        "-vf".to_string(),
        format!("scale=-2:{}", source.target_height),
        "-f".to_string(),
        "mjpeg".to_string(),
        "-q:v".to_string(),
        "5".to_string(),
        "-".to_string(),
    ]
}

/// Start a worker for `source`, publishing into `frames` until `cancel` fires
pub fn spawn_capture(
    source: CaptureSource,
    options: CaptureOptions,
    frames: FrameSender,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let placeholder = match jpeg::placeholder(source.channel, source.target_height) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Channel {}: cannot render placeholder: {}", source.channel, e);
                None
            }
        };

        tracing::info!("Channel {}: opening {}", source.channel, source.display_url);

        loop {
            match read_source(&source, &options, &frames, &cancel).await {
                Ok(count) => tracing::debug!(
                    "Channel {}: source ended after {} frames",
                    source.channel,
                    count
                ),
                Err(e) => tracing::warn!("Channel {}: {}", source.channel, e),
            }

            if cancel.is_cancelled() {
                break;
            }

            if let Some(frame) = &placeholder {
                frames.send_replace(Some(frame.clone()));
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(options.reconnect_delay) => {
                    tracing::debug!("Channel {}: reconnecting", source.channel);
                }
            }
        }

        tracing::debug!("Channel {}: worker stopped", source.channel);
    })
}

/// Stamp "CH<n>" on a captured frame; frames that do not decode pass unchanged
async fn label_frame(channel: u8, frame: Bytes, quality: u8) -> Bytes {
    let raw = frame.clone();
    let labeled = tokio::task::spawn_blocking(move || {
        overlay::label_jpeg(&frame, &format!("CH{}", channel), quality)
    })
    .await;

    match labeled {
        Ok(Some(labeled)) => labeled,
        Ok(None) => raw,
        Err(e) => {
            tracing::warn!("Channel {}: labeling failed: {}", channel, e);
            raw
        }
    }
}

/// Run ffmpeg once, forwarding labeled frames until it exits or `cancel` fires
async fn read_source(
    source: &CaptureSource,
    options: &CaptureOptions,
    frames: &FrameSender,
    cancel: &CancellationToken,
) -> std::io::Result<u64> {
    let mut child = Command::new(&options.ffmpeg_path)
        .args(ffmpeg_args(source, options))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to start {}: {}", options.ffmpeg_path, e),
            )
        })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "ffmpeg stdout unavailable")
    })?;
    let mut reader = FramedRead::new(stdout, JpegFrameCodec::default());
    let mut count: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                child.kill().await.ok();
                return Ok(count);
            }
            frame = reader.next() => match frame {
                Some(Ok(frame)) => {
                    count += 1;
                    let frame = label_frame(source.channel, frame, options.jpeg_quality).await;
                    frames.send_replace(Some(frame));
                }
                Some(Err(e)) => {
                    child.kill().await.ok();
                    return Err(e);
                }
                None => {
                    let status = child.wait().await?;
                    if count == 0 && !status.success() {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::Other,
                            format!("ffmpeg exited with {}", status),
                        ));
                    }
                    return Ok(count);
                }
            }
        }
    }
}
