//! Live stream state: the current DVR settings and one worker per channel

use std::collections::BTreeMap;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use dt_core::config::DvrConfig;

use crate::capture::{spawn_capture, CaptureOptions, CaptureSource, FrameReceiver};
use crate::rtsp;

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    frames: FrameReceiver,
}

struct Inner {
    settings: DvrConfig,
    workers: BTreeMap<u8, Worker>,
}

/// Owns the capture workers
pub struct StreamState {
    inner: RwLock<Inner>,
    options: CaptureOptions,
}

impl StreamState {
    /// Create the state with no running workers
    pub fn new(settings: DvrConfig, options: CaptureOptions) -> Self {
        Self {
            inner: RwLock::new(Inner {
                settings,
                workers: BTreeMap::new(),
            }),
            options,
        }
    }

    /// Stop every worker, adopt `settings` and start one worker per channel
    pub async fn start_streams(&self, mut settings: DvrConfig) {
        settings.channels = DvrConfig::normalize_channels(settings.channels.iter().copied());

        let mut inner = self.inner.write().await;
        stop_workers(&mut inner.workers).await;

        for &channel in &settings.channels {
            let source = CaptureSource {
                channel,
                url: rtsp::channel_url(&settings, channel),
                display_url: rtsp::redacted_channel_url(&settings, channel),
                target_height: settings.target_height,
            };
            let (tx, rx) = watch::channel(None);
            let cancel = CancellationToken::new();
            let handle = spawn_capture(source, self.options.clone(), tx, cancel.clone());

            inner.workers.insert(
                channel,
                Worker {
                    cancel,
                    handle,
                    frames: rx,
                },
            );
        }

        tracing::info!(
            "Streaming channels {:?} from {}",
            settings.channels,
            settings.ip
        );
        inner.settings = settings;
    }

    /// Stop every worker
    pub async fn stop_all(&self) {
        let mut inner = self.inner.write().await;
        stop_workers(&mut inner.workers).await;
    }

    /// Current settings
    pub async fn settings(&self) -> DvrConfig {
        self.inner.read().await.settings.clone()
    }

    /// Whether any channel is running
    pub async fn is_connected(&self) -> bool {
        !self.inner.read().await.workers.is_empty()
    }

    /// Frame feed of one channel
    pub async fn feed(&self, channel: u8) -> Option<FrameReceiver> {
        self.inner
            .read()
            .await
            .workers
            .get(&channel)
            .map(|w| w.frames.clone())
    }

    /// Feeds of the given channels that are running, in the given order
    pub async fn feeds(&self, channels: &[u8]) -> Vec<FrameReceiver> {
        let inner = self.inner.read().await;
        channels
            .iter()
            .filter_map(|ch| inner.workers.get(ch).map(|w| w.frames.clone()))
            .collect()
    }
}

async fn stop_workers(workers: &mut BTreeMap<u8, Worker>) {
    for (channel, worker) in std::mem::take(workers) {
        worker.cancel.cancel();
        if let Err(e) = worker.handle.await {
            tracing::warn!("Channel {} worker ended abnormally: {}", channel, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state() -> StreamState {
        StreamState::new(
            DvrConfig::default(),
            CaptureOptions {
                ffmpeg_path: "dt-no-such-ffmpeg".to_string(),
                source_timeout: Duration::from_secs(1),
                reconnect_delay: Duration::from_millis(20),
                jpeg_quality: 80,
            },
        )
    }

    #[tokio::test]
    async fn test_start_streams_replaces_channels() {
        let state = state();
        assert!(!state.is_connected().await);

        state
            .start_streams(DvrConfig {
                channels: vec![4, 2, 4],
                ..Default::default()
            })
            .await;
        assert_eq!(state.settings().await.channels, vec![2, 4]);
        assert!(state.feed(2).await.is_some());
        assert!(state.feed(1).await.is_none());

        let old_feed = state.feed(2).await.unwrap();

        state
            .start_streams(DvrConfig {
                channels: vec![1],
                ..Default::default()
            })
            .await;
        assert!(state.feed(2).await.is_none());
        assert_eq!(state.feeds(&[1, 2, 3]).await.len(), 1);
        // The old worker's sender is gone
        assert!(old_feed.has_changed().is_err());

        state.stop_all().await;
        assert!(!state.is_connected().await);
    }
}
