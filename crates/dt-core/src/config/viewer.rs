//! Viewer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Highest channel number offered by the DVR
pub const MAX_CHANNEL: u8 = 16;

/// Configuration for the DVR viewer web service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,

    /// DVR connection used at startup (changeable from the web page)
    pub dvr: DvrConfig,

    /// MJPEG frames per second sent to each client
    pub fps: u32,

    /// JPEG quality of composed mosaic frames (1-100)
    pub jpeg_quality: u8,

    /// Delay before a failed channel is reopened
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,

    /// Socket timeout handed to ffmpeg for the RTSP source
    #[serde(with = "duration_secs")]
    pub source_timeout: Duration,

    /// ffmpeg binary used to read RTSP sources
    pub ffmpeg_path: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            dvr: DvrConfig::default(),
            fps: 12,
            jpeg_quality: 80,
            reconnect_delay: Duration::from_secs(2),
            source_timeout: Duration::from_secs(5),
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

/// DVR address, credentials and channel selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DvrConfig {
    pub ip: String,
    pub user: String,
    pub password: String,
    pub rtsp_port: u16,
    pub channels: Vec<u8>,
    /// 0 = main stream (HD), 1 = sub stream (lighter)
    pub subtype: u8,
    /// Frame height in pixels after scaling
    pub target_height: u32,
}

impl Default for DvrConfig {
    fn default() -> Self {
        Self {
            ip: "192.168.0.18".to_string(),
            user: "admin".to_string(),
            password: String::new(),
            rtsp_port: 554,
            channels: vec![1, 2],
            subtype: 0,
            target_height: 360,
        }
    }
}

impl DvrConfig {
    /// Sort, deduplicate and bound the channel list, defaulting to channel 1
    pub fn normalize_channels(channels: impl IntoIterator<Item = u8>) -> Vec<u8> {
        let mut channels: Vec<u8> = channels
            .into_iter()
            .filter(|ch| (1..=MAX_CHANNEL).contains(ch))
            .collect();
        channels.sort_unstable();
        channels.dedup();
        if channels.is_empty() {
            channels.push(1);
        }
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_channels() {
        assert_eq!(DvrConfig::normalize_channels([3, 1, 3, 2]), vec![1, 2, 3]);
        assert_eq!(DvrConfig::normalize_channels([0, 17]), vec![1]);
        assert_eq!(DvrConfig::normalize_channels(Vec::new()), vec![1]);
    }

    #[test]
    fn test_defaults_match_tunnel_port() {
        let config = ViewerConfig::default();
        assert!(config.bind_address.ends_with(":8000"));
        assert_eq!(config.dvr.target_height, 360);
    }
}
