//! RTSP source addressing for Dahua-compatible DVRs

use dt_core::config::DvrConfig;

/// RTSP URL of one channel
///
/// Credentials are percent-encoded so passwords containing `@`, `:` or `/`
/// survive URL parsing.
pub fn channel_url(dvr: &DvrConfig, channel: u8) -> String {
    format!(
        "rtsp://{}:{}@{}:{}/cam/realmonitor?channel={}&subtype={}",
        urlencoding::encode(&dvr.user),
        urlencoding::encode(&dvr.password),
        dvr.ip,
        dvr.rtsp_port,
        channel,
        dvr.subtype
    )
}

/// The URL with the password masked, for logs
pub fn redacted_channel_url(dvr: &DvrConfig, channel: u8) -> String {
    format!(
        "rtsp://{}:***@{}:{}/cam/realmonitor?channel={}&subtype={}",
        urlencoding::encode(&dvr.user),
        dvr.ip,
        dvr.rtsp_port,
        channel,
        dvr.subtype
    )
}
