//! Artifact download

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::BootstrapError;

/// Downloads the tunnel artifact
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Save `url` to `dest`, replacing any existing file. Returns bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, BootstrapError>;
}

/// Fetches artifacts over HTTP(S)
pub struct HttpFetcher {
    client: reqwest::Client,
}

/// Log download progress every this many bytes
const PROGRESS_STEP: u64 = 8 * 1024 * 1024;

impl HttpFetcher {
    pub fn new(connect_timeout: Duration) -> Result<Self, BootstrapError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("dvr-tunnel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BootstrapError::Download {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, BootstrapError> {
        let download_err = |reason: String| BootstrapError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_err(format!("HTTP {}", response.status())));
        }

        let total_size = response.content_length();

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut downloaded: u64 = 0;
        let mut next_report = PROGRESS_STEP;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_err(e.to_string()))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if downloaded >= next_report {
                match total_size {
                    Some(total) => tracing::info!("Downloaded {} / {} bytes", downloaded, total),
                    None => tracing::info!("Downloaded {} bytes", downloaded),
                }
                next_report += PROGRESS_STEP;
            }
        }

        file.flush().await?;
        Ok(downloaded)
    }
}

/// Hex-encoded SHA-256 of a file
pub async fn sha256_file(path: &Path) -> Result<String, BootstrapError> {
    let data = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&data)))
}

/// Check a file against an expected hex digest (case-insensitive)
pub async fn verify_sha256(path: &Path, expected: &str) -> Result<(), BootstrapError> {
    let actual = sha256_file(path).await?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(BootstrapError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_lowercase(),
            actual,
        })
    }
}
