//! HTTP download of model assets
//!
//! Single-attempt fetches with no retry policy; a failed fetch is terminal
//! for the current load cycle.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, info};

use super::AssetKey;

/// Environment variable that disables all network access. Mirrors the
/// manual-download escape hatch of the desktop tools this is modeled on.
pub const OFFLINE_ENV: &str = "KOPISTA_OFFLINE";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Why a fetch failed. Carried inside [`super::AssetError::Fetch`] so
/// callers can branch on the cause instead of parsing a message.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("offline mode is enabled ({OFFLINE_ENV} is set)")]
    Offline,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Network access seam for the asset loader. Tests substitute an in-memory
/// implementation to count and script fetches.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, key: AssetKey, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher backed by a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, key: AssetKey, url: &str) -> Result<Vec<u8>, FetchError> {
        if std::env::var(OFFLINE_ENV).is_ok() {
            return Err(FetchError::Offline);
        }

        info!(key = %key, url = url, "downloading model asset");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let total = response.content_length();
        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            bytes.extend_from_slice(&chunk);
            debug!(key = %key, downloaded = bytes.len(), total = ?total, "download progress");
        }

        info!(key = %key, size = bytes.len(), "download complete");
        Ok(bytes)
    }
}
