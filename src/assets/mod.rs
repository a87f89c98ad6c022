//! Model asset caching and loading
//!
//! Resolves the three PaddleOCR assets (detector network, recognizer
//! network, character dictionary) to in-memory buffers: the persistent
//! store is consulted first, a miss falls back to a single HTTP fetch, and
//! freshly fetched bytes are written back best-effort so the next run is a
//! pure cache hit.

pub mod error;
pub mod fetch;
pub mod store;
pub mod worker;

pub use error::AssetError;
pub use fetch::{AssetFetcher, FetchError, HttpFetcher};
pub use store::{AssetStore, DiskStore, MemoryStore, StoreError};
pub use worker::ModelWorker;

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Identifies one of the three required model artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKey {
    /// Text detection network (DBNet).
    Det,
    /// Text recognition network (CRNN).
    Rec,
    /// Character dictionary for recognition decoding.
    Dict,
}

impl AssetKey {
    pub const ALL: [AssetKey; 3] = [AssetKey::Det, AssetKey::Rec, AssetKey::Dict];

    /// Store key and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKey::Det => "det",
            AssetKey::Rec => "rec",
            AssetKey::Dict => "dict",
        }
    }

    /// Conventional file name for manual downloads.
    pub fn file_name(&self) -> &'static str {
        match self {
            AssetKey::Det => "det.onnx",
            AssetKey::Rec => "rec.onnx",
            AssetKey::Dict => "dict.txt",
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where to fetch one asset from, with an optional content hash.
///
/// When `sha256` is set, cached bytes that no longer match are re-fetched
/// (the cache-busting path for updated remote assets); a fetched payload
/// that does not match is rejected outright.
#[derive(Debug, Clone)]
pub struct AssetSource {
    pub url: String,
    pub sha256: Option<String>,
}

impl AssetSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            sha256: None,
        }
    }
}

/// The remote sources for all three assets.
#[derive(Debug, Clone)]
pub struct AssetSources {
    pub det: AssetSource,
    pub rec: AssetSource,
    pub dict: AssetSource,
}

impl AssetSources {
    pub fn get(&self, key: AssetKey) -> &AssetSource {
        match key {
            AssetKey::Det => &self.det,
            AssetKey::Rec => &self.rec,
            AssetKey::Dict => &self.dict,
        }
    }
}

/// The resolved asset triple handed to the OCR engine constructor.
#[derive(Debug, Clone)]
pub struct LoadedAssets {
    /// Detector network weights.
    pub det: Vec<u8>,
    /// Recognizer network weights.
    pub rec: Vec<u8>,
    /// Character dictionary, decoded from UTF-8.
    pub dict: String,
}

/// Cache-first resolver for the three model assets.
///
/// Store and fetcher are injected so tests can substitute in-memory
/// implementations of the same contracts.
pub struct AssetLoader {
    store: Arc<dyn AssetStore>,
    fetcher: Arc<dyn AssetFetcher>,
    sources: AssetSources,
}

impl AssetLoader {
    pub fn new(
        store: Arc<dyn AssetStore>,
        fetcher: Arc<dyn AssetFetcher>,
        sources: AssetSources,
    ) -> Self {
        Self {
            store,
            fetcher,
            sources,
        }
    }

    /// Resolve all three assets, preferring the cache.
    ///
    /// The three resolutions run concurrently; the first fatal failure
    /// aborts the load cycle. After one successful run, a second call with
    /// the same sources performs no network requests at all.
    pub async fn load(&self) -> Result<LoadedAssets, AssetError> {
        let (det, rec, dict) = tokio::try_join!(
            self.resolve(AssetKey::Det),
            self.resolve(AssetKey::Rec),
            self.resolve(AssetKey::Dict),
        )?;

        let dict = String::from_utf8(dict).map_err(|source| AssetError::Decode {
            key: AssetKey::Dict,
            source,
        })?;

        Ok(LoadedAssets { det, rec, dict })
    }

    /// Resolve one asset: cache lookup, then fetch fallback with a
    /// best-effort write-back.
    async fn resolve(&self, key: AssetKey) -> Result<Vec<u8>, AssetError> {
        let source = self.sources.get(key);

        match self.store.get(key).await {
            Ok(Some(bytes)) => {
                if self.verify(key, source, &bytes) {
                    debug!(key = %key, size = bytes.len(), "asset served from cache");
                    return Ok(bytes);
                }
                warn!(key = %key, "cached asset fails checksum, re-fetching");
            }
            Ok(None) => debug!(key = %key, "asset not cached"),
            Err(e) => warn!(key = %key, error = %e, "cache read failed, treating as miss"),
        }

        let bytes = self.fetch_verified(key, source).await?;

        // Caching is an optimization: a failed write must not block the
        // caller, who already holds the bytes.
        if let Err(e) = self.store.put(key, &bytes).await {
            warn!(key = %key, error = %e, "cache write failed, continuing without caching");
        }

        Ok(bytes)
    }

    async fn fetch_verified(
        &self,
        key: AssetKey,
        source: &AssetSource,
    ) -> Result<Vec<u8>, AssetError> {
        let bytes =
            self.fetcher
                .fetch(key, &source.url)
                .await
                .map_err(|source_err| AssetError::Fetch {
                    key,
                    url: source.url.clone(),
                    source: source_err,
                })?;

        if let Some(expected) = source.sha256.as_deref() {
            let actual = sha256_hex(&bytes);
            if actual != expected {
                return Err(AssetError::Checksum {
                    key,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        Ok(bytes)
    }

    fn verify(&self, key: AssetKey, source: &AssetSource, bytes: &[u8]) -> bool {
        match source.sha256.as_deref() {
            Some(expected) => {
                let actual = sha256_hex(bytes);
                if actual == expected {
                    true
                } else {
                    debug!(key = %key, expected = expected, actual = %actual, "stale cache entry");
                    false
                }
            }
            None => true,
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
