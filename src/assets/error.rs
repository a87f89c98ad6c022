//! Error taxonomy for asset resolution

use super::fetch::FetchError;
use super::store::StoreError;
use super::AssetKey;

/// Failures surfaced by the asset loader and model worker.
///
/// Storage problems during a load cycle never reach this type: a failed
/// cache read is treated as a miss and a failed cache write is logged and
/// dropped. The `Storage` variant exists only for the direct single-key
/// cache operations, whose whole purpose is the store access.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// Network fetch failed or returned a non-success status. Fatal to the
    /// load cycle; the OCR engine cannot be built without all three assets.
    #[error("failed to fetch {key} asset from {url}: {source}")]
    Fetch {
        key: AssetKey,
        url: String,
        #[source]
        source: FetchError,
    },

    /// A fetched payload did not match its configured content hash.
    #[error("checksum mismatch for {key} asset: expected {expected}, got {actual}")]
    Checksum {
        key: AssetKey,
        expected: String,
        actual: String,
    },

    /// The dictionary bytes were not valid UTF-8.
    #[error("failed to decode {key} asset as UTF-8 text")]
    Decode {
        key: AssetKey,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Store access failed for a direct cache operation.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The model worker went away without sending a terminal response.
    #[error("model worker protocol error: {0}")]
    Protocol(String),
}

impl AssetError {
    /// The asset this error is about, when there is one.
    pub fn key(&self) -> Option<AssetKey> {
        match self {
            AssetError::Fetch { key, .. }
            | AssetError::Checksum { key, .. }
            | AssetError::Decode { key, .. } => Some(*key),
            AssetError::Storage(_) | AssetError::Protocol(_) => None,
        }
    }
}
