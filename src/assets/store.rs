//! Persistent binary store for model assets
//!
//! One store directory per installation, containing a `models/` container
//! with one file per asset key and a JSON schema marker. The layout mirrors
//! the `ONNXModels`/`models` naming of the browser original.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::AssetKey;

static PUT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Current on-disk schema version. A bump clears and recreates the
/// container on the next open; there is no finer-grained migration.
pub const SCHEMA_VERSION: u32 = 1;

const META_FILE: &str = "store.json";
const CONTAINER_DIR: &str = "models";

/// Store-level failures. These never escalate past the asset loader:
/// reads degrade to a miss, writes are logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing directory cannot be created or written at all.
    /// Recoverable by falling back to an in-memory store.
    #[error("persistent model store unavailable: {0}")]
    Unavailable(#[source] std::io::Error),

    #[error("failed to read cached asset: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write cached asset: {0}")]
    Write(#[source] std::io::Error),
}

/// Key-value byte storage for model assets.
///
/// `get` returns `Ok(None)` for a key that was never written; absence is
/// not an error. `put` is an atomic upsert: a concurrent or crashed reader
/// observes either the previous value or the new one, never a torn write.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn get(&self, key: AssetKey) -> Result<Option<Vec<u8>>, StoreError>;
    async fn put(&self, key: AssetKey, bytes: &[u8]) -> Result<(), StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreMeta {
    version: u32,
}

/// Disk-backed asset store rooted at a single directory.
pub struct DiskStore {
    container: PathBuf,
}

impl DiskStore {
    /// Open the store at `root`, creating the schema if absent.
    ///
    /// An existing store with a different schema version is cleared and
    /// recreated; cached assets are re-fetched on the next load cycle.
    pub fn open(root: &Path) -> Result<Self, StoreError> {
        let container = root.join(CONTAINER_DIR);
        std::fs::create_dir_all(&container).map_err(StoreError::Unavailable)?;

        let meta_path = root.join(META_FILE);
        match std::fs::read_to_string(&meta_path) {
            Ok(content) => {
                let version = serde_json::from_str::<StoreMeta>(&content)
                    .map(|meta| meta.version)
                    .unwrap_or(0);
                if version != SCHEMA_VERSION {
                    info!(
                        found = version,
                        expected = SCHEMA_VERSION,
                        "model store schema changed, clearing cached assets"
                    );
                    std::fs::remove_dir_all(&container).map_err(StoreError::Unavailable)?;
                    std::fs::create_dir_all(&container).map_err(StoreError::Unavailable)?;
                    Self::write_meta(&meta_path)?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::write_meta(&meta_path)?;
            }
            Err(e) => return Err(StoreError::Unavailable(e)),
        }

        Ok(Self { container })
    }

    fn write_meta(path: &Path) -> Result<(), StoreError> {
        let meta = StoreMeta {
            version: SCHEMA_VERSION,
        };
        let content = serde_json::to_string(&meta).map_err(|e| {
            StoreError::Unavailable(std::io::Error::other(e))
        })?;
        std::fs::write(path, content).map_err(StoreError::Unavailable)
    }

    fn entry_path(&self, key: AssetKey) -> PathBuf {
        self.container.join(format!("{}.bin", key.as_str()))
    }
}

#[async_trait]
impl AssetStore for DiskStore {
    async fn get(&self, key: AssetKey) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read(e)),
        }
    }

    async fn put(&self, key: AssetKey, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        // Write to a sibling temp file and rename so readers never see a
        // partially written asset. The temp name is unique per writer;
        // concurrent same-key puts must not share a rename source.
        let temp = self.container.join(format!(
            "{}.bin.{}.{}.tmp",
            key.as_str(),
            std::process::id(),
            PUT_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(StoreError::Write)?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StoreError::Write(e));
        }
        Ok(())
    }
}

/// In-memory asset store.
///
/// Used by tests in place of the disk store, and as the session-scoped
/// fallback when persistent storage is unavailable.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<AssetKey, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn get(&self, key: AssetKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.read().await.get(&key).cloned())
    }

    async fn put(&self, key: AssetKey, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries.write().await.insert(key, bytes.to_vec());
        Ok(())
    }
}

/// Open the disk store, falling back to an in-memory store when persistent
/// storage is unavailable. Caching then lasts for the session only and the
/// loader runs effectively network-only across restarts.
pub fn open_or_fallback(root: &Path) -> std::sync::Arc<dyn AssetStore> {
    match DiskStore::open(root) {
        Ok(store) => std::sync::Arc::new(store),
        Err(e) => {
            warn!(
                path = %root.display(),
                error = %e,
                "persistent model store unavailable, caching for this session only"
            );
            std::sync::Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_get_on_empty_store_is_absent() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        assert!(store.get(AssetKey::Det).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_exact_bytes() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        let payload = vec![7u8; 1024];
        store.put(AssetKey::Det, &payload).await.unwrap();

        assert_eq!(store.get(AssetKey::Det).await.unwrap(), Some(payload));
        // Unrelated keys stay absent.
        assert!(store.get(AssetKey::Rec).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_silently() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        store.put(AssetKey::Dict, b"old").await.unwrap();
        store.put(AssetKey::Dict, b"new").await.unwrap();

        assert_eq!(
            store.get(AssetKey::Dict).await.unwrap(),
            Some(b"new".to_vec())
        );
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DiskStore::open(dir.path()).unwrap();
            store.put(AssetKey::Rec, &[1, 2, 3]).await.unwrap();
        }

        let store = DiskStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get(AssetKey::Rec).await.unwrap(),
            Some(vec![1, 2, 3])
        );
    }

    #[tokio::test]
    async fn test_schema_version_bump_clears_container() {
        let dir = tempdir().unwrap();
        {
            let store = DiskStore::open(dir.path()).unwrap();
            store.put(AssetKey::Det, &[9, 9]).await.unwrap();
        }

        // Simulate a store written by an older build.
        std::fs::write(dir.path().join(META_FILE), r#"{"version":0}"#).unwrap();

        let store = DiskStore::open(dir.path()).unwrap();
        assert!(store.get(AssetKey::Det).await.unwrap().is_none());

        // The marker is rewritten at the current version.
        let meta: StoreMeta =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(META_FILE)).unwrap())
                .unwrap();
        assert_eq!(meta.version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let store = DiskStore::open(dir.path()).unwrap();

        store.put(AssetKey::Det, &[1; 64]).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(CONTAINER_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_same_key_puts_both_succeed() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(DiskStore::open(dir.path()).unwrap());

        for _ in 0..8 {
            let s1 = store.clone();
            let s2 = store.clone();
            let (r1, r2) = tokio::join!(
                tokio::spawn(async move { s1.put(AssetKey::Det, &[1u8; 65536]).await }),
                tokio::spawn(async move { s2.put(AssetKey::Det, &[2u8; 65536]).await }),
            );
            r1.unwrap().unwrap();
            r2.unwrap().unwrap();

            // One of the two writes wins, intact.
            let value = store.get(AssetKey::Det).await.unwrap().unwrap();
            assert!(value == vec![1u8; 65536] || value == vec![2u8; 65536]);
        }

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join(CONTAINER_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "tmp").unwrap_or(false))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_store_serves_the_session_when_disk_is_unusable() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        // The store root sits under a regular file, so the disk store
        // cannot create its container and the in-memory fallback takes
        // over for the session.
        let store = open_or_fallback(&blocker.join("store"));

        assert!(store.get(AssetKey::Det).await.unwrap().is_none());
        store.put(AssetKey::Det, &[5, 5]).await.unwrap();
        assert_eq!(store.get(AssetKey::Det).await.unwrap(), Some(vec![5, 5]));
    }

    #[tokio::test]
    async fn test_memory_store_miss_then_hit() {
        let store = MemoryStore::new();

        assert!(store.get(AssetKey::Dict).await.unwrap().is_none());
        store.put(AssetKey::Dict, b"abc").await.unwrap();
        assert_eq!(
            store.get(AssetKey::Dict).await.unwrap(),
            Some(b"abc".to_vec())
        );
    }
}
