//! Background model worker
//!
//! Runs the whole three-asset resolution plus cache I/O on a spawned task
//! so large downloads and storage transactions stay off the caller's
//! control flow. Each request names its own targets (`Load` carries the
//! source triple, `Cache` the URL to fetch) and carries its own one-shot
//! reply slot, making the one-request-one-terminal-response protocol a
//! property of the types rather than a convention.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{AssetError, AssetFetcher, AssetKey, AssetLoader, AssetSources, AssetStore, LoadedAssets};

const REQUEST_QUEUE_DEPTH: usize = 8;

/// Requests understood by the worker. `Load` is the main load cycle; the
/// other two mirror the direct single-key operations of the original
/// message protocol.
pub enum WorkerRequest {
    Load {
        sources: AssetSources,
        reply: oneshot::Sender<Result<LoadedAssets, AssetError>>,
    },
    Cache {
        key: AssetKey,
        url: String,
        reply: oneshot::Sender<Result<(), AssetError>>,
    },
    LoadFromCache {
        key: AssetKey,
        reply: oneshot::Sender<Result<Option<Vec<u8>>, AssetError>>,
    },
}

/// Handle to a spawned model worker.
pub struct ModelWorker {
    tx: mpsc::Sender<WorkerRequest>,
    handle: JoinHandle<()>,
}

impl ModelWorker {
    /// Spawn a worker that serves requests against the given store and
    /// fetcher. Sources arrive with each request.
    pub fn spawn(store: Arc<dyn AssetStore>, fetcher: Arc<dyn AssetFetcher>) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
        let handle = tokio::spawn(run(store, fetcher, rx));
        Self { tx, handle }
    }

    /// Resolve all three assets on the worker.
    pub async fn load(&self, sources: AssetSources) -> Result<LoadedAssets, AssetError> {
        let (reply, rx) = oneshot::channel();
        self.request(WorkerRequest::Load { sources, reply }, rx).await
    }

    /// Fetch one asset from `url` and persist it, without returning the
    /// bytes.
    pub async fn cache(&self, key: AssetKey, url: impl Into<String>) -> Result<(), AssetError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            WorkerRequest::Cache {
                key,
                url: url.into(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Read one asset straight from the store.
    pub async fn load_from_cache(&self, key: AssetKey) -> Result<Option<Vec<u8>>, AssetError> {
        let (reply, rx) = oneshot::channel();
        self.request(WorkerRequest::LoadFromCache { key, reply }, rx)
            .await
    }

    async fn request<T>(
        &self,
        request: WorkerRequest,
        rx: oneshot::Receiver<Result<T, AssetError>>,
    ) -> Result<T, AssetError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| AssetError::Protocol("model worker is not running".to_string()))?;
        rx.await
            .map_err(|_| AssetError::Protocol("model worker dropped the reply".to_string()))?
    }

    /// Close the request channel and wait for the worker to drain.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

async fn run(
    store: Arc<dyn AssetStore>,
    fetcher: Arc<dyn AssetFetcher>,
    mut rx: mpsc::Receiver<WorkerRequest>,
) {
    debug!("model worker started");
    while let Some(request) = rx.recv().await {
        // Reply send failures mean the requester gave up; nothing to do.
        match request {
            WorkerRequest::Load { sources, reply } => {
                let loader = AssetLoader::new(store.clone(), fetcher.clone(), sources);
                let _ = reply.send(loader.load().await);
            }
            WorkerRequest::Cache { key, url, reply } => {
                let _ = reply.send(cache_one(&store, &fetcher, key, url).await);
            }
            WorkerRequest::LoadFromCache { key, reply } => {
                let _ = reply.send(store.get(key).await.map_err(AssetError::from));
            }
        }
    }
    debug!("model worker stopped");
}

/// Fetch one asset and persist it, surfacing storage failures. Unlike the
/// load cycle the raw request carries no content hash, so there is nothing
/// to verify beyond a successful fetch.
async fn cache_one(
    store: &Arc<dyn AssetStore>,
    fetcher: &Arc<dyn AssetFetcher>,
    key: AssetKey,
    url: String,
) -> Result<(), AssetError> {
    let bytes = fetcher.fetch(key, &url).await.map_err(|source| AssetError::Fetch {
        key,
        url: url.clone(),
        source,
    })?;
    store.put(key, &bytes).await?;
    Ok(())
}
