//! Content store client
//! --------------------
//! Thin async operations against the eventually-consistent key-value backend.
//! The listing returned by [`ContentStore::list_keys`] may lag behind puts and
//! deletes; point reads are authoritative.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub mod cloudflare;
pub mod kv;

pub use cloudflare::{CloudflareKvStore, CloudflareSettings};
pub use kv::{MemoryStore, PersistenceSettings, StoreSettings};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Unconditional overwrite.
    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()>;

    /// `None` when the key was never written or has been deleted.
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>>;

    /// Idempotent; deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Keys under `prefix` that existed at some recent point.
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

pub type SharedStore = Arc<dyn ContentStore>;

/// Bounds every call of the wrapped store with a timeout. An elapsed call is
/// reported as [`StoreError::Timeout`]; nothing is retried.
pub struct TimedStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: ContentStore> TimedStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, op: &str, key: &str, fut: impl std::future::Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => {
                tracing::warn!(backend = self.inner.name(), op, key, timeout_ms = self.timeout.as_millis() as u64, "backend call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for TimedStore<S> {
    fn name(&self) -> &str { self.inner.name() }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.bounded("put", key, self.inner.put(key, value)).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.bounded("get", key, self.inner.get(key)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.bounded("delete", key, self.inner.delete(key)).await
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.bounded("list_keys", prefix, self.inner.list_keys(prefix)).await
    }
}
