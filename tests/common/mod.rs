//! Shared helpers: run the real router on an ephemeral port.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use scriptshelf::server::{router, AppState};
use scriptshelf::storage::{ContentStore, MemoryStore, SharedStore, StoreError, StoreResult};

pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_with(store: SharedStore, max_body_bytes: usize) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = router(AppState::new(store, 4), max_body_bytes);
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    TestServer { base: format!("http://{}", addr), client: reqwest::Client::new(), handle }
}

pub async fn spawn(store: SharedStore) -> TestServer {
    spawn_with(store, 1024 * 1024).await
}

/// Memory-backed server; the returned handle sees the same data.
pub async fn spawn_memory() -> (TestServer, MemoryStore) {
    let mem = MemoryStore::new();
    let server = spawn(Arc::new(mem.clone())).await;
    (server, mem)
}

/// Counts every backend call before delegating.
pub struct CountingStore {
    pub inner: MemoryStore,
    pub calls: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { inner: MemoryStore::new(), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for CountingStore {
    fn name(&self) -> &str { "counting" }
    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, value).await
    }
    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }
    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_keys(prefix).await
    }
}

/// Listing works; every point read, write and delete fails.
pub struct DownStore {
    pub keys: Vec<String>,
}

#[async_trait]
impl ContentStore for DownStore {
    fn name(&self) -> &str { "down" }
    async fn put(&self, _key: &str, _value: Bytes) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn get(&self, _key: &str) -> StoreResult<Option<Bytes>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self.keys.iter().filter(|k| k.starts_with(prefix)).cloned().collect())
    }
}
