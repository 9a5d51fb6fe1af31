//!
//! scriptshelf HTTP server
//! -----------------------
//! Axum-based HTTP API over the content store.
//!
//! Routes:
//! - `GET    /{kind}`                    folder -> names listing (reconciled)
//! - `GET    /{kind}?folder=..&name=..`  raw content, 404 when absent
//! - `POST   /{kind}?folder=..&name=..`  create/overwrite (JSON bodies are validated)
//! - `DELETE /{kind}?folder=..&name=..`  idempotent delete
//! - `OPTIONS *`                         preflight, 204
//!
//! `{kind}` is `scripts` or `json`. Every response carries the same CORS headers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::config::{BackendKind, ServerConfig};
use crate::error::{AppError, AppResult};
use crate::ident::{self, Kind};
use crate::storage::{CloudflareKvStore, MemoryStore, SharedStore, TimedStore};

pub mod reconcile;
pub mod validate;

/// Set on listing responses when some entries could not be confirmed.
pub const LISTING_PARTIAL_HEADER: &str = "x-listing-partial";

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, DELETE, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

/// Shared server state injected into all handlers. Immutable; all mutable
/// state lives in the content store.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    /// Upper bound on concurrent confirmation reads per listing.
    pub listing_concurrency: usize,
}

impl AppState {
    pub fn new(store: SharedStore, listing_concurrency: usize) -> Self {
        Self { store, listing_concurrency: listing_concurrency.max(1) }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EntryParams {
    pub folder: Option<String>,
    pub name: Option<String>,
}

impl EntryParams {
    fn is_listing(&self) -> bool {
        self.folder.is_none() && self.name.is_none()
    }

    /// Storage key for the addressed entry; both parameters are required.
    fn entry_key(&self, kind: Kind) -> AppResult<String> {
        let folder = self.folder.as_deref().filter(|s| !s.is_empty());
        let name = self.name.as_deref().filter(|s| !s.is_empty());
        match (folder, name) {
            (Some(f), Some(n)) => Ok(ident::encode_parts(kind, f, n)?),
            _ => Err(AppError::invalid_identifier("missing_params", "Missing folder or name")),
        }
    }
}

fn parse_kind(raw: &str) -> AppResult<Kind> {
    Kind::from_prefix(raw).ok_or_else(|| AppError::not_found("not_found", "Not found"))
}

fn content_type(kind: Kind) -> &'static str {
    match kind {
        Kind::Json => "application/json",
        Kind::Script => "text/plain; charset=utf-8",
    }
}

/// Build the application router with CORS, body limit and access logging.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { "scriptshelf ok" }))
        .route(
            "/{kind}",
            get(get_entry_or_list)
                .post(put_entry)
                .delete(delete_entry)
                .fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(access_log))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

fn apply_cors(headers: &mut HeaderMap) {
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// Answers preflight requests directly and stamps CORS headers on everything else.
async fn cors(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        apply_cors(resp.headers_mut());
        return resp;
    }
    let mut resp = next.run(req).await;
    apply_cors(resp.headers_mut());
    resp
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let resp = next.run(req).await;
    info!(
        target: "http",
        %method, %path, status = resp.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    resp
}

async fn not_found() -> AppError {
    AppError::not_found("not_found", "Not found")
}

/// Only a recognized kind has methods to disallow; anything else is 404.
async fn method_not_allowed(Path(kind): Path<String>) -> AppError {
    match parse_kind(&kind) {
        Ok(_) => AppError::method_not_allowed("method_not_allowed", "Method not allowed"),
        Err(e) => e,
    }
}

async fn get_entry_or_list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<EntryParams>,
) -> AppResult<Response> {
    let kind = parse_kind(&kind)?;
    if params.is_listing() {
        return list_entries(&state, kind).await;
    }
    let key = params.entry_key(kind)?;
    match state.store.get(&key).await? {
        Some(body) => Ok(([(header::CONTENT_TYPE, content_type(kind))], body).into_response()),
        None => Err(AppError::not_found("not_found", format!("{} not found", kind.label()))),
    }
}

async fn list_entries(state: &AppState, kind: Kind) -> AppResult<Response> {
    let listing = reconcile::list_folders(state.store.as_ref(), kind, state.listing_concurrency).await?;
    let mut resp = Json(&listing.folders).into_response();
    if listing.is_partial() {
        resp.headers_mut().insert(LISTING_PARTIAL_HEADER, HeaderValue::from(listing.failed));
    }
    Ok(resp)
}

async fn put_entry(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<EntryParams>,
    body: Bytes,
) -> AppResult<&'static str> {
    let kind = parse_kind(&kind)?;
    let key = params.entry_key(kind)?;
    if let Err(e) = validate::validate(kind, &body) {
        return Err(AppError::invalid_content("invalid_json", format!("Invalid JSON: {}", e)));
    }
    state.store.put(&key, body).await?;
    Ok(match kind {
        Kind::Script => "Script saved",
        Kind::Json => "JSON saved",
    })
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<EntryParams>,
) -> AppResult<&'static str> {
    let kind = parse_kind(&kind)?;
    let key = params.entry_key(kind)?;
    state.store.delete(&key).await?;
    Ok(match kind {
        Kind::Script => "Script deleted",
        Kind::Json => "JSON deleted",
    })
}

/// Opened backend plus the memory store handle when that backend is in use,
/// so the caller can run its maintenance loop and final snapshot.
pub struct OpenedStore {
    pub store: SharedStore,
    pub memory: Option<MemoryStore>,
}

pub fn open_store(config: &ServerConfig) -> anyhow::Result<OpenedStore> {
    let timeout = config.backend_timeout();
    match config.backend {
        BackendKind::Memory => {
            let mem = match &config.data_dir {
                Some(dir) => MemoryStore::open(dir)
                    .with_context(|| format!("While opening memory store under {}", dir.display()))?,
                None => MemoryStore::new(),
            };
            Ok(OpenedStore { store: Arc::new(TimedStore::new(mem.clone(), timeout)), memory: Some(mem) })
        }
        BackendKind::Cloudflare => {
            let cf = CloudflareKvStore::new(config.cloudflare_settings()?)?;
            Ok(OpenedStore { store: Arc::new(TimedStore::new(cf, timeout)), memory: None })
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Start the HTTP server and block until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let opened = open_store(&config)?;
    let maintenance = opened.memory.as_ref().map(|m| m.spawn_maintenance(config.sweep_interval()));

    let app = router(AppState::new(opened.store.clone(), config.listing_concurrency), config.max_body_bytes);
    let addr: SocketAddr = format!("{}:{}", config.bind, config.http_port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.http_port))?;
    info!(
        target: "startup",
        "scriptshelf listening on {} (backend={}, timeout_ms={}, listing_concurrency={})",
        addr, opened.store.name(), config.backend_timeout_ms, config.listing_concurrency
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(handle) = maintenance { handle.abort(); }
    if let Some(mem) = opened.memory.as_ref().filter(|m| m.persistence_enabled()) {
        let n = mem.save_snapshot().context("While writing final snapshot")?;
        info!(target: "storage", entries = n, "final snapshot written");
    }
    Ok(())
}
