//! Workers KV backend over the Cloudflare REST API.
//!
//! Endpoints used (all under `{api_base}/accounts/{account}/storage/kv/namespaces/{namespace}`):
//! - `GET    /keys?prefix=..&cursor=..` paged key listing
//! - `GET    /values/{key}` raw value, 404 when absent
//! - `PUT    /values/{key}` raw body
//! - `DELETE /values/{key}`

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{ContentStore, StoreError, StoreResult};

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CloudflareSettings {
    pub account_id: String,
    pub namespace_id: String,
    pub api_token: String,
    #[serde(default = "CloudflareSettings::default_api_base")]
    pub api_base: String,
}

impl CloudflareSettings {
    fn default_api_base() -> String { DEFAULT_API_BASE.to_string() }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Vec<ListedKey>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ListedKey { name: String }

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct CloudflareKvStore {
    settings: CloudflareSettings,
    client: reqwest::Client,
}

impl CloudflareKvStore {
    pub fn new(settings: CloudflareSettings) -> anyhow::Result<Self> {
        if settings.account_id.is_empty() || settings.namespace_id.is_empty() || settings.api_token.is_empty() {
            anyhow::bail!("cloudflare backend requires account_id, namespace_id and api_token");
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("scriptshelf/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { settings, client })
    }

    fn namespace_url(&self) -> String {
        format!(
            "{}/accounts/{}/storage/kv/namespaces/{}",
            self.settings.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.settings.account_id),
            urlencoding::encode(&self.settings.namespace_id)
        )
    }

    fn value_url(&self, key: &str) -> String {
        format!("{}/values/{}", self.namespace_url(), urlencoding::encode(key))
    }

    fn unexpected(op: &str, status: StatusCode) -> StoreError {
        StoreError::Unavailable(format!("{} returned HTTP {}", op, status))
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

#[async_trait]
impl ContentStore for CloudflareKvStore {
    fn name(&self) -> &str { "cloudflare" }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        let resp = self.client.put(self.value_url(key))
            .bearer_auth(&self.settings.api_token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(value)
            .send().await.map_err(transport)?;
        let status = resp.status();
        tracing::debug!(backend = "cloudflare", op = "put", key, status = status.as_u16());
        if status.is_success() { Ok(()) } else { Err(Self::unexpected("put", status)) }
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        let resp = self.client.get(self.value_url(key))
            .bearer_auth(&self.settings.api_token)
            .send().await.map_err(transport)?;
        let status = resp.status();
        tracing::debug!(backend = "cloudflare", op = "get", key, status = status.as_u16());
        match status {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.bytes().await.map_err(transport)?)),
            s => Err(Self::unexpected("get", s)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let resp = self.client.delete(self.value_url(key))
            .bearer_auth(&self.settings.api_token)
            .send().await.map_err(transport)?;
        let status = resp.status();
        tracing::debug!(backend = "cloudflare", op = "delete", key, status = status.as_u16());
        if status.is_success() || status == StatusCode::NOT_FOUND { Ok(()) } else { Err(Self::unexpected("delete", status)) }
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let url = format!("{}/keys", self.namespace_url());
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = vec![("prefix", prefix), ("limit", "1000")];
            if let Some(c) = cursor.as_deref() { query.push(("cursor", c)); }
            let resp = self.client.get(&url)
                .bearer_auth(&self.settings.api_token)
                .query(&query)
                .send().await.map_err(transport)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(Self::unexpected("list", status));
            }
            let page: ListResponse = resp.json().await.map_err(|e| StoreError::Decode(e.to_string()))?;
            if !page.success {
                let msg = page.errors.iter().map(|e| format!("{} {}", e.code, e.message)).collect::<Vec<_>>().join("; ");
                return Err(StoreError::Unavailable(format!("list failed: {}", msg)));
            }
            out.extend(page.result.into_iter().map(|k| k.name));
            cursor = page.result_info.and_then(|i| i.cursor).filter(|c| !c.is_empty());
            if cursor.is_none() { break; }
        }
        tracing::debug!(backend = "cloudflare", op = "list_keys", prefix, count = out.len());
        Ok(out)
    }
}
