//! Server configuration
//! --------------------
//! Resolved from, lowest precedence first: built-in defaults, an optional
//! JSON config file, `SCRIPTSHELF_*` environment variables, and finally the
//! command-line flags handled by the server binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::storage::{CloudflareSettings, cloudflare::DEFAULT_API_BASE};

pub const ENV_PREFIX: &str = "SCRIPTSHELF_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Cloudflare,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(BackendKind::Memory),
            "cloudflare" | "workers-kv" | "kv" => Ok(BackendKind::Cloudflare),
            other => anyhow::bail!("unknown backend '{}': expected memory or cloudflare", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http_port: u16,
    pub bind: String,
    pub backend: BackendKind,
    /// Memory backend only: directory for `store.json` and snapshots.
    pub data_dir: Option<PathBuf>,
    pub sweep_interval_ms: u64,
    pub backend_timeout_ms: u64,
    pub listing_concurrency: usize,
    pub max_body_bytes: usize,
    pub account_id: Option<String>,
    pub namespace_id: Option<String>,
    pub api_token: Option<String>,
    pub api_base: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 7878,
            bind: "0.0.0.0".to_string(),
            backend: BackendKind::Memory,
            data_dir: None,
            sweep_interval_ms: 1_000,
            backend_timeout_ms: 5_000,
            listing_concurrency: 16,
            max_body_bytes: 1024 * 1024,
            account_id: None,
            namespace_id: None,
            api_token: None,
            api_base: None,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl ServerConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Overlay `SCRIPTSHELF_*` variables from the process environment.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|name| std::env::var(format!("{}{}", ENV_PREFIX, name)).ok())
    }

    /// Overlay variables from `lookup`, which receives names without the prefix.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        fn num<T: std::str::FromStr>(name: &str, v: String) -> anyhow::Result<T> {
            v.trim().parse::<T>().map_err(|_| anyhow::anyhow!("{}{} must be a number, got '{}'", ENV_PREFIX, name, v))
        }
        if let Some(v) = lookup("HTTP_PORT") { self.http_port = num("HTTP_PORT", v)?; }
        if let Some(v) = lookup("BIND") { self.bind = v; }
        if let Some(v) = lookup("BACKEND") { self.backend = v.parse()?; }
        if let Some(v) = lookup("DATA_DIR") { self.data_dir = Some(PathBuf::from(v)); }
        if let Some(v) = lookup("PERSIST") {
            // PERSIST=false turns a configured data dir off without editing the file.
            if parse_bool(&v) == Some(false) { self.data_dir = None; }
        }
        if let Some(v) = lookup("SWEEP_INTERVAL_MS") { self.sweep_interval_ms = num("SWEEP_INTERVAL_MS", v)?; }
        if let Some(v) = lookup("BACKEND_TIMEOUT_MS") { self.backend_timeout_ms = num("BACKEND_TIMEOUT_MS", v)?; }
        if let Some(v) = lookup("LISTING_CONCURRENCY") { self.listing_concurrency = num("LISTING_CONCURRENCY", v)?; }
        if let Some(v) = lookup("MAX_BODY_BYTES") { self.max_body_bytes = num("MAX_BODY_BYTES", v)?; }
        if let Some(v) = lookup("CF_ACCOUNT_ID") { self.account_id = Some(v); }
        if let Some(v) = lookup("CF_NAMESPACE_ID") { self.namespace_id = Some(v); }
        if let Some(v) = lookup("CF_API_TOKEN") { self.api_token = Some(v); }
        if let Some(v) = lookup("CF_API_BASE") { self.api_base = Some(v); }
        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration { Duration::from_millis(self.backend_timeout_ms.max(1)) }

    pub fn sweep_interval(&self) -> Duration { Duration::from_millis(self.sweep_interval_ms.max(1)) }

    pub fn cloudflare_settings(&self) -> anyhow::Result<CloudflareSettings> {
        let need = |v: &Option<String>, what: &str| -> anyhow::Result<String> {
            v.clone().filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow::anyhow!("cloudflare backend needs {} ({}CF_{})", what, ENV_PREFIX, what.to_ascii_uppercase()))
        };
        Ok(CloudflareSettings {
            account_id: need(&self.account_id, "account_id")?,
            namespace_id: need(&self.namespace_id, "namespace_id")?,
            api_token: need(&self.api_token, "api_token")?,
            api_base: self.api_base.clone().unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}
