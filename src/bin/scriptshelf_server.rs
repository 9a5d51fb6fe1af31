//!
//! scriptshelf server binary
//! -------------------------
//! Command-line entry point for starting the scriptshelf HTTP server.
//! Supports configuration via a JSON file, environment variables and CLI flags.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use scriptshelf::config::{BackendKind, ServerConfig};

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag
            && i + 1 < args.len() {
                return Some(args[i + 1].clone());
            }
        i += 1;
    }
    None
}

fn parse_port_arg(args: &[String], flag: &str) -> Result<Option<u16>> {
    match parse_arg(args, flag) {
        Some(v) => v.parse::<u16>().map(Some).with_context(|| format!("{} expects a port number, got '{}'", flag, v)),
        None => Ok(None),
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

const USAGE: &str = "scriptshelf Server

USAGE:
  scriptshelf_server [--config PATH] [--http-port N] [--bind ADDR] [--backend memory|cloudflare] [--data-dir PATH]

OPTIONS:
  --config PATH       JSON config file (env: SCRIPTSHELF_CONFIG)
  --http-port N       HTTP API port (env: SCRIPTSHELF_HTTP_PORT, default 7878)
  --bind ADDR         Listen address (env: SCRIPTSHELF_BIND, default 0.0.0.0)
  --backend KIND      memory or cloudflare (env: SCRIPTSHELF_BACKEND, default memory)
  --data-dir PATH     Snapshot directory for the memory backend (env: SCRIPTSHELF_DATA_DIR)

Cloudflare backend: SCRIPTSHELF_CF_ACCOUNT_ID, SCRIPTSHELF_CF_NAMESPACE_ID, SCRIPTSHELF_CF_API_TOKEN.
";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber with env filter if provided
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    // Config file, then environment, then CLI arguments
    let config_path = parse_arg(&args, "--config")
        .or_else(|| env::var("SCRIPTSHELF_CONFIG").ok())
        .map(PathBuf::from);
    let mut config = match &config_path {
        Some(p) => ServerConfig::from_file(p)?,
        None => ServerConfig::default(),
    };
    config.apply_env()?;

    if let Some(port) = parse_port_arg(&args, "--http-port")? { config.http_port = port; }
    if let Some(bind) = parse_arg(&args, "--bind") { config.bind = bind; }
    if let Some(backend) = parse_arg(&args, "--backend") { config.backend = backend.parse::<BackendKind>()?; }
    if let Some(dir) = parse_arg(&args, "--data-dir") { config.data_dir = Some(PathBuf::from(dir)); }

    tracing::info!(
        "Using port: http={}, backend={:?}, data_dir={:?}, config={:?}",
        config.http_port, config.backend, config.data_dir, config_path
    );
    scriptshelf::server::run(config).await
}
