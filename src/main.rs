use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let mut config = match std::env::var("SCRIPTSHELF_CONFIG") {
        Ok(path) => scriptshelf::ServerConfig::from_file(std::path::Path::new(&path))?,
        Err(_) => scriptshelf::ServerConfig::default(),
    };
    config.apply_env()?;

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "scriptshelf",
        "scriptshelf starting: RUST_LOG='{}', http_port={}, backend={:?}, data_dir={:?}",
        rust_log, config.http_port, config.backend, config.data_dir
    );

    scriptshelf::server::run(config).await
}
