//! joplin-proxy: serves Joplin notes as standalone HTML pages.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use joplin_proxy::api::{ApiState, start_http_server};
use joplin_proxy::cache::ResourceCache;
use joplin_proxy::config::ProxyConfig;
use joplin_proxy::upstream::JoplinClient;

/// HTML proxy for Joplin notes with a transcoding resource cache.
#[derive(Parser, Debug)]
#[command(name = "joplin-proxy")]
#[command(about = "Serve Joplin notes as sanitized HTML pages", long_about = None)]
struct Args {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    /// Listen address, overriding BIND_ADDR.
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(ProxyConfig::from_env()?);
    let bind = match args.bind {
        Some(bind) => bind,
        None => config.bind_addr.parse()?,
    };

    let cache = ResourceCache::open(&config.cache_dir)?;
    let backend = Arc::new(JoplinClient::new(config.clone())?);
    let state = Arc::new(ApiState::new(config, backend, cache)?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let server = start_http_server(bind, state, shutdown_rx).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    shutdown_tx.send(true).ok();
    server.await?;

    Ok(())
}
