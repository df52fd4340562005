mod analytics;
mod cache;
mod config;
mod error;
mod models;
mod snapshot;
mod source;
#[cfg(test)]
mod test_support;
mod web;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cache::StatsCache;
use config::AppConfig;
use source::FileSource;
use web::server::start_web_server;
use web::state::WebSharedState;

#[derive(Parser)]
#[command(
    name = "apollostats",
    version,
    about = "Round statistics web service backed by a periodically refreshed cache"
)]
struct Cli {
    /// Config file path (defaults to ./apollostats.toml)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides [server] listen_addr
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<String>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Init logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    // 3. Load config
    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(addr) = cli.listen {
        config.server.listen_addr = addr;
    }

    // 4. Build the cache and start refreshing before we accept requests
    let source = Arc::new(FileSource::new(&config.source.path));
    info!("Reading round data from {:?}", source.path());
    let cache = Arc::new(StatsCache::new(source, config.cache.to_cache_config()));
    cache.start()?;
    info!("Stats refresh every {:?}", cache.config().refresh_interval);

    // 5. Serve until ctrl-c
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };
    let result = start_web_server(
        &config.server.listen_addr,
        WebSharedState::new(cache.clone()),
        shutdown,
    )
    .await;

    // 6. Stop the cache (always runs)
    cache.stop().await;

    result
}
