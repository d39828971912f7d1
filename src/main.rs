use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use sitewatch::agent::MonitoringAgent;
use sitewatch::cache::BlockedSiteCache;
use sitewatch::config::Config;
use sitewatch::init::{init_store, setup_logging};

enum RunMode {
    Continuous,
    Batch(usize),
}

fn parse_args() -> (String, RunMode) {
    let mut config_path = "config.toml".to_string();
    let mut mode = RunMode::Continuous;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--batch" {
            let count = args
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(50);
            mode = RunMode::Batch(count);
        } else {
            config_path = arg;
        }
    }
    (config_path, mode)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let (config_path, mode) = parse_args();
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };
    config.validate()?;

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting sitewatch...");

    if !std::path::Path::new(&config_path).exists() {
        info!("Config file not found, using defaults.");
    }

    // 3. Init Pool, Store & Schema
    let store = init_store(&config).await?;

    // 4. Init Blocked Sites Cache
    let cache = Arc::new(BlockedSiteCache::new(
        store.clone(),
        Duration::from_secs(config.cache.ttl_minutes * 60),
    ));

    // 5. Build Agent (initializes user profiles)
    let agent = MonitoringAgent::new(config, store, cache);

    // 6. Graceful Shutdown on Ctrl-C
    let signal_agent = agent.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received.");
            signal_agent.stop();
        }
    });

    // 7. Run
    match mode {
        RunMode::Batch(n) => agent.run_single_batch(n).await,
        RunMode::Continuous => {
            info!("Starting continuous simulation... Press Ctrl+C to stop");
            agent.run_continuous().await;
        }
    }

    info!("Agent shutdown complete");
    Ok(())
}
