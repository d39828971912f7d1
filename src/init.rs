//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::error::AgentError;
use crate::pool::ConnectionPool;
use crate::store::VisitStore;
use std::sync::Arc;
use std::time::Duration;

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Opens the connection pool, creates the schema, and installs the sample
/// blocklist into an otherwise empty database.
pub async fn init_store(config: &Config) -> Result<Arc<VisitStore>, AgentError> {
    let pool = ConnectionPool::open(
        &config.database.path,
        config.pool.size,
        Duration::from_millis(config.pool.acquire_timeout_ms),
    )?;
    let store = Arc::new(VisitStore::new(pool));
    store.init_schema().await?;
    store.seed_blocklist_if_empty().await?;
    Ok(store)
}
