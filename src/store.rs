//! Typed access to the two relations the simulation touches:
//! `blocked_sites` (read in full on cache refresh) and `sites_visited`
//! (one insert per simulated visit). All statements go through the
//! connection pool's transactional helpers.

use crate::cache::BlocklistSource;
use crate::error::AgentError;
use crate::pool::ConnectionPool;
use async_trait::async_trait;
use rusqlite::params;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::info;

/// Sample blocked sites installed into an empty `blocked_sites` table so a
/// fresh database exhibits blocking behavior out of the box.
const DEFAULT_BLOCKED_SITES: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "youtube.com",
    "netflix.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    Allowed,
    Blocked,
}

impl VisitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitOutcome::Allowed => "allowed",
            VisitOutcome::Blocked => "blocked",
        }
    }
}

/// One classified visit, immutable once constructed. Its terminal state is
/// either a row in `sites_visited` or an error-counter increment.
#[derive(Debug, Clone)]
pub struct VisitEvent {
    pub user_id: u32,
    pub site: String,
    pub outcome: VisitOutcome,
    pub user_agent: String,
    pub source_addr: String,
    /// Unix timestamp, seconds.
    pub timestamp: i64,
}

pub struct VisitStore {
    pool: Arc<ConnectionPool>,
}

impl VisitStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub async fn init_schema(&self) -> Result<(), AgentError> {
        self.pool
            .execute(
                "CREATE TABLE IF NOT EXISTS blocked_sites (
                    site_name TEXT PRIMARY KEY
                )",
                [],
            )
            .await?;

        self.pool
            .execute(
                "CREATE TABLE IF NOT EXISTS sites_visited (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    url TEXT NOT NULL,
                    status TEXT NOT NULL,
                    user_agent TEXT,
                    ip_address TEXT,
                    visit_time INTEGER NOT NULL
                )",
                [],
            )
            .await?;

        self.pool
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_visits_time ON sites_visited(visit_time)",
                [],
            )
            .await?;

        Ok(())
    }

    /// Installs the sample blocklist, but only into an empty table so an
    /// operator-curated list is never touched.
    pub async fn seed_blocklist_if_empty(&self) -> Result<(), AgentError> {
        let counts = self
            .pool
            .query_rows("SELECT COUNT(*) FROM blocked_sites", [], |row| {
                row.get::<_, i64>(0)
            })
            .await?;

        if counts.first().copied().unwrap_or(0) == 0 {
            for site in DEFAULT_BLOCKED_SITES {
                self.pool
                    .execute(
                        "INSERT OR IGNORE INTO blocked_sites (site_name) VALUES (?1)",
                        params![site],
                    )
                    .await?;
            }
            info!(
                "Seeded blocked_sites with {} sample entries",
                DEFAULT_BLOCKED_SITES.len()
            );
        }
        Ok(())
    }

    pub async fn add_blocked_site(&self, site: &str) -> Result<(), AgentError> {
        self.pool
            .execute(
                "INSERT OR IGNORE INTO blocked_sites (site_name) VALUES (?1)",
                params![site],
            )
            .await?;
        Ok(())
    }

    pub async fn record_visit(&self, event: &VisitEvent) -> Result<(), AgentError> {
        // Owned `Value`s rather than `params![..]`: the borrowed parameter
        // array is not `Send`, and this future is held across an await
        // inside `tokio::spawn`.
        let params: Vec<rusqlite::types::Value> = vec![
            i64::from(event.user_id).into(),
            event.site.clone().into(),
            event.outcome.as_str().to_string().into(),
            event.user_agent.clone().into(),
            event.source_addr.clone().into(),
            event.timestamp.into(),
        ];
        self.pool
            .execute(
                "INSERT INTO sites_visited (user_id, url, status, user_agent, ip_address, visit_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params_from_iter(params),
            )
            .await?;
        Ok(())
    }

    pub async fn visit_count(&self) -> Result<u64, AgentError> {
        let counts = self
            .pool
            .query_rows("SELECT COUNT(*) FROM sites_visited", [], |row| {
                row.get::<_, i64>(0)
            })
            .await?;
        Ok(counts.first().copied().unwrap_or(0) as u64)
    }
}

#[async_trait]
impl BlocklistSource for VisitStore {
    async fn load_blocked_sites(&self) -> Result<FxHashSet<Box<str>>, AgentError> {
        let sites = self
            .pool
            .query_rows("SELECT site_name FROM blocked_sites", [], |row| {
                row.get::<_, String>(0)
            })
            .await?;
        Ok(sites.into_iter().map(String::into_boxed_str).collect())
    }
}
