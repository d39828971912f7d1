//! Time-bounded cache of the blocked-site set.
//!
//! The snapshot is replaced wholesale on refresh (readers never observe a
//! partially-populated set) and refresh is single-flighted: of all the
//! callers that observe an expired snapshot, exactly one reloads from the
//! store while the rest answer from the still-held snapshot. A failed
//! refresh keeps the previous snapshot and expiry untouched; staleness is
//! preferred over unavailability.

use crate::error::AgentError;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use rustc_hash::FxHashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Where the blocked-site set comes from. Implemented by `VisitStore`;
/// tests substitute their own.
#[async_trait]
pub trait BlocklistSource: Send + Sync {
    async fn load_blocked_sites(&self) -> Result<FxHashSet<Box<str>>, AgentError>;
}

pub struct BlockedSiteCache {
    snapshot: ArcSwap<FxHashSet<Box<str>>>,
    expires_at: Mutex<Instant>,
    refresh_gate: tokio::sync::Mutex<()>,
    ttl: Duration,
    source: Arc<dyn BlocklistSource>,
}

impl BlockedSiteCache {
    /// Starts with an empty, already-expired snapshot; the first lookup
    /// (or an explicit warm-up `refresh`) loads the real set.
    pub fn new(source: Arc<dyn BlocklistSource>, ttl: Duration) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(FxHashSet::default()),
            expires_at: Mutex::new(Instant::now()),
            refresh_gate: tokio::sync::Mutex::new(()),
            ttl,
            source,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > *self.expires_at.lock().unwrap()
    }

    /// O(1) membership test against the current snapshot, refreshing it
    /// first when the TTL has elapsed.
    ///
    /// The refresh runs on the caller's critical path, but only one caller
    /// per expiry takes it: `try_lock` losers (and everyone arriving while
    /// a refresh is in flight) answer from the prior snapshot immediately.
    pub async fn is_blocked(&self, site: &str) -> bool {
        if self.is_expired() {
            if let Ok(_gate) = self.refresh_gate.try_lock() {
                // Re-check: another caller may have refreshed between the
                // expiry check and winning the gate.
                if self.is_expired() {
                    if let Err(e) = self.refresh_locked().await {
                        warn!("Blocklist refresh failed, serving stale snapshot: {}", e);
                    }
                }
            }
        }
        self.snapshot.load().contains(site)
    }

    /// Explicit refresh, used to warm the cache at startup. Waits for any
    /// in-flight refresh instead of starting a second one.
    pub async fn refresh(&self) -> Result<(), AgentError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Caller must hold `refresh_gate`.
    async fn refresh_locked(&self) -> Result<(), AgentError> {
        let set = self
            .source
            .load_blocked_sites()
            .await
            .map_err(|e| AgentError::RefreshFailed(Box::new(e)))?;

        let count = set.len();
        self.snapshot.store(Arc::new(set));
        // Expiry only ever moves forward: each refresh stamps now + ttl.
        *self.expires_at.lock().unwrap() = Instant::now() + self.ttl;
        info!("Updated blocked sites cache with {} sites", count);
        Ok(())
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.load().len()
    }
}
