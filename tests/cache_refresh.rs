use async_trait::async_trait;
use rustc_hash::FxHashSet;
use sitewatch::cache::{BlockedSiteCache, BlocklistSource};
use sitewatch::error::AgentError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted blocklist source: a settable site set, a failure switch, and a
/// configurable per-load delay so a refresh can be held in flight.
struct StubSource {
    sites: Mutex<FxHashSet<Box<str>>>,
    fail: AtomicBool,
    loads: AtomicUsize,
    load_delay: Duration,
}

impl StubSource {
    fn new(sites: &[&str], load_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sites: Mutex::new(to_set(sites)),
            fail: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            load_delay,
        })
    }

    fn set_sites(&self, sites: &[&str]) {
        *self.sites.lock().unwrap() = to_set(sites);
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

fn to_set(sites: &[&str]) -> FxHashSet<Box<str>> {
    sites.iter().map(|s| s.to_string().into_boxed_str()).collect()
}

#[async_trait]
impl BlocklistSource for StubSource {
    async fn load_blocked_sites(&self) -> Result<FxHashSet<Box<str>>, AgentError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AgentError::QueryFailed(rusqlite::Error::QueryReturnedNoRows));
        }
        Ok(self.sites.lock().unwrap().clone())
    }
}

#[tokio::test]
async fn test_refresh_reflects_source_set() {
    let source = StubSource::new(&["facebook.com"], Duration::ZERO);
    let cache = BlockedSiteCache::new(source.clone(), Duration::from_secs(300));

    cache.refresh().await.unwrap();
    assert_eq!(source.loads(), 1);

    assert!(cache.is_blocked("facebook.com").await);
    assert!(!cache.is_blocked("cnn.com").await);

    // Within the TTL no further loads happen.
    for _ in 0..20 {
        cache.is_blocked("facebook.com").await;
    }
    assert_eq!(source.loads(), 1);
}

#[tokio::test]
async fn test_expiry_triggers_exactly_one_reload() {
    let source = StubSource::new(&["facebook.com"], Duration::ZERO);
    let cache = BlockedSiteCache::new(source.clone(), Duration::from_millis(50));

    cache.refresh().await.unwrap();
    source.set_sites(&["facebook.com", "twitter.com"]);
    assert!(!cache.is_blocked("twitter.com").await, "still the old snapshot");

    tokio::time::sleep(Duration::from_millis(60)).await;

    // First call after expiry reloads before answering.
    assert!(cache.is_blocked("twitter.com").await);
    assert_eq!(source.loads(), 2);
}

#[tokio::test]
async fn test_failed_refresh_serves_stale_snapshot() {
    let source = StubSource::new(&["facebook.com"], Duration::ZERO);
    let cache = BlockedSiteCache::new(source.clone(), Duration::from_millis(50));

    cache.refresh().await.unwrap();
    source.fail.store(true, Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(60)).await;

    // The refresh attempt fails; the answer comes from the last good
    // snapshot instead of failing the caller or going empty.
    assert!(cache.is_blocked("facebook.com").await);
    assert!(!cache.is_blocked("cnn.com").await);
    assert!(source.loads() >= 2, "a reload was attempted");
    assert_eq!(cache.snapshot_len(), 1);

    // Recovery: once the source works again the next expiry reloads.
    source.fail.store(false, Ordering::SeqCst);
    source.set_sites(&["cnn.com"]);
    assert!(cache.is_blocked("cnn.com").await);
    assert!(!cache.is_blocked("facebook.com").await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_single_flight_refresh() {
    // Loads take 100ms, so the refresh is still in flight while the other
    // callers arrive.
    let source = StubSource::new(&["facebook.com"], Duration::from_millis(100));
    let cache = Arc::new(BlockedSiteCache::new(
        source.clone(),
        Duration::from_millis(50),
    ));

    cache.refresh().await.unwrap();
    assert_eq!(source.loads(), 1);

    tokio::time::sleep(Duration::from_millis(60)).await;

    let mut lookups = Vec::new();
    for _ in 0..10 {
        let cache = cache.clone();
        lookups.push(tokio::spawn(
            async move { cache.is_blocked("facebook.com").await },
        ));
    }
    for lookup in lookups {
        assert!(lookup.await.unwrap(), "every caller sees a consistent answer");
    }

    assert_eq!(
        source.loads(),
        2,
        "ten concurrent expired lookups trigger exactly one reload"
    );
}

#[tokio::test]
async fn test_explicit_refresh_waits_for_in_flight_reload() {
    let source = StubSource::new(&["facebook.com"], Duration::from_millis(50));
    let cache = Arc::new(BlockedSiteCache::new(
        source.clone(),
        Duration::from_secs(300),
    ));

    let first = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.refresh().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.refresh().await.unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(source.loads(), 2);
    assert!(cache.is_blocked("facebook.com").await);
}
