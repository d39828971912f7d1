use sitewatch::agent::{AgentState, MonitoringAgent};
use sitewatch::cache::BlockedSiteCache;
use sitewatch::config::Config;
use sitewatch::pool::ConnectionPool;
use sitewatch::store::VisitStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("sitewatch_cont_{}_{}", tag, std::process::id()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_finishes_run_and_emits_final_report_once() {
    let dir = temp_dir("stop");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let db = dir.join("continuous.db");

    let pool = ConnectionPool::open(&db, 2, Duration::from_millis(500)).unwrap();
    let store = Arc::new(VisitStore::new(pool.clone()));
    store.init_schema().await.unwrap();

    let mut config = Config::default();
    config.database.path = db.display().to_string();
    config.simulation.num_users = 2;
    config.simulation.min_visit_interval_secs = 1;
    config.simulation.max_visit_interval_secs = 1;
    config.simulation.seed = Some(5);
    config.stats.report_dir = dir.display().to_string();

    let cache = Arc::new(BlockedSiteCache::new(
        store.clone(),
        Duration::from_secs(300),
    ));
    let agent = MonitoringAgent::new(config, store.clone(), cache);

    let runner = {
        let agent = agent.clone();
        tokio::spawn(async move { agent.run_continuous().await })
    };

    // Let at least one round complete, then request a stop.
    tokio::time::sleep(Duration::from_millis(400)).await;
    agent.stop();

    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("run loop must exit promptly after stop")
        .unwrap();

    assert_eq!(agent.state(), AgentState::Stopped);
    let snapshot = agent.stats().snapshot();
    assert!(snapshot.total >= 2, "at least one round of visits persisted");
    assert_eq!(
        store.visit_count().await.unwrap(),
        snapshot.total,
        "statistics and persisted rows agree"
    );

    // Exactly one final report artifact.
    let artifacts: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("simulation_stats_")
        })
        .collect();
    assert_eq!(artifacts.len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}
