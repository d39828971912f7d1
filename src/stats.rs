//! Run statistics: lock-free counters shared by every round worker, a
//! periodic log report, and the final JSON snapshot artifact.

use crate::config::Config;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct SimulationStats {
    allowed: AtomicU64,
    blocked: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time view of the counters. `total` is derived from the same
/// loads as `allowed` and `blocked`, so `total == allowed + blocked` holds
/// in every snapshot no matter how increments interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub errors: u64,
}

impl SimulationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let allowed = self.allowed.load(Ordering::Relaxed);
        let blocked = self.blocked.load(Ordering::Relaxed);
        StatsSnapshot {
            total: allowed + blocked,
            allowed,
            blocked,
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    pub fn report(&self) {
        let s = self.snapshot();
        info!("=== SIMULATION STATISTICS ===");
        info!("Total visits: {}", s.total);
        info!("Allowed visits: {}", s.allowed);
        info!("Blocked visits: {}", s.blocked);
        info!("Errors: {}", s.errors);
        if s.total > 0 {
            let block_rate = (s.blocked as f64 / s.total as f64) * 100.0;
            info!("Block rate: {:.2}%", block_rate);
        }
        info!("============================");
    }
}

#[derive(Serialize)]
struct FinalReport<'a> {
    #[serde(flatten)]
    stats: StatsSnapshot,
    simulation_completed: String,
    config: &'a Config,
}

/// Writes the one-per-run statistics artifact next to the configured
/// report directory and returns its path.
pub fn write_final_report(snapshot: StatsSnapshot, config: &Config) -> Result<PathBuf> {
    let now = chrono::Local::now();
    let file_name = format!("simulation_stats_{}.json", now.format("%Y%m%d_%H%M%S"));
    let path = PathBuf::from(&config.stats.report_dir).join(file_name);

    let report = FinalReport {
        stats: snapshot,
        simulation_completed: now.to_rfc3339(),
        config,
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize final report")?;
    std::fs::write(&path, json).context("Failed to write final report")?;
    Ok(path)
}
