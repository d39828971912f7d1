//! The monitoring agent: owns the run lifecycle, drives rounds of
//! concurrent user sessions bounded by per-task deadlines, and funnels
//! every outcome into the shared statistics.

use crate::cache::BlockedSiteCache;
use crate::catalog::SiteCatalog;
use crate::config::Config;
use crate::simulator::{self, UserProfile};
use crate::stats::{self, SimulationStats};
use crate::store::{VisitEvent, VisitOutcome, VisitStore};
use futures::future::join_all;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AgentState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    /// Terminal. The final report is emitted exactly once on entry.
    Stopped = 3,
}

/// What one user session produced. The caller decides whether the result
/// still counts: a session that outlives its deadline is dropped here and
/// never reaches the statistics.
#[derive(Debug, Clone, Copy)]
enum SessionResult {
    Completed(VisitOutcome),
    Failed,
    Skipped,
}

pub struct MonitoringAgent {
    config: Config,
    catalog: SiteCatalog,
    profiles: FxHashMap<u32, UserProfile>,
    store: Arc<VisitStore>,
    cache: Arc<BlockedSiteCache>,
    stats: Arc<SimulationStats>,
    state: AtomicU8,
    shutdown: CancellationToken,
    rng_seq: AtomicU64,
}

impl MonitoringAgent {
    /// Builds the agent in `Created` state and initializes one profile per
    /// simulated user.
    pub fn new(config: Config, store: Arc<VisitStore>, cache: Arc<BlockedSiteCache>) -> Arc<Self> {
        let catalog = SiteCatalog::new();
        let mut rng = match config.simulation.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut profiles = FxHashMap::default();
        for user_id in 1..=config.simulation.num_users {
            profiles.insert(user_id, UserProfile::generate(user_id, &catalog, &mut rng));
        }
        info!("Initialized {} user simulators", profiles.len());

        Arc::new(Self {
            config,
            catalog,
            profiles,
            store,
            cache,
            stats: Arc::new(SimulationStats::new()),
            state: AtomicU8::new(AgentState::Created as u8),
            shutdown: CancellationToken::new(),
            rng_seq: AtomicU64::new(1),
        })
    }

    pub fn state(&self) -> AgentState {
        match self.state.load(Ordering::Acquire) {
            0 => AgentState::Created,
            1 => AgentState::Running,
            2 => AgentState::Stopping,
            _ => AgentState::Stopped,
        }
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    /// Requests a graceful stop: no new rounds, in-flight tasks finish or
    /// time out.
    pub fn stop(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s != AgentState::Stopped as u8).then_some(AgentState::Stopping as u8)
            });
        self.shutdown.cancel();
        info!("Stopping simulation...");
    }

    /// Token observed by the round loop; `main` wires Ctrl-C to it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.is_cancelled()
            || matches!(self.state(), AgentState::Stopping | AgentState::Stopped)
    }

    fn transition(&self, from: AgentState, to: AgentState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Per-task rng. Seeded runs derive a distinct, reproducible stream per
    /// session from the base seed and a sequence number.
    fn session_rng(&self) -> ChaCha8Rng {
        let n = self.rng_seq.fetch_add(1, Ordering::Relaxed);
        match self.config.simulation.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(n)),
            None => ChaCha8Rng::from_entropy(),
        }
    }

    /// Runs rounds until the max runtime elapses or a stop is requested.
    pub async fn run_continuous(self: &Arc<Self>) {
        if !self.transition(AgentState::Created, AgentState::Running) {
            warn!("Agent already started; ignoring run_continuous call");
            return;
        }
        info!("Starting continuous website monitoring simulation");

        if let Err(e) = self.cache.refresh().await {
            error!("Failed to warm blocked sites cache: {}", e);
        }

        let started = Instant::now();
        let max_runtime = Duration::from_secs(self.config.simulation.max_runtime_hours * 3600);
        let task_timeout = Duration::from_secs(self.config.simulation.task_timeout_secs);
        let report_interval =
            Duration::from_secs(self.config.stats.report_interval_minutes * 60);
        let mut last_report = Instant::now();

        while !self.stop_requested() && started.elapsed() < max_runtime {
            let round_ok = self.run_round(task_timeout).await;
            if !round_ok {
                // A worker failed outside the normal error paths; pause
                // briefly and keep going.
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            if last_report.elapsed() > report_interval {
                self.stats.report();
                last_report = Instant::now();
            }

            if self.stop_requested() {
                break;
            }

            let pause = {
                let mut rng = self.session_rng();
                rng.gen_range(
                    self.config.simulation.min_visit_interval_secs as f64
                        ..=self.config.simulation.max_visit_interval_secs as f64,
                )
            };
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(pause)) => {}
                _ = self.shutdown.cancelled() => {}
            }
        }

        self.finish();
    }

    /// One round: one task per user on the worker pool, each bounded by the
    /// per-task deadline. Returns only after every task finished or was
    /// abandoned; the return value is false when a task failed in an
    /// unexpected way (panic rather than a counted error).
    async fn run_round(self: &Arc<Self>, task_timeout: Duration) -> bool {
        let mut round = Vec::with_capacity(self.profiles.len());
        for &user_id in self.profiles.keys() {
            if self.stop_requested() {
                break;
            }
            let agent = Arc::clone(self);
            round.push(tokio::spawn(async move {
                // Two layers: the inner task is the session itself, the
                // outer applies the deadline. An abandoned session keeps
                // running but its result is dropped with the handle.
                let session = tokio::spawn({
                    let agent = Arc::clone(&agent);
                    async move { agent.simulate_user_session(user_id).await }
                });
                match tokio::time::timeout(task_timeout, session).await {
                    Ok(Ok(result)) => {
                        agent.apply_session_result(result);
                        true
                    }
                    Ok(Err(e)) => {
                        error!("User {} simulation task failed: {}", user_id, e);
                        agent.stats.record_error();
                        false
                    }
                    Err(_) => {
                        error!(
                            "User {} session exceeded its {:?} deadline, abandoning",
                            user_id, task_timeout
                        );
                        agent.stats.record_error();
                        true
                    }
                }
            }));
        }

        // Round barrier: the next round cannot start until every task has
        // finished or hit its deadline.
        let mut round_ok = true;
        for joined in join_all(round).await {
            match joined {
                Ok(task_ok) => round_ok &= task_ok,
                Err(e) => {
                    error!("Round task join failed: {}", e);
                    self.stats.record_error();
                    round_ok = false;
                }
            }
        }
        round_ok
    }

    /// Runs exactly `num_visits` serially, each by a randomly chosen user
    /// with a short randomized delay in between. No round or deadline
    /// machinery; the same per-visit body as the concurrent mode.
    pub async fn run_single_batch(self: &Arc<Self>, num_visits: usize) {
        if !self.transition(AgentState::Created, AgentState::Running) {
            warn!("Agent already started; ignoring run_single_batch call");
            return;
        }
        info!(
            "Starting single batch simulation with {} visits",
            num_visits
        );

        if let Err(e) = self.cache.refresh().await {
            error!("Failed to warm blocked sites cache: {}", e);
        }

        let user_ids: Vec<u32> = self.profiles.keys().copied().collect();
        let mut rng = self.session_rng();

        for _ in 0..num_visits {
            if self.stop_requested() {
                break;
            }
            let user_id = user_ids[rng.gen_range(0..user_ids.len())];
            let result = self.simulate_user_session(user_id).await;
            self.apply_session_result(result);

            tokio::time::sleep(Duration::from_secs_f64(rng.gen_range(0.1..1.0))).await;
        }

        self.finish();
    }

    /// The per-visit body: generate, classify against the cache, persist.
    /// Never touches the statistics directly; the caller applies the result
    /// so an abandoned session cannot count late.
    async fn simulate_user_session(self: &Arc<Self>, user_id: u32) -> SessionResult {
        if self.stop_requested() {
            return SessionResult::Skipped;
        }
        let Some(profile) = self.profiles.get(&user_id) else {
            return SessionResult::Skipped;
        };

        let mut rng = self.session_rng();
        let candidate = simulator::generate_visit(profile, &self.catalog, &mut rng);

        let blocked = self.cache.is_blocked(candidate.site).await;
        let outcome = if blocked {
            VisitOutcome::Blocked
        } else {
            VisitOutcome::Allowed
        };

        let event = VisitEvent {
            user_id,
            site: candidate.site.to_string(),
            outcome,
            user_agent: candidate.user_agent.to_string(),
            source_addr: candidate.source_addr,
            timestamp: chrono::Utc::now().timestamp(),
        };

        match self.store.record_visit(&event).await {
            Ok(()) => {
                let action = if blocked { "blocked from" } else { "visited" };
                info!("User {} {} {}", user_id, action, event.site);
                SessionResult::Completed(outcome)
            }
            Err(e) => {
                error!(
                    "Failed to log visit for user {} to {}: {}",
                    user_id, event.site, e
                );
                SessionResult::Failed
            }
        }
    }

    fn apply_session_result(&self, result: SessionResult) {
        match result {
            SessionResult::Completed(VisitOutcome::Allowed) => self.stats.record_allowed(),
            SessionResult::Completed(VisitOutcome::Blocked) => self.stats.record_blocked(),
            SessionResult::Failed => self.stats.record_error(),
            SessionResult::Skipped => {}
        }
    }

    /// Transition to `Stopped` and emit the final report. Idempotent; the
    /// report is written only by the transition that gets there first.
    fn finish(&self) {
        let prev = self.state.swap(AgentState::Stopped as u8, Ordering::AcqRel);
        if prev == AgentState::Stopped as u8 {
            return;
        }
        info!("Simulation completed");
        self.stats.report();

        match stats::write_final_report(self.stats.snapshot(), &self.config) {
            Ok(path) => info!("Final statistics saved to {}", path.display()),
            Err(e) => error!("Failed to save statistics: {}", e),
        }
    }
}
