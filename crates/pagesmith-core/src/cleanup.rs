//! Background expiry sweeper for asset sessions.
//!
//! One tokio task ticks on a fixed interval and removes sessions whose
//! TTL has passed. Sweeps are single-flight: a tick that arrives while
//! the previous sweep is still running is dropped, never queued.

use crate::config::CleanupConfig;
use crate::session::SessionStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters accumulated across sweeps.
#[derive(Debug, Default)]
pub struct CleanupCounters {
    runs: AtomicU64,
    deleted: AtomicU64,
    skipped_locked: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time snapshot of the sweep counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSnapshot {
    /// Completed sweep passes.
    pub runs: u64,
    /// Sessions removed.
    pub deleted: u64,
    /// Expired sessions left alone because they were locked.
    pub skipped_locked: u64,
    /// Deletions that failed.
    pub errors: u64,
}

impl CleanupCounters {
    fn snapshot(&self) -> CleanupSnapshot {
        CleanupSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
            skipped_locked: self.skipped_locked.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Periodic session sweeper.
pub struct CleanupScheduler {
    store: Arc<SessionStore>,
    config: CleanupConfig,
    sweeping: Arc<AtomicBool>,
    counters: Arc<CleanupCounters>,
    handle: Option<JoinHandle<()>>,
    stop: Arc<tokio::sync::Notify>,
}

impl CleanupScheduler {
    /// Creates a scheduler; no task runs until [`start`](Self::start).
    #[must_use]
    pub fn new(store: Arc<SessionStore>, config: CleanupConfig) -> Self {
        Self {
            store,
            config,
            sweeping: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(CleanupCounters::default()),
            handle: None,
            stop: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Spawns the ticking task. Calling twice replaces nothing; the second
    /// call is a no-op.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let store = Arc::clone(&self.store);
        let sweeping = Arc::clone(&self.sweeping);
        let counters = Arc::clone(&self.counters);
        let stop = Arc::clone(&self.stop);
        let period = Duration::from_secs(self.config.interval_secs.max(1));

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // Consume the immediate first tick; the first sweep happens
            // one full period after start.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_sweep(&store, &sweeping, &counters).await;
                    },
                    () = stop.notified() => {
                        debug!("cleanup scheduler stopping");
                        break;
                    },
                }
            }
        }));
    }

    /// Runs one sweep immediately on the caller's task, honoring the
    /// single-flight guard.
    pub async fn sweep_now(&self) {
        run_sweep(&self.store, &self.sweeping, &self.counters).await;
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> CleanupSnapshot {
        self.counters.snapshot()
    }

    /// Signals the task to stop and waits for any in-flight sweep, up to
    /// the configured grace period. After the grace expires the task is
    /// aborted.
    pub async fn shutdown(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        self.stop.notify_one();

        let grace = Duration::from_secs(self.config.shutdown_grace_secs);
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(_) => info!("cleanup scheduler stopped"),
            Err(_) => {
                warn!("cleanup sweep exceeded shutdown grace; aborting");
                handle.abort();
            },
        }
    }
}

async fn run_sweep(store: &Arc<SessionStore>, sweeping: &AtomicBool, counters: &CleanupCounters) {
    // Single-flight: a tick landing mid-sweep is dropped.
    if sweeping
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("cleanup sweep already running; skipping tick");
        return;
    }

    let store = Arc::clone(store);
    let outcome = tokio::task::spawn_blocking(move || sweep_once(&store)).await;

    match outcome {
        Ok(stats) => {
            counters.runs.fetch_add(1, Ordering::Relaxed);
            counters.deleted.fetch_add(stats.deleted, Ordering::Relaxed);
            counters
                .skipped_locked
                .fetch_add(stats.skipped_locked, Ordering::Relaxed);
            counters.errors.fetch_add(stats.errors, Ordering::Relaxed);
            if stats.deleted > 0 || stats.errors > 0 {
                info!(
                    deleted = stats.deleted,
                    skipped_locked = stats.skipped_locked,
                    errors = stats.errors,
                    "cleanup sweep finished"
                );
            }
        },
        Err(e) => {
            counters.errors.fetch_add(1, Ordering::Relaxed);
            warn!("cleanup sweep task failed: {e}");
        },
    }

    sweeping.store(false, Ordering::Release);
}

#[derive(Debug, Default)]
struct SweepStats {
    deleted: u64,
    skipped_locked: u64,
    errors: u64,
}

fn sweep_once(store: &SessionStore) -> SweepStats {
    let mut stats = SweepStats::default();

    for session_id in store.expired_sessions() {
        match store.delete_session(session_id) {
            Ok(true) => stats.deleted += 1,
            Ok(false) => stats.skipped_locked += 1,
            Err(e) => {
                warn!(session = %session_id, "failed to delete expired session: {e}");
                stats.errors += 1;
            },
        }
    }

    stats
}
