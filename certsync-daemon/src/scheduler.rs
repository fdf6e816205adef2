//! Interval + jitter loop driving repeated sync invocations.
//!
//! The loop has two states. **Running**: one job is in flight and is never
//! interrupted. **Idle**: waiting out the interval, then a random jitter.
//! Shutdown requests are only observed while idle, so a signal that arrives
//! mid-run takes effect once that run completes.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::time::Instant;

use certsync_core::DaemonConfig;
use certsync_engine::{SyncError, SyncReport};

/// Counters for one scheduler lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub runs: u64,
    pub failures: u64,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    jitter: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    pub fn new(interval: Duration, jitter: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        Self {
            interval,
            jitter,
            shutdown_tx,
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(config.interval(), config.jitter())
    }

    /// Sender that stops the loop at its next idle point.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run `job` immediately, then again after every interval (plus jitter)
    /// until shutdown. A failed job is logged and the loop carries on.
    pub async fn run<F, Fut>(&self, mut job: F) -> RunStats
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<SyncReport, SyncError>>,
    {
        // Subscribe before the first run so a request sent during it is kept.
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut stats = RunStats::default();
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            jitter_secs = self.jitter.as_secs(),
            "scheduler started"
        );

        loop {
            let started = Instant::now();
            let result = job().await;
            let duration_ms = started.elapsed().as_millis() as u64;
            stats.runs += 1;
            match result {
                Ok(report) => log_report(&report, duration_ms),
                Err(err) => {
                    stats.failures += 1;
                    tracing::error!(error = %err, duration_ms, "sync run failed");
                }
            }

            if idle(&mut shutdown_rx, self.interval).await {
                break;
            }
            let jitter = self.jitter_delay();
            if !jitter.is_zero() && idle(&mut shutdown_rx, jitter).await {
                break;
            }
        }

        tracing::info!(
            runs = stats.runs,
            failures = stats.failures,
            "scheduler stopped"
        );
        stats
    }

    /// Uniform in `[0, jitter)` at millisecond resolution; zero when no
    /// jitter is configured.
    fn jitter_delay(&self) -> Duration {
        let ceiling = self.jitter.as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..ceiling))
    }
}

/// Sleep for `delay`. Returns true when shutdown was requested first.
async fn idle(shutdown_rx: &mut broadcast::Receiver<()>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_rx.recv() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

fn log_report(report: &SyncReport, duration_ms: u64) {
    tracing::info!(
        mode = %report.mode,
        dry_run = report.dry_run,
        transferred = report.transferred(),
        unchanged = report.unchanged(),
        skipped = report.skipped(),
        manifest_published = report.manifest_published,
        duration_ms,
        "sync run finished"
    );
}
