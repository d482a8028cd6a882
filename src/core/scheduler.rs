//! Cron-driven tick loop.
//!
//! Expressions have six fields with a leading seconds field
//! (`sec min hour dom month dow`) and an optional trailing year, and are
//! evaluated in the local time zone. A tick that comes due while the
//! previous run is still active is skipped, not queued.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Local};
use cron::Schedule;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::runner::Job;
use crate::{config::crawler::CrawlerConfig, error::Error};

/// Outcome of [`Scheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Runs started.
    pub runs: u64,
    /// Ticks dropped because a run was still active.
    pub skipped: u64,
    /// Runs that returned an error or panicked.
    pub failures: u64,
}

/// Clears the busy flag when a run ends, including by panic.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Awaits a finished run task and counts a panic as a failure.
async fn reap(handle: JoinHandle<()>, failures: &AtomicU64) {
    if let Err(e) = handle.await {
        failures.fetch_add(1, Ordering::Relaxed);
        error!("Run task aborted: {}", e);
    }
}

pub struct Scheduler {
    schedule: Schedule,
    tick_limit: Option<u64>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// # Errors
    ///
    /// [`Error::Configuration`] if `expression` is not a valid cron expression.
    pub fn new(expression: &str) -> Result<Self, Error> {
        let schedule = Schedule::from_str(expression).map_err(|e| {
            Error::Configuration(format!("Invalid cron expression '{expression}': {e}"))
        })?;
        Ok(Self {
            schedule,
            tick_limit: None,
            cancel: CancellationToken::new(),
        })
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, Error> {
        Ok(Self::new(&config.schedule)?.with_tick_limit(config.tick_limit))
    }

    pub fn with_tick_limit(mut self, limit: Option<u64>) -> Self {
        self.tick_limit = limit;
        self
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn limit_reached(&self, runs: u64) -> bool {
        self.tick_limit.is_some_and(|limit| runs >= limit)
    }

    fn next_fire(&self, last: Option<DateTime<Local>>) -> Option<DateTime<Local>> {
        let now = Local::now();
        let from = match last {
            Some(last) if last > now => last,
            _ => now,
        };
        self.schedule.after(&from).next()
    }

    /// Fires `job` on every tick until the tick limit is reached, the
    /// schedule is exhausted or the token is cancelled. The run in flight at
    /// that point is awaited before returning.
    pub async fn run(&self, job: Arc<dyn Job>) -> SchedulerReport {
        let busy = Arc::new(AtomicBool::new(false));
        let failures = Arc::new(AtomicU64::new(0));
        let mut report = SchedulerReport::default();
        let mut in_flight: Option<JoinHandle<()>> = None;
        let mut last_fire = None;

        info!(
            "Scheduler started (tick limit: {})",
            self.tick_limit
                .map_or_else(|| "none".to_string(), |l| l.to_string())
        );

        loop {
            if self.limit_reached(report.runs) {
                info!("Tick limit of {} reached", report.runs);
                break;
            }

            let Some(next) = self.next_fire(last_fire) else {
                warn!("Schedule has no upcoming fire time");
                break;
            };
            let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
            debug!("Next tick at {} (in {:?})", next, wait);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Scheduler cancelled");
                    break;
                }
                _ = sleep(wait) => {}
            }
            last_fire = Some(next);

            if busy.swap(true, Ordering::AcqRel) {
                report.skipped += 1;
                warn!("Previous run still active, skipping tick at {}", next);
                continue;
            }

            report.runs += 1;
            let guard = RunGuard(busy.clone());
            let job = job.clone();
            let run_failures = failures.clone();
            let run = report.runs;
            let handle = tokio::spawn(async move {
                let _guard = guard;
                match job.run().await {
                    Ok(()) => debug!("Run {} finished", run),
                    Err(e) => {
                        run_failures.fetch_add(1, Ordering::Relaxed);
                        error!("Run {} failed: {}", run, e);
                    }
                }
            });
            // The busy flag was clear, so the previous run is already over.
            if let Some(previous) = in_flight.replace(handle) {
                reap(previous, &failures).await;
            }
        }

        if let Some(handle) = in_flight.take() {
            reap(handle, &failures).await;
        }

        report.failures = failures.load(Ordering::Relaxed);
        info!(
            "Scheduler stopped: {} runs, {} skipped, {} failed",
            report.runs, report.skipped, report.failures
        );
        report
    }
}
