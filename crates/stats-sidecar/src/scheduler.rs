//! Polling loop: probe, extract, publish on a fixed interval.
//!
//! One task, one pass at a time. Each iteration waits on three sources:
//! the shutdown flag, the tick timer and the heartbeat timer. Shutdown is
//! polled first so it wins over a pending tick, and it is re-checked at the
//! top of every iteration, so a signal that lands during a pass stops the
//! loop as soon as that pass returns. No stage failure ends the loop; the
//! next tick is the retry.

use crate::config::{Identity, ScheduleSettings};
use crate::extract::extract;
use crate::publisher::Publisher;
use crate::types::{CycleOutcome, CycleStats};
use status_probe::StatusProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

/// Shortest timer period accepted; a zero period makes the timer panic
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Drives the telemetry pipeline until shutdown
pub struct Scheduler {
    identity: Identity,
    settings: ScheduleSettings,
    probe: Arc<dyn StatusProbe>,
    publisher: Arc<dyn Publisher>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    /// Create a new scheduler.
    ///
    /// Periods below [`MIN_PERIOD`] are raised to it.
    pub fn new(
        identity: Identity,
        mut settings: ScheduleSettings,
        probe: Arc<dyn StatusProbe>,
        publisher: Arc<dyn Publisher>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        if settings.interval < MIN_PERIOD {
            warn!("Tick interval {:?} too short, using {:?}", settings.interval, MIN_PERIOD);
            settings.interval = MIN_PERIOD;
        }
        if settings.heartbeat < MIN_PERIOD {
            warn!("Heartbeat {:?} too short, using {:?}", settings.heartbeat, MIN_PERIOD);
            settings.heartbeat = MIN_PERIOD;
        }

        Self {
            identity,
            settings,
            probe,
            publisher,
            shutdown,
        }
    }

    /// Run until the shutdown flag is set; returns the run's statistics.
    pub async fn run(mut self) -> CycleStats {
        info!(
            target_addr = %self.identity.target(),
            interval_ms = self.settings.interval.as_millis(),
            "Scheduler started"
        );

        let mut stats = CycleStats::default();

        // First pass one full period after start
        let period = self.settings.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let heartbeat_period = self.settings.heartbeat;
        let mut heartbeat = interval_at(Instant::now() + heartbeat_period, heartbeat_period);

        loop {
            if *self.shutdown.borrow() {
                info!("Termination requested, stopping scheduler");
                break;
            }

            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        warn!("Shutdown channel closed, stopping scheduler");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let outcome = self.run_cycle().await;
                    stats.update(&outcome);
                    log_outcome(&outcome, &stats);
                }

                _ = heartbeat.tick() => {
                    debug!(cycles = stats.total_cycles, "waiting...");
                }
            }
        }

        drop(ticker);

        info!(
            cycles = stats.total_cycles,
            published = stats.published,
            probe_failures = stats.probe_failures,
            encoding_failures = stats.encoding_failures,
            publish_failures = stats.publish_failures,
            "Scheduler stopped"
        );
        stats
    }

    /// Run one pipeline pass.
    ///
    /// Stops at the first failing stage; a failed probe or status
    /// encoding means no publish is attempted.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let status = match self
            .probe
            .probe(&self.identity.host, self.identity.port)
            .await
        {
            Ok(status) => status,
            Err(e) => return CycleOutcome::ProbeFailed(e),
        };

        match serde_json::to_string(&status) {
            Ok(json) => info!("Server status {}", json),
            Err(e) => return CycleOutcome::StatusEncodingFailed(e),
        }

        let record = extract(&self.identity, &status);

        match self.publisher.publish(&self.identity, &record).await {
            Ok(result) => CycleOutcome::Published(result),
            Err(e) => CycleOutcome::PublishFailed(e),
        }
    }
}

fn log_outcome(outcome: &CycleOutcome, stats: &CycleStats) {
    let stage = outcome.failed_stage().unwrap_or("none");
    match outcome {
        CycleOutcome::Published(result) => {
            debug!(status = result.status, cycles = stats.total_cycles, "Cycle complete");
        }
        CycleOutcome::ProbeFailed(e) => {
            error!(
                stage,
                error = %e,
                consecutive = stats.consecutive_failures,
                "Error while checking server status"
            );
        }
        CycleOutcome::StatusEncodingFailed(e) => {
            error!(
                stage,
                error = %e,
                consecutive = stats.consecutive_failures,
                "Error while encoding server status"
            );
        }
        CycleOutcome::PublishFailed(e) => {
            error!(
                stage,
                error = %e,
                consecutive = stats.consecutive_failures,
                "Error while publishing stats"
            );
        }
    }
}
