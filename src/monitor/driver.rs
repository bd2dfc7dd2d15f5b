use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::sensing::{CycleOutcome, FrameSource, PoseEstimator};
use crate::utils::{Clock, ManualClock};

use super::PostureMonitor;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Scheduling opportunities are polled this often; the display interval
/// throttles the actual work.
pub const POLL_INTERVAL_MS: u64 = 16;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub ticks: u64,
    pub fresh_inferences: u64,
    pub scored_cycles: u64,
    pub missed_inferences: u64,
    pub reminders: u64,
    pub unlocked: Vec<String>,
}

impl RunSummary {
    fn absorb(&mut self, report: &super::TickReport) {
        self.ticks += 1;
        match report.outcome {
            CycleOutcome::Fresh { .. } => self.fresh_inferences += 1,
            CycleOutcome::Missed => self.missed_inferences += 1,
            _ => {}
        }
        if report.result.is_some() {
            self.scored_cycles += 1;
        }
        if report.reminded {
            self.reminders += 1;
        }
        self.unlocked
            .extend(report.unlocked.iter().map(|id| id.title().to_string()));
    }
}

/// Drives a started monitor from `clock` until it goes idle or `cancel`
/// fires. A tick still waiting on the estimator when `cancel` fires runs to
/// completion, but its pose is discarded.
pub async fn run_live<S: FrameSource, E: PoseEstimator>(
    monitor: &mut PostureMonitor<S, E>,
    clock: &dyn Clock,
    cancel: CancellationToken,
) -> RunSummary {
    let mut ticker = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let stop = monitor.stop_handle();
    let mut summary = RunSummary::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                monitor.stop(clock.now());
                log_info!("live loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                let report = {
                    let tick = monitor.tick(clock.now());
                    tokio::pin!(tick);
                    tokio::select! {
                        biased;
                        report = &mut tick => report,
                        _ = cancel.cancelled() => {
                            stop.stop();
                            tick.await
                        }
                    }
                };
                summary.absorb(&report);
                if cancel.is_cancelled() {
                    monitor.stop(clock.now());
                    log_info!("live loop cancelled");
                    break;
                }
                if !monitor.is_running() {
                    log_info!("monitor went idle after {} ticks", summary.ticks);
                    break;
                }
            }
        }
    }

    summary
}

/// Steps a started monitor through recorded input on a hand-driven clock.
/// With `realtime`, each step also waits `step_ms` of wall time.
pub async fn run_replay<S: FrameSource, E: PoseEstimator>(
    monitor: &mut PostureMonitor<S, E>,
    clock: &ManualClock,
    step_ms: u64,
    realtime: bool,
) -> RunSummary {
    let step_ms = step_ms.max(1);
    let step = i64::try_from(step_ms).unwrap_or(i64::MAX);
    let mut summary = RunSummary::default();

    while monitor.is_running() {
        let now: DateTime<Local> = clock.advance_ms(step);
        let report = monitor.tick(now).await;
        summary.absorb(&report);
        if realtime {
            tokio::time::sleep(Duration::from_millis(step_ms)).await;
        }
    }

    summary
}
