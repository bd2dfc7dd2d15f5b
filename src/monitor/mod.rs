//! Session context for one monitoring run.
//!
//! [`PostureMonitor`] owns the persisted state (settings, daily stats,
//! achievements, baseline) separately from the ephemeral scheduling state
//! (scheduler anchors, cached pose, history, cooldowns) and exposes a single
//! [`PostureMonitor::tick`] entry point driven by an external clock.

pub mod alerts;
pub mod driver;

pub use alerts::ReminderGate;
pub use driver::{run_live, run_replay, RunSummary, POLL_INTERVAL_MS};

use std::rc::Rc;

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::achievements::{AchievementTracker, EvaluationContext};
use crate::models::{
    AchievementId, AchievementState, HistoryEntry, Pose, PoseHistory, ScoreResult, SessionStats,
};
use crate::notify::Notifier;
use crate::performance::{PerformanceMonitor, PerformanceSnapshot};
use crate::scoring::{score_pose, ScoringConfig};
use crate::sensing::{
    CaptureError, CycleOutcome, DetectionScheduler, FrameSource, PoseEstimator, StopHandle,
};
use crate::settings::{Settings, SettingsStore};
use crate::stats::SessionAggregator;
use crate::storage::{load_json, persist_quietly, KeyValueStore, BASELINE_KEY};
use crate::timer::{BreakOutcome, BreakTimer, Exercise};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Local>,
}

/// What one call to [`PostureMonitor::tick`] produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: CycleOutcome,
    pub result: Option<ScoreResult>,
    pub credited_secs: u64,
    pub unlocked: Vec<AchievementId>,
    pub reminded: bool,
    pub break_finished: Option<BreakOutcome>,
    pub break_suggested: bool,
}

impl TickReport {
    fn new(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            result: None,
            credited_secs: 0,
            unlocked: Vec::new(),
            reminded: false,
            break_finished: None,
            break_suggested: false,
        }
    }
}

pub struct PostureMonitor<S, E> {
    store: Rc<dyn KeyValueStore>,
    notifier: Rc<dyn Notifier>,

    settings: SettingsStore,
    aggregator: SessionAggregator,
    achievements: AchievementTracker,
    baseline: Option<Pose>,

    scheduler: DetectionScheduler<S, E>,
    performance: PerformanceMonitor,
    scoring: ScoringConfig,
    /// Display cadence in effect; may sit below the saved target after an
    /// adaptive adjustment.
    effective_fps: u32,
    history: PoseHistory,
    reminders: ReminderGate,
    breaks: BreakTimer,
    session: Option<SessionInfo>,
    last_result: Option<ScoreResult>,
}

impl<S: FrameSource, E: PoseEstimator> PostureMonitor<S, E> {
    pub fn new(
        store: Rc<dyn KeyValueStore>,
        notifier: Rc<dyn Notifier>,
        source: S,
        estimator: E,
        now: DateTime<Local>,
    ) -> Self {
        let settings = SettingsStore::load(store.as_ref());
        let aggregator = SessionAggregator::load(store.as_ref(), now.date_naive());
        let achievements = AchievementTracker::load(store.as_ref());
        let baseline = load_json::<Pose>(store.as_ref(), BASELINE_KEY);

        let current = settings.get().clone();
        let scheduler = DetectionScheduler::new(
            source,
            estimator,
            current.display_interval_ms(),
            current.inference_interval_ms,
        );

        Self {
            store,
            notifier,
            settings,
            aggregator,
            achievements,
            baseline,
            scheduler,
            performance: PerformanceMonitor::new(),
            scoring: scoring_config(&current),
            effective_fps: current.target_fps,
            history: PoseHistory::default(),
            reminders: ReminderGate::new(),
            breaks: BreakTimer::new(),
            session: None,
            last_result: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    pub fn stats(&self) -> &SessionStats {
        self.aggregator.stats()
    }

    pub fn achievements(&self) -> &AchievementState {
        self.achievements.state()
    }

    pub fn history(&self) -> &PoseHistory {
        &self.history
    }

    pub fn baseline(&self) -> Option<&Pose> {
        self.baseline.as_ref()
    }

    pub fn last_result(&self) -> Option<&ScoreResult> {
        self.last_result.as_ref()
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some() && self.scheduler.is_running()
    }

    pub fn effective_fps(&self) -> u32 {
        self.effective_fps
    }

    pub fn display_interval_ms(&self) -> u64 {
        self.scheduler.display_interval_ms()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    pub fn performance_snapshot(&mut self) -> PerformanceSnapshot {
        self.performance.snapshot()
    }

    pub fn breaks(&self) -> &BreakTimer {
        &self.breaks
    }

    fn log_activity(&mut self, now: DateTime<Local>, message: &str) {
        self.aggregator
            .log_activity(self.store.as_ref(), now.with_timezone(&Utc), message);
    }

    /// Opens the source and begins a session. Capture failures are logged,
    /// shown to the user and leave the monitor idle.
    pub fn start(&mut self, now: DateTime<Local>) -> Result<(), CaptureError> {
        if self.is_running() {
            return Ok(());
        }

        if let Err(err) = self.scheduler.start() {
            log_warn!("camera start failed: {err:?}");
            self.log_activity(now, &format!("Camera error: {err}"));
            self.notifier.notify(
                "Camera Error",
                &format!("{err}. Try selecting a different camera or refresh permissions."),
            );
            if err.suggests_default_device() {
                self.log_activity(now, "Attempting fallback to default camera...");
            }
            return Err(err);
        }

        let session = SessionInfo {
            id: Uuid::new_v4(),
            started_at: now,
        };
        log_info!("monitoring session {} started", session.id);
        self.session = Some(session);

        self.aggregator.ensure_day(self.store.as_ref(), now.date_naive());
        self.aggregator.begin(now);
        self.breaks.arm(now);
        self.reminders.reset();
        self.performance.reset();
        self.achievements
            .mark_active_day(self.store.as_ref(), now.date_naive());
        self.log_activity(now, "Posture monitoring started");

        self.evaluate_achievements(now);
        Ok(())
    }

    pub fn stop(&mut self, now: DateTime<Local>) {
        self.scheduler.stop();
        self.finish_session(now, "Posture monitoring stopped");
    }

    fn finish_session(&mut self, now: DateTime<Local>, message: &str) {
        let Some(session) = self.session.take() else {
            return;
        };
        log_info!("monitoring session {} ended", session.id);
        self.aggregator.end();
        self.breaks.disarm();
        self.log_activity(now, message);
    }

    /// One scheduling opportunity. Scoring, stats accounting and achievement
    /// evaluation for a pose always run in that order within the call.
    pub async fn tick(&mut self, now: DateTime<Local>) -> TickReport {
        let break_finished = self.breaks.tick(now);
        if let Some(outcome) = break_finished {
            self.handle_break_end(now, outcome);
        }

        let outcome = self.scheduler.tick(now, &mut self.performance).await;
        let mut report = TickReport::new(outcome);
        report.break_finished = break_finished;

        match report.outcome {
            CycleOutcome::SourceEnded => {
                self.finish_session(now, "Video source ended");
                return report;
            }
            CycleOutcome::Inactive | CycleOutcome::Discarded => {
                if self.session.is_some() && !self.scheduler.is_running() {
                    self.finish_session(now, "Posture monitoring stopped");
                }
                return report;
            }
            _ => {}
        }

        if let Some(pose) = report.outcome.pose().cloned() {
            let fresh = matches!(report.outcome, CycleOutcome::Fresh { .. });
            self.process_pose(now, pose, fresh, &mut report);
        }

        if self.breaks.suggestion_due(now, self.settings.get()) {
            self.notifier
                .notify("Break Time", "Time for a quick exercise break!");
            self.log_activity(now, "Break suggested");
            report.break_suggested = true;
        }

        report
    }

    fn process_pose(
        &mut self,
        now: DateTime<Local>,
        pose: Pose,
        fresh: bool,
        report: &mut TickReport,
    ) {
        let result = score_pose(&pose, &self.scoring);

        if fresh {
            self.history.push(HistoryEntry {
                recorded_at: now.with_timezone(&Utc),
                pose,
                score: result.score,
            });
        }

        let today = now.date_naive();
        if self.aggregator.ensure_day(self.store.as_ref(), today) {
            self.achievements.mark_active_day(self.store.as_ref(), today);
        }
        report.credited_secs = self.aggregator.record(
            self.store.as_ref(),
            result.score,
            self.settings.get().good_posture_threshold,
            now,
        );

        report.unlocked = self.evaluate_achievements(now);

        if self.reminders.check(result.score, now, self.settings.get()) {
            self.notifier
                .notify(alerts::REMINDER_TITLE, alerts::REMINDER_BODY);
            self.log_activity(now, &format!("Poor posture detected ({})", result.score));
            report.reminded = true;
        }

        self.performance.record_frame(now);
        if fresh {
            self.adapt_cadence(now);
        }

        self.last_result = Some(result.clone());
        report.result = Some(result);
    }

    fn adapt_cadence(&mut self, now: DateTime<Local>) {
        let adaptive = self.settings.get().adaptive_mode;
        if let Some(fps) = self.performance.adapt(adaptive, self.effective_fps) {
            self.effective_fps = fps;
            self.scheduler
                .set_display_interval_ms(1000 / u64::from(fps.max(1)));
            self.log_activity(now, &format!("Performance auto-adjusted to {fps} FPS"));
        }
    }

    fn evaluate_achievements(&mut self, now: DateTime<Local>) -> Vec<AchievementId> {
        let ctx = EvaluationContext {
            now,
            session_active: self.session.is_some(),
            session_started_at: self.session.as_ref().map(|s| s.started_at),
            stats: self.aggregator.stats(),
            history: &self.history,
        };
        let unlocked = self
            .achievements
            .evaluate_and_apply(self.store.as_ref(), self.notifier.as_ref(), &ctx);

        for id in &unlocked {
            self.aggregator.log_activity(
                self.store.as_ref(),
                now.with_timezone(&Utc),
                &format!("Achievement unlocked: {}", id.title()),
            );
        }
        unlocked
    }

    pub fn start_break<R: Rng + ?Sized>(&mut self, now: DateTime<Local>, rng: &mut R) -> Exercise {
        let exercise = self.breaks.start_break(now, rng);
        self.log_activity(now, &format!("Break started: {}", exercise.name));
        exercise
    }

    pub fn complete_break(&mut self, now: DateTime<Local>) -> Option<BreakOutcome> {
        let outcome = self.breaks.complete_break(now)?;
        self.handle_break_end(now, outcome);
        Some(outcome)
    }

    pub fn skip_break(&mut self, now: DateTime<Local>) -> Option<BreakOutcome> {
        let outcome = self.breaks.skip_break(now)?;
        self.handle_break_end(now, outcome);
        Some(outcome)
    }

    pub fn cancel_break(&mut self, now: DateTime<Local>) -> Option<BreakOutcome> {
        let outcome = self.breaks.cancel_break(now)?;
        self.handle_break_end(now, outcome);
        Some(outcome)
    }

    fn handle_break_end(&mut self, now: DateTime<Local>, outcome: BreakOutcome) {
        self.log_activity(now, &outcome.log_message());
        if outcome.counts_as_completed() {
            self.notifier
                .notify("Break Complete", "Great job taking a break!");
            self.achievements.record_break(self.store.as_ref());
            self.evaluate_achievements(now);
        }
    }

    /// Saves the newest scored pose as the baseline.
    pub fn calibrate(&mut self, now: DateTime<Local>) -> bool {
        let Some(latest) = self.history.latest().map(|entry| entry.pose.clone()) else {
            self.notifier.notify(
                "Calibration Failed",
                "No pose data available. Start monitoring first.",
            );
            return false;
        };
        self.save_baseline(now, latest);
        true
    }

    pub fn save_baseline(&mut self, now: DateTime<Local>, pose: Pose) {
        persist_quietly(self.store.as_ref(), BASELINE_KEY, &pose);
        self.baseline = Some(pose);
        self.log_activity(now, "Baseline posture calibrated");
        self.notifier.notify(
            "Calibration Complete",
            "Posture baseline saved. Your score will now be relative to this position.",
        );
    }

    pub fn clear_logs(&mut self) {
        self.aggregator.clear_logs(self.store.as_ref());
    }

    /// Persists new settings and applies them to the running session.
    pub fn update_settings(&mut self, settings: Settings) -> anyhow::Result<()> {
        self.settings.update(self.store.as_ref(), settings)?;
        self.apply_settings();
        Ok(())
    }

    pub fn reset_settings(&mut self) -> anyhow::Result<()> {
        self.settings.reset(self.store.as_ref())?;
        self.apply_settings();
        Ok(())
    }

    fn apply_settings(&mut self) {
        let current = self.settings.get();
        self.scoring = scoring_config(current);
        self.effective_fps = current.target_fps;
        self.scheduler
            .set_display_interval_ms(current.display_interval_ms());
        self.scheduler
            .set_inference_interval_ms(current.inference_interval_ms);
        self.performance.reset_adjustment();
    }

    /// Overrides both cadences without touching saved settings. Used by
    /// replays, where each recorded pose is one step.
    pub fn override_cadence(&mut self, display_interval_ms: u64, inference_interval_ms: u64) {
        self.scheduler.set_display_interval_ms(display_interval_ms);
        self.scheduler
            .set_inference_interval_ms(inference_interval_ms);
    }
}

fn scoring_config(settings: &Settings) -> ScoringConfig {
    ScoringConfig::for_preset(settings.scoring_preset).with_sensitivity(settings.sensitivity)
}
