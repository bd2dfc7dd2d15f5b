//! Achievement rules and the tracker that applies their results.
//!
//! [`evaluate`] is pure: it reads a snapshot of session state and returns
//! the updates that should happen. [`AchievementTracker`] owns the
//! persisted ledger, applies updates one-way, and notifies once per unlock.

use chrono::{DateTime, Local, NaiveDate, Timelike, Utc};

use crate::models::{AchievementId, AchievementState, PoseHistory, SessionStats};
use crate::notify::Notifier;
use crate::storage::{load_json, persist_quietly, KeyValueStore, ACHIEVEMENTS_KEY};

const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const EARLY_BIRD_CUTOFF_HOUR: u32 = 8;
pub const PERFECT_POSTURE_WINDOW: usize = 100;
pub const PERFECT_POSTURE_AVERAGE: f64 = 90.0;
pub const BREAK_MASTER_TARGET: u32 = 10;
pub const STREAK_RATIO: f64 = 0.8;
pub const STREAK_MIN_TRACKED_SECS: u64 = 600;
pub const WELLNESS_DAY_TARGET: u32 = 7;
pub const WELLNESS_PROGRESS_CAP: u32 = 30;

/// Everything the rules look at.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub now: DateTime<Local>,
    pub session_active: bool,
    pub session_started_at: Option<DateTime<Local>>,
    pub stats: &'a SessionStats,
    pub history: &'a PoseHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementUpdate {
    Progress { id: AchievementId, value: u32 },
    Unlock { id: AchievementId },
}

/// Rules for every achievement not yet unlocked. Already-unlocked entries
/// are skipped, so applying the result can never re-lock anything.
pub fn evaluate(state: &AchievementState, ctx: &EvaluationContext<'_>) -> Vec<AchievementUpdate> {
    let mut updates = Vec::new();

    for id in AchievementId::ALL {
        if state.is_unlocked(id) {
            continue;
        }

        let unlocked = match id {
            AchievementId::FirstSession => ctx.session_active,
            AchievementId::EarlyBird => ctx
                .session_started_at
                .is_some_and(|started| started.hour() < EARLY_BIRD_CUTOFF_HOUR),
            AchievementId::PerfectPosture => ctx
                .history
                .trailing_average(PERFECT_POSTURE_WINDOW)
                .is_some_and(|avg| avg > PERFECT_POSTURE_AVERAGE),
            AchievementId::BreakMaster => state.progress(id) >= BREAK_MASTER_TARGET,
            AchievementId::StreakMaster => {
                ctx.stats.tracked_seconds() >= STREAK_MIN_TRACKED_SECS
                    && ctx.stats.good_ratio().is_some_and(|r| r > STREAK_RATIO)
            }
            AchievementId::WellnessChampion => {
                let days = state.day_streak.min(WELLNESS_PROGRESS_CAP);
                if days > state.progress(id) {
                    updates.push(AchievementUpdate::Progress { id, value: days });
                }
                days >= WELLNESS_DAY_TARGET
            }
        };

        if unlocked {
            updates.push(AchievementUpdate::Unlock { id });
        }
    }

    updates
}

pub struct AchievementTracker {
    state: AchievementState,
}

impl AchievementTracker {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut state = load_json::<AchievementState>(store, ACHIEVEMENTS_KEY).unwrap_or_default();
        state.fill_missing();
        Self { state }
    }

    pub fn state(&self) -> &AchievementState {
        &self.state
    }

    /// Records activity on `today` and maintains the consecutive-day streak.
    pub fn mark_active_day(&mut self, store: &dyn KeyValueStore, today: NaiveDate) {
        if self.state.last_active_day == Some(today) {
            return;
        }

        let continues = self
            .state
            .last_active_day
            .and_then(|last| last.succ_opt())
            .is_some_and(|next| next == today);
        self.state.day_streak = if continues {
            self.state.day_streak.saturating_add(1)
        } else {
            1
        };
        self.state.last_active_day = Some(today);
        if self.state.first_use.is_none() {
            self.state.first_use = Some(today);
        }
        persist_quietly(store, ACHIEVEMENTS_KEY, &self.state);
    }

    /// Counts one completed break toward break-master.
    pub fn record_break(&mut self, store: &dyn KeyValueStore) {
        let next = self
            .state
            .progress(AchievementId::BreakMaster)
            .saturating_add(1);
        if self.state.raise_progress(AchievementId::BreakMaster, next) {
            persist_quietly(store, ACHIEVEMENTS_KEY, &self.state);
        }
    }

    /// Evaluates the rules, applies the results and returns newly unlocked
    /// achievements.
    pub fn evaluate_and_apply(
        &mut self,
        store: &dyn KeyValueStore,
        notifier: &dyn Notifier,
        ctx: &EvaluationContext<'_>,
    ) -> Vec<AchievementId> {
        let updates = evaluate(&self.state, ctx);
        self.apply(store, notifier, &updates, ctx.now.with_timezone(&Utc))
    }

    pub fn apply(
        &mut self,
        store: &dyn KeyValueStore,
        notifier: &dyn Notifier,
        updates: &[AchievementUpdate],
        at: DateTime<Utc>,
    ) -> Vec<AchievementId> {
        let mut changed = false;
        let mut unlocked = Vec::new();

        for update in updates {
            match *update {
                AchievementUpdate::Progress { id, value } => {
                    changed |= self.state.raise_progress(id, value);
                }
                AchievementUpdate::Unlock { id } => {
                    if self.state.unlock(id, at) {
                        changed = true;
                        unlocked.push(id);
                    }
                }
            }
        }

        if changed {
            persist_quietly(store, ACHIEVEMENTS_KEY, &self.state);
        }

        for id in &unlocked {
            log_info!("achievement unlocked: {}", id.title());
            notifier.notify(
                "Achievement Unlocked!",
                &format!("{}: {}", id.title(), id.description()),
            );
        }

        unlocked
    }
}
