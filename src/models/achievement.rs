use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AchievementId {
    FirstSession,
    EarlyBird,
    PerfectPosture,
    BreakMaster,
    StreakMaster,
    WellnessChampion,
}

impl AchievementId {
    pub const ALL: [AchievementId; 6] = [
        AchievementId::FirstSession,
        AchievementId::EarlyBird,
        AchievementId::PerfectPosture,
        AchievementId::BreakMaster,
        AchievementId::StreakMaster,
        AchievementId::WellnessChampion,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            AchievementId::FirstSession => "First Steps",
            AchievementId::EarlyBird => "Early Bird",
            AchievementId::PerfectPosture => "Perfect Posture",
            AchievementId::BreakMaster => "Break Master",
            AchievementId::StreakMaster => "Streak Master",
            AchievementId::WellnessChampion => "Wellness Champion",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AchievementId::FirstSession => "Completed your first monitoring session",
            AchievementId::EarlyBird => "Started monitoring before 8 AM",
            AchievementId::PerfectPosture => "Held an excellent average over 100 readings",
            AchievementId::BreakMaster => "Completed 10 exercise breaks",
            AchievementId::StreakMaster => "Kept good posture for 80% of a day's tracked time",
            AchievementId::WellnessChampion => "Monitored your posture 7 days in a row",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AchievementRecord {
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub progress: u32,
}

/// Persisted achievement ledger. Unlocks are one-way and progress never
/// decreases; the mutators below are the only way in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AchievementState {
    #[serde(default)]
    achievements: BTreeMap<AchievementId, AchievementRecord>,
    #[serde(default)]
    pub first_use: Option<NaiveDate>,
    #[serde(default)]
    pub last_active_day: Option<NaiveDate>,
    #[serde(default)]
    pub day_streak: u32,
}

impl AchievementState {
    pub fn new() -> Self {
        let mut state = Self::default();
        state.fill_missing();
        state
    }

    /// Adds default records for achievements absent from a stored ledger.
    pub fn fill_missing(&mut self) {
        for id in AchievementId::ALL {
            self.achievements.entry(id).or_default();
        }
    }

    pub fn record(&self, id: AchievementId) -> AchievementRecord {
        self.achievements.get(&id).cloned().unwrap_or_default()
    }

    pub fn is_unlocked(&self, id: AchievementId) -> bool {
        self.achievements.get(&id).is_some_and(|r| r.unlocked)
    }

    pub fn progress(&self, id: AchievementId) -> u32 {
        self.achievements.get(&id).map_or(0, |r| r.progress)
    }

    /// Returns true only for the transition from locked to unlocked.
    pub fn unlock(&mut self, id: AchievementId, at: DateTime<Utc>) -> bool {
        let record = self.achievements.entry(id).or_default();
        if record.unlocked {
            return false;
        }
        record.unlocked = true;
        record.unlocked_at = Some(at);
        true
    }

    /// Raises progress to `value`; lower values are ignored.
    pub fn raise_progress(&mut self, id: AchievementId, value: u32) -> bool {
        let record = self.achievements.entry(id).or_default();
        if value > record.progress {
            record.progress = value;
            true
        } else {
            false
        }
    }

    pub fn unlocked_count(&self) -> usize {
        self.achievements.values().filter(|r| r.unlocked).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AchievementId, &AchievementRecord)> {
        self.achievements.iter()
    }
}
