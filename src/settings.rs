use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::scoring::ScoringPreset;
use crate::storage::{load_json, save_json, KeyValueStore, SETTINGS_KEY};

pub const MIN_TARGET_FPS: u32 = 1;
pub const MAX_TARGET_FPS: u32 = 60;
pub const MIN_SENSITIVITY: f64 = 0.5;
pub const MAX_SENSITIVITY: f64 = 2.0;
pub const MAX_REMINDER_COOLDOWN_SECS: u64 = 24 * 60 * 60;
pub const MAX_BREAK_INTERVAL_MINUTES: u64 = 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum ModelType {
    #[default]
    ResNet50,
    MobileNetV1,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub reminder_cooldown_secs: u64,
    pub sound_enabled: bool,
    pub auto_break: bool,
    pub break_interval_minutes: u64,
    pub sensitivity: f64,
    /// Scores at or above this count as good seconds.
    pub good_posture_threshold: u8,
    /// Scores below this arm the poor-posture reminder.
    pub reminder_threshold: u8,
    pub target_fps: u32,
    pub inference_interval_ms: u64,
    pub adaptive_mode: bool,
    pub scoring_preset: ScoringPreset,
    pub model_type: ModelType,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reminder_cooldown_secs: 30,
            sound_enabled: true,
            auto_break: true,
            break_interval_minutes: 32,
            sensitivity: 1.0,
            good_posture_threshold: 60,
            reminder_threshold: 55,
            target_fps: 15,
            inference_interval_ms: 500,
            adaptive_mode: true,
            scoring_preset: ScoringPreset::Classic,
            model_type: ModelType::ResNet50,
        }
    }
}

impl Settings {
    /// Clamps every field into its valid range.
    pub fn normalized(mut self) -> Self {
        self.reminder_cooldown_secs = self
            .reminder_cooldown_secs
            .clamp(1, MAX_REMINDER_COOLDOWN_SECS);
        self.break_interval_minutes = self
            .break_interval_minutes
            .clamp(1, MAX_BREAK_INTERVAL_MINUTES);
        self.sensitivity = if self.sensitivity.is_finite() {
            self.sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
        } else {
            Settings::default().sensitivity
        };
        self.good_posture_threshold = self.good_posture_threshold.min(100);
        self.reminder_threshold = self.reminder_threshold.min(100);
        self.target_fps = self.target_fps.clamp(MIN_TARGET_FPS, MAX_TARGET_FPS);
        self
    }

    pub fn display_interval_ms(&self) -> u64 {
        1000 / u64::from(self.target_fps.max(MIN_TARGET_FPS))
    }

    pub fn break_interval_ms(&self) -> u64 {
        self.break_interval_minutes.saturating_mul(60_000)
    }
}

pub struct SettingsStore {
    data: Settings,
}

impl SettingsStore {
    /// Missing or malformed persisted settings fall back to defaults.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let data = load_json::<Settings>(store, SETTINGS_KEY)
            .unwrap_or_default()
            .normalized();
        Self { data }
    }

    pub fn get(&self) -> &Settings {
        &self.data
    }

    pub fn update(&mut self, store: &dyn KeyValueStore, settings: Settings) -> Result<()> {
        self.data = settings.normalized();
        save_json(store, SETTINGS_KEY, &self.data)
    }

    pub fn reset(&mut self, store: &dyn KeyValueStore) -> Result<()> {
        self.update(store, Settings::default())
    }
}
