use chrono::{DateTime, Local};
use serde::Serialize;

use crate::utils::clock::elapsed_ms;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: &'static str,
    pub duration_secs: u64,
}

pub const EXERCISES: [Exercise; 6] = [
    Exercise {
        name: "neck rolls",
        duration_secs: 30,
    },
    Exercise {
        name: "shoulder shrugs",
        duration_secs: 30,
    },
    Exercise {
        name: "spinal twist",
        duration_secs: 30,
    },
    Exercise {
        name: "chin tucks",
        duration_secs: 30,
    },
    Exercise {
        name: "deep breathing",
        duration_secs: 30,
    },
    Exercise {
        name: "wrist curls",
        duration_secs: 30,
    },
];

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BreakState {
    pub status: TimerStatus,
    pub exercise: Option<Exercise>,
    pub target_ms: u64,
    pub started_at: Option<DateTime<Local>>,
    /// Set when the break leaves `Running`.
    pub active_ms: u64,
}

impl BreakState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_active_ms(&self, now: DateTime<Local>) -> u64 {
        match (self.status, self.started_at) {
            (TimerStatus::Running, Some(started)) => elapsed_ms(started, now).unwrap_or(0),
            _ => self.active_ms,
        }
    }

    pub fn remaining_ms(&self, now: DateTime<Local>) -> u64 {
        match self.status {
            TimerStatus::Idle | TimerStatus::Stopped => 0,
            TimerStatus::Running => self.target_ms.saturating_sub(self.current_active_ms(now)),
        }
    }

    pub fn begin(&mut self, exercise: Exercise, now: DateTime<Local>) {
        *self = Self {
            status: TimerStatus::Running,
            exercise: Some(exercise),
            target_ms: exercise.duration_secs.saturating_mul(1000),
            started_at: Some(now),
            active_ms: 0,
        };
    }

    pub fn stop(&mut self, now: DateTime<Local>) {
        self.active_ms = self.current_active_ms(now).min(self.target_ms);
        self.status = TimerStatus::Stopped;
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }
}
