use chrono::{DateTime, Duration, Local};

use crate::settings::{Settings, MAX_REMINDER_COOLDOWN_SECS};

pub const REMINDER_TITLE: &str = "Posture Reminder";
pub const REMINDER_BODY: &str = "Poor posture detected - try adjusting your position";

/// Rate-limits poor-posture reminders to one per cooldown window.
#[derive(Debug, Default)]
pub struct ReminderGate {
    cooldown_until: Option<DateTime<Local>>,
}

impl ReminderGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `score` should trigger a reminder now. Arms the cooldown.
    pub fn check(&mut self, score: u8, now: DateTime<Local>, settings: &Settings) -> bool {
        if score >= settings.reminder_threshold {
            return false;
        }
        if self.cooldown_until.is_some_and(|until| now <= until) {
            return false;
        }
        let cooldown_secs = settings.reminder_cooldown_secs.min(MAX_REMINDER_COOLDOWN_SECS) as i64;
        self.cooldown_until = Some(now + Duration::seconds(cooldown_secs));
        true
    }

    pub fn reset(&mut self) {
        self.cooldown_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cooldown_limits_reminders() {
        let settings = Settings::default();
        let t0 = Local.with_ymd_and_hms(2026, 10, 15, 9, 0, 0).unwrap();
        let mut gate = ReminderGate::new();

        assert!(!gate.check(55, t0, &settings));
        assert!(gate.check(54, t0, &settings));
        assert!(!gate.check(30, t0 + Duration::seconds(30), &settings));
        assert!(gate.check(30, t0 + Duration::milliseconds(30_001), &settings));

        gate.reset();
        assert!(gate.check(30, t0 + Duration::seconds(31), &settings));
    }
}
