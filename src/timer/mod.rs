mod state;

pub use state::{BreakState, Exercise, TimerStatus, EXERCISES};

use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::settings::Settings;
use crate::utils::clock::elapsed_ms;

const ENABLE_LOGS: bool = true;

use crate::log_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakEnd {
    /// Countdown ran out.
    Completed,
    CompletedManually,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakOutcome {
    pub exercise: Exercise,
    pub end: BreakEnd,
}

impl BreakOutcome {
    pub fn counts_as_completed(&self) -> bool {
        matches!(self.end, BreakEnd::Completed | BreakEnd::CompletedManually)
    }

    pub fn log_message(&self) -> String {
        match self.end {
            BreakEnd::Completed => format!("Break completed: {}", self.exercise.name),
            BreakEnd::CompletedManually => {
                format!("Break completed (manual): {}", self.exercise.name)
            }
            BreakEnd::Skipped => format!("Break skipped: {}", self.exercise.name),
            BreakEnd::Cancelled => "Break cancelled".to_string(),
        }
    }
}

/// Break countdown plus the periodic "time for a break" suggestion.
#[derive(Debug, Default)]
pub struct BreakTimer {
    state: BreakState,
    /// Start of the current work stretch; suggestions fire relative to it.
    work_anchor: Option<DateTime<Local>>,
}

impl BreakTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &BreakState {
        &self.state
    }

    pub fn in_break(&self) -> bool {
        self.state.status == TimerStatus::Running
    }

    /// Picks a random exercise and starts its countdown. Restarting while a
    /// break runs replaces it.
    pub fn start_break<R: Rng + ?Sized>(&mut self, now: DateTime<Local>, rng: &mut R) -> Exercise {
        let exercise = *EXERCISES.choose(rng).unwrap_or(&EXERCISES[0]);
        self.state.begin(exercise, now);
        log_info!(
            "break started: {} ({}s)",
            exercise.name,
            exercise.duration_secs
        );
        exercise
    }

    /// Finishes the break once its countdown has run out.
    pub fn tick(&mut self, now: DateTime<Local>) -> Option<BreakOutcome> {
        if self.in_break() && self.state.remaining_ms(now) == 0 {
            return self.finish(now, BreakEnd::Completed);
        }
        None
    }

    pub fn complete_break(&mut self, now: DateTime<Local>) -> Option<BreakOutcome> {
        self.finish(now, BreakEnd::CompletedManually)
    }

    pub fn skip_break(&mut self, now: DateTime<Local>) -> Option<BreakOutcome> {
        self.finish(now, BreakEnd::Skipped)
    }

    pub fn cancel_break(&mut self, now: DateTime<Local>) -> Option<BreakOutcome> {
        self.finish(now, BreakEnd::Cancelled)
    }

    fn finish(&mut self, now: DateTime<Local>, end: BreakEnd) -> Option<BreakOutcome> {
        if !self.in_break() {
            return None;
        }
        let exercise = self.state.exercise?;
        match end {
            BreakEnd::Cancelled => self.state.cancel(),
            _ => self.state.stop(now),
        }
        self.work_anchor = Some(now);
        Some(BreakOutcome { exercise, end })
    }

    /// Starts counting toward the next suggestion.
    pub fn arm(&mut self, now: DateTime<Local>) {
        self.work_anchor = Some(now);
    }

    pub fn disarm(&mut self) {
        self.work_anchor = None;
    }

    /// True once per `break_interval_minutes` of work while auto-break is
    /// on and no break is running.
    pub fn suggestion_due(&mut self, now: DateTime<Local>, settings: &Settings) -> bool {
        if !settings.auto_break || self.in_break() {
            return false;
        }
        let Some(anchor) = self.work_anchor else {
            return false;
        };

        match elapsed_ms(anchor, now) {
            Some(elapsed) if elapsed >= settings.break_interval_ms() => {
                self.work_anchor = Some(now);
                true
            }
            Some(_) => false,
            None => {
                self.work_anchor = Some(now);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn countdown_completes_break() {
        let mut timer = BreakTimer::new();
        let mut rng = StdRng::seed_from_u64(7);
        let exercise = timer.start_break(t0(), &mut rng);
        assert!(EXERCISES.contains(&exercise));
        assert!(timer.in_break());

        assert_eq!(timer.tick(t0() + Duration::seconds(29)), None);
        let outcome = timer.tick(t0() + Duration::seconds(30)).unwrap();
        assert_eq!(outcome.end, BreakEnd::Completed);
        assert!(outcome.counts_as_completed());
        assert_eq!(
            outcome.log_message(),
            format!("Break completed: {}", exercise.name)
        );
        assert!(!timer.in_break());
        assert_eq!(timer.tick(t0() + Duration::seconds(31)), None);
    }

    #[test]
    fn skip_and_cancel_do_not_count() {
        let mut timer = BreakTimer::new();
        let mut rng = StdRng::seed_from_u64(1);
        timer.start_break(t0(), &mut rng);
        let skipped = timer.skip_break(t0() + Duration::seconds(3)).unwrap();
        assert!(!skipped.counts_as_completed());
        assert!(skipped.log_message().starts_with("Break skipped: "));
        assert_eq!(timer.state().status, TimerStatus::Stopped);
        assert_eq!(timer.state().active_ms, 3_000);

        timer.start_break(t0(), &mut rng);
        let cancelled = timer.cancel_break(t0()).unwrap();
        assert_eq!(cancelled.log_message(), "Break cancelled");
        assert_eq!(timer.state().status, TimerStatus::Idle);
        assert_eq!(timer.state().exercise, None);
        assert_eq!(timer.cancel_break(t0()), None);
    }

    #[test]
    fn suggestions_follow_break_interval() {
        let settings = Settings {
            break_interval_minutes: 1,
            ..Settings::default()
        };
        let mut timer = BreakTimer::new();
        assert!(!timer.suggestion_due(t0(), &settings));

        timer.arm(t0());
        assert!(!timer.suggestion_due(t0() + Duration::seconds(59), &settings));
        assert!(timer.suggestion_due(t0() + Duration::seconds(60), &settings));
        assert!(!timer.suggestion_due(t0() + Duration::seconds(61), &settings));

        let disabled = Settings {
            auto_break: false,
            ..settings
        };
        assert!(!timer.suggestion_due(t0() + Duration::seconds(600), &disabled));
    }
}
