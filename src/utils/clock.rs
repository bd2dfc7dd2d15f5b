use std::cell::Cell;

use chrono::{DateTime, Duration, Local, NaiveDate};

/// Source of "now" for everything that reasons about cadence or calendar days.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Hand-driven clock for replays and tests. Single-threaded by design of the
/// monitor loop, so a `Cell` is enough.
#[derive(Debug)]
pub struct ManualClock {
    current: Cell<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Cell::new(start),
        }
    }

    pub fn advance_ms(&self, ms: i64) -> DateTime<Local> {
        let next = self.current.get() + Duration::milliseconds(ms);
        self.current.set(next);
        next
    }

    pub fn set(&self, at: DateTime<Local>) {
        self.current.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.current.get()
    }
}

/// Milliseconds from `earlier` to `later`, or `None` when the clock stepped
/// backwards.
pub fn elapsed_ms(earlier: DateTime<Local>, later: DateTime<Local>) -> Option<u64> {
    let delta = (later - earlier).num_milliseconds();
    u64::try_from(delta).ok()
}
