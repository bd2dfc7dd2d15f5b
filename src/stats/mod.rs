use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::models::SessionStats;
use crate::storage::{archived_stats_key, load_json, persist_quietly, KeyValueStore, STATS_KEY};
use crate::utils::clock::elapsed_ms;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Most seconds credited by a single accounting tick. Longer gaps (host
/// sleep, debugger) only count this much.
pub const MAX_CATCH_UP_SECS: u64 = 5;

/// Daily good/poor ledger fed once per elapsed second of scoring.
pub struct SessionAggregator {
    stats: SessionStats,
    anchor: Option<DateTime<Local>>,
}

impl SessionAggregator {
    /// Resumes today's record or rolls a stale one over.
    pub fn load(store: &dyn KeyValueStore, today: NaiveDate) -> Self {
        let stats = load_json::<SessionStats>(store, STATS_KEY)
            .unwrap_or_else(|| SessionStats::new(today));
        let mut aggregator = Self {
            stats,
            anchor: None,
        };
        aggregator.ensure_day(store, today);
        aggregator
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Archives and resets the record when `today` differs from its date.
    /// Returns true when a rollover happened.
    pub fn ensure_day(&mut self, store: &dyn KeyValueStore, today: NaiveDate) -> bool {
        if self.stats.date == today {
            return false;
        }

        let previous = std::mem::replace(&mut self.stats, SessionStats::new(today));
        if previous.total_session_seconds > 0 || !previous.logs.is_empty() {
            persist_quietly(store, &archived_stats_key(previous.date), &previous);
        }
        log_info!("new day {}: archived stats for {}", today, previous.date);
        persist_quietly(store, STATS_KEY, &self.stats);
        true
    }

    /// Starts the per-second accounting clock.
    pub fn begin(&mut self, now: DateTime<Local>) {
        self.anchor = Some(now);
    }

    pub fn end(&mut self) {
        self.anchor = None;
    }

    /// Credits every whole second since the last accounting tick to the good
    /// or poor counter. Returns the number of seconds credited.
    pub fn record(
        &mut self,
        store: &dyn KeyValueStore,
        score: u8,
        good_threshold: u8,
        now: DateTime<Local>,
    ) -> u64 {
        self.ensure_day(store, now.date_naive());

        let Some(anchor) = self.anchor else {
            self.anchor = Some(now);
            return 0;
        };
        let Some(elapsed) = elapsed_ms(anchor, now) else {
            self.anchor = Some(now);
            return 0;
        };

        let whole_secs = elapsed / 1000;
        if whole_secs == 0 {
            return 0;
        }

        self.anchor = Some(anchor + Duration::milliseconds((whole_secs * 1000) as i64));
        let credited = whole_secs.min(MAX_CATCH_UP_SECS);
        if credited < whole_secs {
            log_debug!("{}s gap, crediting {}s", whole_secs, credited);
        }

        if score >= good_threshold {
            self.stats.good_seconds += credited;
        } else {
            self.stats.poor_seconds += credited;
        }
        self.stats.total_session_seconds += credited;

        persist_quietly(store, STATS_KEY, &self.stats);
        credited
    }

    /// Appends to the user-facing activity log and persists.
    pub fn log_activity(&mut self, store: &dyn KeyValueStore, at: DateTime<Utc>, message: &str) {
        if self.stats.push_log(at, message) {
            persist_quietly(store, STATS_KEY, &self.stats);
        }
    }

    pub fn clear_logs(&mut self, store: &dyn KeyValueStore) {
        self.stats.logs.clear();
        persist_quietly(store, STATS_KEY, &self.stats);
    }
}

/// Archived day records, oldest first.
pub fn archived_days(store: &dyn KeyValueStore) -> Vec<SessionStats> {
    let prefix = format!("{STATS_KEY}:");
    match store.keys_with_prefix(&prefix) {
        Ok(keys) => keys
            .iter()
            .filter_map(|key| load_json::<SessionStats>(store, key))
            .collect(),
        Err(err) => {
            log_warn!("failed to list archived stats: {err:#}");
            Vec::new()
        }
    }
}
