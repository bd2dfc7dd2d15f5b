use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_LOG_ENTRIES: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Per-day posture ledger. Counters only grow within a day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub date: NaiveDate,
    #[serde(default)]
    pub good_seconds: u64,
    #[serde(default)]
    pub poor_seconds: u64,
    #[serde(default)]
    pub total_session_seconds: u64,
    /// Newest first.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl SessionStats {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            good_seconds: 0,
            poor_seconds: 0,
            total_session_seconds: 0,
            logs: Vec::new(),
        }
    }

    pub fn tracked_seconds(&self) -> u64 {
        self.good_seconds + self.poor_seconds
    }

    /// Share of tracked seconds spent in good posture, if anything was tracked.
    pub fn good_ratio(&self) -> Option<f64> {
        let tracked = self.tracked_seconds();
        if tracked == 0 {
            None
        } else {
            Some(self.good_seconds as f64 / tracked as f64)
        }
    }

    /// Returns false for blank messages, which are never recorded.
    pub fn push_log(&mut self, timestamp: DateTime<Utc>, message: &str) -> bool {
        let message = message.trim();
        if message.is_empty() {
            return false;
        }
        self.logs.insert(
            0,
            LogEntry {
                timestamp,
                message: message.to_string(),
            },
        );
        self.logs.truncate(MAX_LOG_ENTRIES);
        true
    }
}

/// "12m 5s" / "42s", as shown in the daily summary.
pub fn format_duration(seconds: u64) -> String {
    let mins = seconds / 60;
    let secs = seconds % 60;
    if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    #[test]
    fn logs_are_newest_first_and_capped() {
        let mut stats = SessionStats::new(day());
        for i in 0..(MAX_LOG_ENTRIES + 5) {
            stats.push_log(Utc::now(), &format!("entry {i}"));
        }
        assert_eq!(stats.logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(stats.logs[0].message, format!("entry {}", MAX_LOG_ENTRIES + 4));
    }

    #[test]
    fn blank_messages_are_dropped() {
        let mut stats = SessionStats::new(day());
        assert!(!stats.push_log(Utc::now(), "   "));
        assert!(stats.push_log(Utc::now(), "  started  "));
        assert_eq!(stats.logs[0].message, "started");
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(725), "12m 5s");
    }

    #[test]
    fn partial_record_fills_missing_counters() {
        let stats: SessionStats = serde_json::from_str(r#"{"date":"2026-10-15","goodSeconds":4}"#).unwrap();
        assert_eq!(stats.good_seconds, 4);
        assert_eq!(stats.poor_seconds, 0);
        assert!(stats.logs.is_empty());
    }
}
