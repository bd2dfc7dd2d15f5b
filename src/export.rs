use chrono::{DateTime, Local};
use serde::Serialize;

use crate::models::{AchievementState, SessionStats};
use crate::settings::{Settings, SettingsStore};
use crate::stats::archived_days;
use crate::storage::{load_json, KeyValueStore, ACHIEVEMENTS_KEY, STATS_KEY};

/// Read-only snapshot of everything the user has accumulated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: DateTime<Local>,
    pub date_range: String,
    pub stats: SessionStats,
    pub achievements: AchievementState,
    pub settings: Settings,
    pub archived_days: Vec<SessionStats>,
}

/// Never writes to `store`. A stale day record is rolled over in the
/// returned document only.
pub fn build_export(store: &dyn KeyValueStore, now: DateTime<Local>) -> ExportDocument {
    let today = now.date_naive();
    let mut archived = archived_days(store);
    let stats = match load_json::<SessionStats>(store, STATS_KEY) {
        Some(stats) if stats.date == today => stats,
        Some(stale) => {
            if stale.total_session_seconds > 0 || !stale.logs.is_empty() {
                archived.retain(|day| day.date != stale.date);
                archived.push(stale);
                archived.sort_by_key(|day| day.date);
            }
            SessionStats::new(today)
        }
        None => SessionStats::new(today),
    };
    let mut achievements =
        load_json::<AchievementState>(store, ACHIEVEMENTS_KEY).unwrap_or_default();
    achievements.fill_missing();
    let settings = SettingsStore::load(store).get().clone();

    let date_range = match archived.first() {
        Some(oldest) => format!(
            "{} to {}",
            oldest.date.format("%Y-%m-%d"),
            stats.date.format("%Y-%m-%d")
        ),
        None => format!("Today ({})", stats.date.format("%Y-%m-%d")),
    };

    ExportDocument {
        exported_at: now,
        date_range,
        stats,
        achievements,
        settings,
        archived_days: archived,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{archived_stats_key, save_json, MemoryStore};
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn export_bundles_current_and_archived_days() {
        let store = MemoryStore::new();
        let now = Local.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        let mut old = SessionStats::new(earlier);
        old.good_seconds = 300;
        save_json(&store, &archived_stats_key(earlier), &old).unwrap();

        let doc = build_export(&store, now);
        assert_eq!(doc.date_range, "2026-10-12 to 2026-10-15");
        assert_eq!(doc.archived_days.len(), 1);
        assert_eq!(doc.settings, Settings::default());

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("exportedAt").is_some());
        assert_eq!(json["stats"]["date"], "2026-10-15");
    }

    #[test]
    fn stale_record_is_rolled_over_without_writing() {
        let store = MemoryStore::new();
        let now = Local.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let mut stale = SessionStats::new(yesterday);
        stale.good_seconds = 42;
        stale.total_session_seconds = 42;
        save_json(&store, STATS_KEY, &stale).unwrap();

        let doc = build_export(&store, now);
        assert_eq!(doc.stats, SessionStats::new(now.date_naive()));
        assert_eq!(doc.archived_days, vec![stale.clone()]);
        assert_eq!(doc.date_range, "2026-10-14 to 2026-10-15");

        let persisted: SessionStats = load_json(&store, STATS_KEY).unwrap();
        assert_eq!(persisted, stale);
        assert!(archived_days(&store).is_empty());
    }

    #[test]
    fn empty_store_exports_today_only() {
        let store = MemoryStore::new();
        let now = Local.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        let doc = build_export(&store, now);
        assert_eq!(doc.date_range, "Today (2026-10-15)");
        assert_eq!(doc.achievements.iter().count(), 6);
    }
}
