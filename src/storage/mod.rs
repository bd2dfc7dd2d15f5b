//! Key-value persistence for the JSON blobs the monitor keeps between runs.

use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub const STATS_KEY: &str = "postureStats";
pub const SETTINGS_KEY: &str = "postureSettings";
pub const ACHIEVEMENTS_KEY: &str = "postureAchievements";
pub const BASELINE_KEY: &str = "postureBaseline";

/// Archived day records live under `postureStats:<YYYY-MM-DD>`.
pub fn archived_stats_key(date: chrono::NaiveDate) -> String {
    format!("{STATS_KEY}:{}", date.format("%Y-%m-%d"))
}

pub trait KeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// Keys starting with `prefix`, sorted ascending.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Reads and decodes `key`. Missing, unreadable or malformed entries all
/// come back as `None` so callers can fall back to defaults.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            log_warn!("failed to read {key}: {err:#}");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log_debug!("ignoring malformed {key}: {err}");
            None
        }
    }
}

pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let serialized =
        serde_json::to_string(value).with_context(|| format!("failed to serialize {key}"))?;
    store
        .save(key, &serialized)
        .with_context(|| format!("failed to persist {key}"))
}

/// Persists and swallows the error after logging it. Used on the per-cycle
/// path where a failed write must not stop monitoring.
pub fn persist_quietly<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    if let Err(err) = save_json(store, key, value) {
        log_warn!("{err:#}");
    }
}

/// In-process store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .borrow()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn round_trips_through_memory_store() {
        let store = MemoryStore::new();
        save_json(&store, "k", &Sample { value: 7 }).unwrap();
        assert_eq!(load_json::<Sample>(&store, "k"), Some(Sample { value: 7 }));
    }

    #[test]
    fn malformed_entries_read_as_missing() {
        let store = MemoryStore::new();
        store.save("k", "{not json").unwrap();
        assert_eq!(load_json::<Sample>(&store, "k"), None);
        assert_eq!(load_json::<Sample>(&store, "absent"), None);
    }

    #[test]
    fn prefix_listing_is_sorted() {
        let store = MemoryStore::new();
        store.save("postureStats:2026-10-14", "{}").unwrap();
        store.save("postureStats:2026-10-12", "{}").unwrap();
        store.save("postureSettings", "{}").unwrap();
        let keys = store.keys_with_prefix("postureStats:").unwrap();
        assert_eq!(keys, vec!["postureStats:2026-10-12", "postureStats:2026-10-14"]);
    }
}
