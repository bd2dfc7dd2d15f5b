use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{error, info};
use rusqlite::{params, Connection, OptionalExtension};

mod migrations;

use migrations::run_migrations;

use crate::storage::KeyValueStore;

/// SQLite-backed key-value store. The monitor runs on one logical thread,
/// so the connection is owned directly rather than through a worker.
pub struct Database {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(&db_path).context("failed to open SQLite database")?;
        let database = Self::initialize(conn, Some(db_path))?;

        if let Some(path) = database.path() {
            info!("Database initialized at {}", path.display());
        }
        Ok(database)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::initialize(conn, None)
    }

    fn initialize(mut conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        if db_path.is_some() {
            if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                error!("Failed to enable WAL mode: {err}");
            }
        }

        run_migrations(&mut conn).context("failed to run database migrations")?;

        Ok(Self { conn, db_path })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

impl KeyValueStore for Database {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("failed to load {key}"))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to save {key}"))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .with_context(|| format!("failed to remove {key}"))?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM kv_store
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key ASC",
        )?;

        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_value() {
        let db = Database::open_in_memory().unwrap();
        db.save("postureSettings", r#"{"targetFps":10}"#).unwrap();
        db.save("postureSettings", r#"{"targetFps":20}"#).unwrap();
        assert_eq!(
            db.load("postureSettings").unwrap().as_deref(),
            Some(r#"{"targetFps":20}"#)
        );
    }

    #[test]
    fn remove_and_prefix_listing() {
        let db = Database::open_in_memory().unwrap();
        db.save("postureStats", "{}").unwrap();
        db.save("postureStats:2026-10-13", "{}").unwrap();
        db.save("postureStats:2026-10-14", "{}").unwrap();
        db.remove("postureStats:2026-10-13").unwrap();
        assert_eq!(
            db.keys_with_prefix("postureStats:").unwrap(),
            vec!["postureStats:2026-10-14".to_string()]
        );
        assert_eq!(db.load("missing").unwrap(), None);
    }

    #[test]
    fn reopens_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("posturewatch.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.save("postureBaseline", "[]").unwrap();
        }
        let db = Database::new(path).unwrap();
        assert_eq!(db.load("postureBaseline").unwrap().as_deref(), Some("[]"));
    }
}
