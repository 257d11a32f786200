//! Search history and saved searches, persisted in settings.db
//!
//! History is the collaborator that consumes delivered results' requests
//! after a run; it never feeds back into the engine. Entries rotate at 100,
//! saved searches live until the user removes them.

use crate::error::MaktabaError;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Auto-saved entries kept before rotation
const HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub domain: String,
    pub query_data: String,
    pub display_label: String,
    pub partition_count: i64,
    pub created_at: String,
    pub is_saved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSearchEntry {
    pub id: i64,
    pub history_id: Option<i64>,
    pub domain: String,
    pub query_data: String,
    pub display_label: String,
    pub partition_count: i64,
    pub created_at: String,
}

pub struct HistoryStore {
    db_path: PathBuf,
}

impl HistoryStore {
    /// Open (and if needed initialize) the settings database
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, MaktabaError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MaktabaError::Database(format!("failed to create data directory: {}", e))
            })?;
        }

        let store = Self { db_path };
        let conn = store.connection()?;
        conn.execute_batch(
            r#"
            -- Search history (auto-saved, rotates at 100 entries)
            CREATE TABLE IF NOT EXISTS search_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL,
                query_data TEXT NOT NULL,
                display_label TEXT NOT NULL,
                partition_count INTEGER DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Saved searches (user explicitly saved, never auto-deleted)
            CREATE TABLE IF NOT EXISTS saved_searches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                history_id INTEGER,
                domain TEXT NOT NULL,
                query_data TEXT NOT NULL,
                display_label TEXT NOT NULL,
                partition_count INTEGER DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(query_data)
            );

            -- App settings (key-value store)
            CREATE TABLE IF NOT EXISTS app_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_search_history_created
            ON search_history(created_at DESC);

            CREATE INDEX IF NOT EXISTS idx_saved_searches_created
            ON saved_searches(created_at DESC);
            "#,
        )
        .map_err(|e| MaktabaError::Database(e.to_string()))?;

        Ok(store)
    }

    fn connection(&self) -> Result<Connection, MaktabaError> {
        Connection::open(&self.db_path)
            .map_err(|e| MaktabaError::Database(format!("unable to open database file: {}", e)))
    }

    pub fn add_to_history(
        &self,
        domain: &str,
        query_data: &str,
        display_label: &str,
        partition_count: i64,
    ) -> Result<i64, MaktabaError> {
        let conn = self.connection()?;
        let now = chrono::Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO search_history (domain, query_data, display_label, partition_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![domain, query_data, display_label, partition_count, now],
        )
        .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();

        // Rotate history - keep only the most recent entries
        conn.execute(
            "DELETE FROM search_history WHERE id NOT IN (
                SELECT id FROM search_history ORDER BY created_at DESC, id DESC LIMIT ?1
            )",
            [HISTORY_LIMIT],
        )
        .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        Ok(id)
    }

    pub fn history(&self, limit: Option<i64>) -> Result<Vec<SearchHistoryEntry>, MaktabaError> {
        let conn = self.connection()?;
        let limit = limit.unwrap_or(HISTORY_LIMIT);

        let mut stmt = conn
            .prepare(
                "SELECT h.id, h.domain, h.query_data, h.display_label, h.partition_count, h.created_at,
                        CASE WHEN s.id IS NOT NULL THEN 1 ELSE 0 END as is_saved
                 FROM search_history h
                 LEFT JOIN saved_searches s ON h.query_data = s.query_data
                 ORDER BY h.created_at DESC, h.id DESC
                 LIMIT ?1",
            )
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        let entries = stmt
            .query_map([limit], |row: &Row| {
                Ok(SearchHistoryEntry {
                    id: row.get(0)?,
                    domain: row.get(1)?,
                    query_data: row.get(2)?,
                    display_label: row.get(3)?,
                    partition_count: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
                    created_at: row.get(5)?,
                    is_saved: row.get::<_, i64>(6)? == 1,
                })
            })
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        Ok(entries)
    }

    pub fn clear_history(&self) -> Result<(), MaktabaError> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM search_history", [])
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn save_search(
        &self,
        history_id: Option<i64>,
        domain: &str,
        query_data: &str,
        display_label: &str,
        partition_count: i64,
    ) -> Result<i64, MaktabaError> {
        let conn = self.connection()?;
        let now = chrono::Utc::now().to_rfc3339();

        // INSERT OR IGNORE keeps the earliest save for a given query
        conn.execute(
            "INSERT OR IGNORE INTO saved_searches (history_id, domain, query_data, display_label, partition_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![history_id, domain, query_data, display_label, partition_count, now],
        )
        .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        let id: i64 = conn
            .query_row(
                "SELECT id FROM saved_searches WHERE query_data = ?1",
                [query_data],
                |row| row.get(0),
            )
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        Ok(id)
    }

    pub fn unsave_search(&self, id: i64) -> Result<(), MaktabaError> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM saved_searches WHERE id = ?1", [id])
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn unsave_search_by_query(&self, query_data: &str) -> Result<(), MaktabaError> {
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM saved_searches WHERE query_data = ?1",
            [query_data],
        )
        .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn is_search_saved(&self, query_data: &str) -> Result<bool, MaktabaError> {
        let conn = self.connection()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM saved_searches WHERE query_data = ?1",
                [query_data],
                |row| row.get(0),
            )
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub fn saved_searches(&self, limit: Option<i64>) -> Result<Vec<SavedSearchEntry>, MaktabaError> {
        let conn = self.connection()?;
        let limit = limit.unwrap_or(HISTORY_LIMIT);

        let mut stmt = conn
            .prepare(
                "SELECT id, history_id, domain, query_data, display_label, partition_count, created_at
                 FROM saved_searches
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1",
            )
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        let entries = stmt
            .query_map([limit], |row: &Row| {
                Ok(SavedSearchEntry {
                    id: row.get(0)?,
                    history_id: row.get(1)?,
                    domain: row.get(2)?,
                    query_data: row.get(3)?,
                    display_label: row.get(4)?,
                    partition_count: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                    created_at: row.get(6)?,
                })
            })
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e: rusqlite::Error| MaktabaError::Database(e.to_string()))?;

        Ok(entries)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, MaktabaError> {
        let conn = self.connection()?;
        let result: Option<String> = conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| MaktabaError::Database(e.to_string()))?;
        Ok(result)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), MaktabaError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value) VALUES (?1, ?2)",
            rusqlite::params![key, value],
        )
        .map_err(|e| MaktabaError::Database(e.to_string()))?;
        Ok(())
    }
}
