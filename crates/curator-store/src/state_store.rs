//! Key-value store for persistent application state.
//!
//! Stores string key-value pairs in SQLite. Used to persist per-category
//! sync cursors, the serialized task queue, and workflow definitions —
//! state that must survive a full restart of the owning process.
//!
//! Compound values (the task list, the workflow list) are read and replaced
//! as whole JSON documents under a single key; the store offers no
//! partial-record transactions on them.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

/// Persistent key-value store over the `app_state` table.
#[derive(Clone)]
pub struct StateStore {
    db: Database,
}

impl StateStore {
    /// Create a new state store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a value by key, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    "SELECT value FROM app_state WHERE key = ?1",
                    rusqlite::params![key],
                    |row| row.get(0),
                );
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
    }

    /// Set a value for a key (insert or update).
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO app_state (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![key, value],
                )?;
                debug!(key = %key, "app state updated");
                Ok(())
            })
            .await
    }

    /// Delete a key, returning `true` if it existed.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let key = key.to_string();
        self.db
            .execute(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM app_state WHERE key = ?1",
                    rusqlite::params![key],
                )?;
                Ok(deleted > 0)
            })
            .await
    }

    /// Get a value deserialized from JSON, returning `None` if absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Set a value serialized as JSON.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw).await
    }
}

// ── tests ────────────────────────────────────────────────────────────
