//! Replicated content records.
//!
//! A [`Record`] is the locally persisted copy of one remote content item
//! (post, bookmark, ...). Identity is the composite `(owner_id, remote_id)`,
//! materialized as `id = "<owner_id>:<remote_id>"` so a single-column key
//! works everywhere. Upserts are idempotent: re-fetching the same remote id
//! overwrites the stored row, never duplicates it.
//!
//! The sync driver and the action executor are the only writers. Each write
//! is a single statement, so concurrent writers interleave at record
//! granularity (last-writer-wins per id).

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A locally replicated remote content item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Composite key: `"<owner_id>:<remote_id>"`.
    pub id: String,
    /// The account this copy belongs to.
    pub owner_id: String,
    /// The remote service's id for the item.
    pub remote_id: String,
    /// Handle of the item's author.
    pub author_handle: String,
    /// Full text content.
    pub full_text: String,
    /// Optional user-assigned folder.
    pub folder: Option<String>,
    /// Sync category that produced this record (posts, bookmarks, ...).
    pub category: Option<String>,
    /// Fetched conversation thread, if the item was unrolled.
    pub conversations: Option<serde_json::Value>,
    /// Media descriptors (variants, types) as returned by the remote API.
    pub media: Option<serde_json::Value>,
    /// Opaque ordering key from the remote timeline.
    pub sort_index: String,
    /// Unix timestamp the item was created remotely.
    pub created_at: i64,
    /// Unix timestamp this copy was last fetched.
    pub fetched_at: i64,
}

impl Record {
    /// Build the composite id for an `(owner_id, remote_id)` pair.
    pub fn composite_id(owner_id: &str, remote_id: &str) -> String {
        format!("{owner_id}:{remote_id}")
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  RecordStore
// ═══════════════════════════════════════════════════════════════════════

/// CRUD operations on replicated records.
#[derive(Clone)]
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    /// Create a new record store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or overwrite records, idempotently by id.
    ///
    /// Each record is written with a single `INSERT ... ON CONFLICT DO
    /// UPDATE`, all inside one transaction, so a batch is applied atomically
    /// and a re-fetch of the same remote id never duplicates.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn upsert(&self, records: Vec<Record>) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        self.db
            .execute_mut(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO records (id, owner_id, remote_id, author_handle, full_text, \
                         folder, category, conversations, media, sort_index, created_at, fetched_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                         ON CONFLICT(id) DO UPDATE SET \
                             author_handle = excluded.author_handle, \
                             full_text = excluded.full_text, \
                             folder = excluded.folder, \
                             category = excluded.category, \
                             conversations = excluded.conversations, \
                             media = excluded.media, \
                             sort_index = excluded.sort_index, \
                             fetched_at = excluded.fetched_at",
                    )?;
                    for record in &records {
                        let conversations = record
                            .conversations
                            .as_ref()
                            .map(serde_json::to_string)
                            .transpose()?;
                        let media = record.media.as_ref().map(serde_json::to_string).transpose()?;
                        stmt.execute(rusqlite::params![
                            record.id,
                            record.owner_id,
                            record.remote_id,
                            record.author_handle,
                            record.full_text,
                            record.folder,
                            record.category,
                            conversations,
                            media,
                            record.sort_index,
                            record.created_at,
                            record.fetched_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        debug!("records upserted");
        Ok(())
    }

    /// Fetch a single record by composite id, returning `None` if not found.
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<Record>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    &format!("{SELECT_RECORD} WHERE id = ?1"),
                    rusqlite::params![id],
                    row_to_raw,
                );
                match result {
                    Ok(raw) => raw.into_record().map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Delete a record by composite id, returning the removed record or
    /// `None` if it was already gone.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> StoreResult<Option<Record>> {
        let removed = self.find_by_id(id).await?;
        if removed.is_none() {
            return Ok(None);
        }

        let id = id.to_string();
        self.db
            .execute(move |conn| {
                conn.execute("DELETE FROM records WHERE id = ?1", rusqlite::params![id])?;
                Ok(())
            })
            .await?;
        Ok(removed)
    }

    /// Return the total number of stored records.
    #[instrument(skip(self))]
    pub async fn count(&self) -> StoreResult<i64> {
        self.db
            .execute(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }

    /// Return the number of records in a folder.
    #[instrument(skip(self))]
    pub async fn count_by_folder(&self, folder: &str) -> StoreResult<i64> {
        let folder = folder.to_string();
        self.db
            .execute(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM records WHERE folder = ?1",
                    rusqlite::params![folder],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }

    /// Return all records matching `predicate`, in ascending `sort_index`
    /// order.
    pub async fn iterate<F>(&self, predicate: F) -> StoreResult<Vec<Record>>
    where
        F: Fn(&Record) -> bool + Send + 'static,
    {
        self.db
            .execute(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{SELECT_RECORD} ORDER BY sort_index ASC"))?;
                let rows = stmt
                    .query_map([], row_to_raw)?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut records = Vec::new();
                for raw in rows {
                    let record = raw.into_record()?;
                    if predicate(&record) {
                        records.push(record);
                    }
                }
                Ok(records)
            })
            .await
    }

    /// Attach a fetched conversation thread to an existing record.
    #[instrument(skip(self, conversations))]
    pub async fn set_conversations(
        &self,
        id: &str,
        conversations: serde_json::Value,
    ) -> StoreResult<()> {
        let id = id.to_string();
        let json = serde_json::to_string(&conversations)?;
        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE records SET conversations = ?2 WHERE id = ?1",
                    rusqlite::params![id, json],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "record",
                        id,
                    });
                }
                Ok(())
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Internal row mapping
// ═══════════════════════════════════════════════════════════════════════

const SELECT_RECORD: &str = "SELECT id, owner_id, remote_id, author_handle, full_text, folder, \
     category, conversations, media, sort_index, created_at, fetched_at FROM records";

/// Raw row data from SQLite before JSON deserialization.
///
/// Keeps the `rusqlite` row-mapping closure simple (no fallible JSON parsing
/// inside `|row| { ... }`), then converts to `Record` in a second step where
/// `StoreError::Json` can be returned.
struct RecordRow {
    id: String,
    owner_id: String,
    remote_id: String,
    author_handle: String,
    full_text: String,
    folder: Option<String>,
    category: Option<String>,
    conversations: Option<String>,
    media: Option<String>,
    sort_index: String,
    created_at: i64,
    fetched_at: i64,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        remote_id: row.get(2)?,
        author_handle: row.get(3)?,
        full_text: row.get(4)?,
        folder: row.get(5)?,
        category: row.get(6)?,
        conversations: row.get(7)?,
        media: row.get(8)?,
        sort_index: row.get(9)?,
        created_at: row.get(10)?,
        fetched_at: row.get(11)?,
    })
}

impl RecordRow {
    fn into_record(self) -> StoreResult<Record> {
        let conversations = self
            .conversations
            .map(|c| serde_json::from_str(&c))
            .transpose()?;
        let media = self.media.map(|m| serde_json::from_str(&m)).transpose()?;

        Ok(Record {
            id: self.id,
            owner_id: self.owner_id,
            remote_id: self.remote_id,
            author_handle: self.author_handle,
            full_text: self.full_text,
            folder: self.folder,
            category: self.category,
            conversations,
            media,
            sort_index: self.sort_index,
            created_at: self.created_at,
            fetched_at: self.fetched_at,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
