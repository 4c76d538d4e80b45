//! Integration tests for the curator-sync crate.
//!
//! Exercises the sync driver against an on-disk store, including resume
//! after a process restart and interleaving with another writer on the
//! same database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use curator_client::{Category, ClientResult, RemoteApi, TimelinePage};
use curator_store::{Database, Record, RecordStore, StateStore};
use curator_sync::{SyncCursor, SyncDriver, SyncState, cursor_key};

// ═══════════════════════════════════════════════════════════════════════
//  Scripted remote source
// ═══════════════════════════════════════════════════════════════════════

struct ScriptedSource {
    responses: Mutex<VecDeque<ClientResult<TimelinePage>>>,
}

impl ScriptedSource {
    fn new(responses: Vec<ClientResult<TimelinePage>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl RemoteApi for ScriptedSource {
    async fn fetch_page(
        &self,
        _category: Category,
        _owner_id: &str,
        _cursor: Option<&str>,
    ) -> ClientResult<TimelinePage> {
        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(TimelinePage {
                items: Vec::new(),
                next_cursor: None,
            })
        })
    }

    async fn create_post(&self, _text: &str, _reply: &str) -> ClientResult<String> {
        unreachable!()
    }

    async fn fetch_conversation(
        &self,
        _remote_id: &str,
    ) -> ClientResult<Option<serde_json::Value>> {
        unreachable!()
    }

    async fn fetch_detail(
        &self,
        _owner_id: &str,
        _remote_id: &str,
    ) -> ClientResult<Option<Record>> {
        unreachable!()
    }
}

fn record(remote_id: u64) -> Record {
    let remote = remote_id.to_string();
    Record {
        id: Record::composite_id("u1", &remote),
        owner_id: "u1".into(),
        remote_id: remote,
        author_handle: "alice".into(),
        full_text: format!("post {remote_id}"),
        folder: None,
        category: Some("bookmarks".into()),
        conversations: None,
        media: None,
        sort_index: format!("{remote_id:06}"),
        created_at: 0,
        fetched_at: 0,
    }
}

fn page(ids: std::ops::Range<u64>, next_cursor: Option<&str>) -> ClientResult<TimelinePage> {
    Ok(TimelinePage {
        items: ids.map(record).collect(),
        next_cursor: next_cursor.map(str::to_owned),
    })
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenarios
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn backfill_resumes_across_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("curator.db");

    // First session: two pages, then the process "dies" before finishing.
    {
        let db = Database::open_and_migrate(db_path.clone()).await.unwrap();
        let driver = SyncDriver::new(
            Arc::new(ScriptedSource::new(vec![
                page(0..50, Some("cursor-1")),
                page(50..100, Some("cursor-2")),
                Err(curator_client::ClientError::Http { status: 500 }),
            ])),
            RecordStore::new(db.clone()),
            StateStore::new(db),
            "u1",
        );
        assert_eq!(driver.run(Category::Bookmarks).await, SyncState::Errored);
    }

    // Second session over the same database: the saved cursor picks up
    // exactly where the first session stopped.
    let db = Database::open_and_migrate(db_path).await.unwrap();
    let records = RecordStore::new(db.clone());
    let state = StateStore::new(db);

    let saved: SyncCursor = state
        .get_json(&cursor_key(Category::Bookmarks))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.cursor.as_deref(), Some("cursor-2"));

    let driver = SyncDriver::new(
        Arc::new(ScriptedSource::new(vec![page(100..150, None)])),
        records.clone(),
        state,
        "u1",
    );
    assert_eq!(driver.run(Category::Bookmarks).await, SyncState::Finished);
    assert_eq!(records.count().await.unwrap(), 150);
}

#[tokio::test]
async fn refetched_overlap_does_not_duplicate() {
    // A failed cursor save makes the next run refetch the same page; the
    // idempotent upsert must absorb the overlap.
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let records = RecordStore::new(db.clone());
    let state = StateStore::new(db);

    let driver = SyncDriver::new(
        Arc::new(ScriptedSource::new(vec![page(0..30, Some("c1"))])),
        records.clone(),
        state.clone(),
        "u1",
    );
    driver.run(Category::Posts).await;

    let driver = SyncDriver::new(
        Arc::new(ScriptedSource::new(vec![page(0..30, Some("c1"))])),
        records.clone(),
        state,
        "u1",
    );
    driver.run(Category::Posts).await;

    assert_eq!(records.count().await.unwrap(), 30);
}

#[tokio::test]
async fn sync_interleaves_with_another_writer() {
    // The executor may delete records while a category is still paging;
    // per-record atomic upserts keep both writers consistent.
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let records = RecordStore::new(db.clone());
    let state = StateStore::new(db);

    let driver = Arc::new(SyncDriver::new(
        Arc::new(ScriptedSource::new(vec![
            page(0..100, Some("c1")),
            page(100..200, None),
        ])),
        records.clone(),
        state,
        "u1",
    ));

    let deleter = {
        let records = records.clone();
        tokio::spawn(async move {
            for i in 0..50u64 {
                let _ = records.delete(&format!("u1:{i}")).await;
            }
        })
    };

    let state = driver.run(Category::Bookmarks).await;
    deleter.await.unwrap();

    assert_eq!(state, SyncState::Finished);
    // Every surviving row is intact regardless of interleaving.
    let survivors = records.iterate(|_| true).await.unwrap();
    for row in &survivors {
        assert!(!row.full_text.is_empty());
        assert_eq!(row.owner_id, "u1");
    }
}
