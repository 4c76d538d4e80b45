//! Per-category incremental sync driver.
//!
//! Each category walks the remote timeline one cursor-paginated page at a
//! time: fetch a page with the last saved cursor, upsert its items, advance
//! the progress counter, and save the new cursor immediately — a crash
//! loses at most the in-flight page, never prior progress.
//!
//! State machine per category: `Idle → Running → {Paused | Errored |
//! Finished}`.
//!
//! - An empty page finishes the category; the last cursor is **kept** so a
//!   future incremental pass resumes where this one ended.
//! - A rate limit pauses the category with the server's reset time; the
//!   driver refuses to start again before that time.
//! - An identity rejection halts the category and raises the
//!   auth-required flag — no automatic retry.
//! - Any other failure (including a local write failure) halts the
//!   category without advancing the cursor, so the next run retries the
//!   same page.
//!
//! The cursor is single-threaded per category; categories are independent
//! and may run concurrently with each other and with the action executor.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use curator_client::{Category, ClientError, RemoteApi};
use curator_store::{RecordStore, StateStore};

use crate::config::SyncConfig;
use crate::status::{StatusBoard, SyncState};

/// Persisted continuation state of one category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Opaque continuation token from the last fully applied page.
    pub cursor: Option<String>,
    /// Unix timestamp a rate-limited category may resume at, 0 otherwise.
    pub reset_at: i64,
}

/// State key a category's cursor is persisted under.
pub fn cursor_key(category: Category) -> String {
    format!("cursor:{category}")
}

/// Walks cursor-paginated remote timelines into the local record store.
pub struct SyncDriver {
    api: Arc<dyn RemoteApi>,
    records: RecordStore,
    state: StateStore,
    owner_id: String,
    board: Arc<StatusBoard>,
    running: DashMap<Category, ()>,
    auth_required: watch::Sender<bool>,
}

impl SyncDriver {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        records: RecordStore,
        state: StateStore,
        owner_id: impl Into<String>,
    ) -> Self {
        let (auth_required, _) = watch::channel(false);
        Self {
            api,
            records,
            state,
            owner_id: owner_id.into(),
            board: Arc::new(StatusBoard::new()),
            running: DashMap::new(),
            auth_required,
        }
    }

    /// The observable per-category status board.
    pub fn board(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.board)
    }

    /// Receiver that flips to `true` when the remote rejects the identity;
    /// the presentation layer should prompt for re-authentication.
    pub fn auth_required(&self) -> watch::Receiver<bool> {
        self.auth_required.subscribe()
    }

    /// Walk `category` until it reaches a terminal state.
    ///
    /// Serves both modes: the one-time full backfill walks many pages; the
    /// periodic incremental pass runs the same loop and typically converges
    /// after one page since only new items exist.
    pub async fn run(&self, category: Category) -> SyncState {
        // One loop per category at a time; the cursor is single-threaded.
        if self.running.insert(category, ()).is_some() {
            debug!(%category, "sync already running");
            return self.board.get(category).state;
        }
        let result = self.run_inner(category).await;
        self.running.remove(&category);
        result
    }

    /// Run every category concurrently and wait for all of them.
    pub async fn run_categories(self: Arc<Self>, categories: &[Category]) {
        let mut set = tokio::task::JoinSet::new();
        for &category in categories {
            let driver = Arc::clone(&self);
            set.spawn(async move { driver.run(category).await });
        }
        while set.join_next().await.is_some() {}
    }

    /// Incremental mode: re-run all configured categories on startup and
    /// then on a timer, skipping categories still inside a rate-limit
    /// window (the per-run gate handles that).
    pub async fn run_periodic(self: Arc<Self>, config: SyncConfig) {
        let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            Arc::clone(&self).run_categories(&config.categories).await;
        }
    }

    // ── state machine ────────────────────────────────────────────────

    async fn run_inner(&self, category: Category) -> SyncState {
        let key = cursor_key(category);
        let mut saved: SyncCursor = match self.state.get_json(&key).await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(err) => {
                warn!(%category, error = %err, "failed to load sync cursor");
                return self.errored(category);
            }
        };

        // Respect an unexpired rate-limit window from an earlier run.
        let now = chrono::Utc::now().timestamp();
        if saved.reset_at > now {
            debug!(%category, reset_at = saved.reset_at, "rate limit window still open");
            self.board.update(category, |s| {
                s.state = SyncState::Paused;
                s.reset_at = saved.reset_at;
            });
            return SyncState::Paused;
        }

        info!(%category, cursor = saved.cursor.as_deref().unwrap_or(""), "sync starting");
        self.board
            .update(category, |s| s.state = SyncState::Running);

        loop {
            let page = match self
                .api
                .fetch_page(category, &self.owner_id, saved.cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(ClientError::RateLimited { reset_at }) => {
                    info!(%category, reset_at, "rate limited, pausing");
                    saved.reset_at = reset_at;
                    // Cursor stays where it was; only the window is recorded.
                    if let Err(err) = self.state.set_json(&key, &saved).await {
                        warn!(%category, error = %err, "failed to persist rate-limit window");
                    }
                    self.board.update(category, |s| {
                        s.state = SyncState::Paused;
                        s.reset_at = reset_at;
                    });
                    return SyncState::Paused;
                }
                Err(ClientError::Identity(reason)) => {
                    warn!(%category, %reason, "identity rejected, stopping sync");
                    self.auth_required.send_replace(true);
                    return self.errored(category);
                }
                Err(err) => {
                    warn!(%category, error = %err, "page fetch failed");
                    return self.errored(category);
                }
            };

            // End of the remote timeline. Keep the cursor for a future
            // incremental resume instead of clearing it.
            if page.items.is_empty() {
                return self.finished(category);
            }

            let fetched = page.items.len() as u64;
            if let Err(err) = self.records.upsert(page.items).await {
                // Cursor not advanced: the next run retries this page and
                // the idempotent upsert absorbs the overlap.
                warn!(%category, error = %err, "failed to persist page");
                return self.errored(category);
            }

            self.board.update(category, |s| {
                s.done += fetched;
                s.reset_at = 0;
            });

            match page.next_cursor {
                Some(next) => {
                    saved.cursor = Some(next);
                    saved.reset_at = 0;
                    if let Err(err) = self.state.set_json(&key, &saved).await {
                        warn!(%category, error = %err, "failed to save cursor");
                        return self.errored(category);
                    }
                }
                None => return self.finished(category),
            }
        }
    }

    fn errored(&self, category: Category) -> SyncState {
        self.board
            .update(category, |s| s.state = SyncState::Errored);
        SyncState::Errored
    }

    fn finished(&self, category: Category) -> SyncState {
        info!(%category, "end of remote timeline reached");
        self.board.update(category, |s| {
            s.state = SyncState::Finished;
            s.total = s.done;
        });
        SyncState::Finished
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use curator_client::{ClientResult, TimelinePage};
    use curator_store::{Database, Record};
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Remote source that replays a scripted sequence of page results and
    /// records the cursor each fetch arrived with.
    struct ScriptedSource {
        responses: Mutex<VecDeque<ClientResult<TimelinePage>>>,
        seen_cursors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<ClientResult<TimelinePage>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                seen_cursors: Mutex::new(Vec::new()),
            }
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.seen_cursors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteApi for ScriptedSource {
        async fn fetch_page(
            &self,
            _category: Category,
            _owner_id: &str,
            cursor: Option<&str>,
        ) -> ClientResult<TimelinePage> {
            self.seen_cursors
                .lock()
                .unwrap()
                .push(cursor.map(str::to_owned));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(empty_page)
        }

        async fn create_post(&self, _text: &str, _reply: &str) -> ClientResult<String> {
            unreachable!("driver never posts")
        }

        async fn fetch_conversation(&self, _remote_id: &str) -> ClientResult<Option<Value>> {
            unreachable!("driver never unrolls")
        }

        async fn fetch_detail(
            &self,
            _owner_id: &str,
            _remote_id: &str,
        ) -> ClientResult<Option<Record>> {
            unreachable!("driver never fetches details")
        }
    }

    fn page(ids: std::ops::Range<u64>, next_cursor: Option<&str>) -> ClientResult<TimelinePage> {
        let items = ids
            .map(|i| {
                let remote_id = i.to_string();
                Record {
                    id: Record::composite_id("u1", &remote_id),
                    owner_id: "u1".into(),
                    remote_id,
                    author_handle: "alice".into(),
                    full_text: format!("post {i}"),
                    folder: None,
                    category: Some("bookmarks".into()),
                    conversations: None,
                    media: None,
                    sort_index: format!("{i:06}"),
                    created_at: 0,
                    fetched_at: 0,
                }
            })
            .collect();
        Ok(TimelinePage {
            items,
            next_cursor: next_cursor.map(str::to_owned),
        })
    }

    fn empty_page() -> ClientResult<TimelinePage> {
        Ok(TimelinePage {
            items: Vec::new(),
            next_cursor: None,
        })
    }

    struct Fixture {
        driver: SyncDriver,
        records: RecordStore,
        state: StateStore,
    }

    async fn fixture(source: ScriptedSource) -> (Fixture, Arc<ScriptedSource>) {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let records = RecordStore::new(db.clone());
        let state = StateStore::new(db);
        let source = Arc::new(source);
        let driver = SyncDriver::new(
            source.clone(),
            records.clone(),
            state.clone(),
            "u1",
        );
        (
            Fixture {
                driver,
                records,
                state,
            },
            source,
        )
    }

    #[tokio::test]
    async fn full_walk_persists_everything_and_keeps_last_cursor() {
        // Pages of sizes [100, 100, 0].
        let source = ScriptedSource::new(vec![
            page(0..100, Some("cursor-1")),
            page(100..200, Some("cursor-2")),
            empty_page(),
        ]);
        let (fx, source) = fixture(source).await;

        let state = fx.driver.run(Category::Bookmarks).await;
        assert_eq!(state, SyncState::Finished);
        assert_eq!(fx.records.count().await.unwrap(), 200);

        // The saved cursor is the one returned after the second page,
        // not cleared by finishing.
        let saved: SyncCursor = fx
            .state
            .get_json(&cursor_key(Category::Bookmarks))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.cursor.as_deref(), Some("cursor-2"));

        let status = fx.driver.board().get(Category::Bookmarks);
        assert_eq!(status.done, 200);
        assert_eq!(status.total, 200);

        // The third fetch resumed from cursor-2.
        assert_eq!(
            source.cursors(),
            vec![None, Some("cursor-1".into()), Some("cursor-2".into())]
        );
    }

    #[tokio::test]
    async fn rate_limit_pauses_and_leaves_cursor_at_prior_page() {
        let reset_at = chrono::Utc::now().timestamp() + 600;
        let source = ScriptedSource::new(vec![
            page(0..100, Some("cursor-1")),
            Err(ClientError::RateLimited { reset_at }),
        ]);
        let (fx, _source) = fixture(source).await;

        let state = fx.driver.run(Category::Posts).await;
        assert_eq!(state, SyncState::Paused);

        let status = fx.driver.board().get(Category::Posts);
        assert_eq!(status.state, SyncState::Paused);
        assert_eq!(status.reset_at, reset_at);
        assert_eq!(status.done, 100);

        // Cursor unchanged by the failed attempt.
        let saved: SyncCursor = fx
            .state
            .get_json(&cursor_key(Category::Posts))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.cursor.as_deref(), Some("cursor-1"));
        assert_eq!(saved.reset_at, reset_at);
    }

    #[tokio::test]
    async fn paused_category_refuses_to_run_before_reset() {
        let reset_at = chrono::Utc::now().timestamp() + 600;
        let source = ScriptedSource::new(vec![Err(ClientError::RateLimited { reset_at })]);
        let (fx, source) = fixture(source).await;

        assert_eq!(fx.driver.run(Category::Likes).await, SyncState::Paused);
        let fetches_so_far = source.cursors().len();

        // The window has not elapsed: the driver must not fetch again.
        assert_eq!(fx.driver.run(Category::Likes).await, SyncState::Paused);
        assert_eq!(source.cursors().len(), fetches_so_far);
    }

    #[tokio::test]
    async fn expired_rate_limit_window_resumes() {
        let past = chrono::Utc::now().timestamp() - 10;
        let source = ScriptedSource::new(vec![Err(ClientError::RateLimited { reset_at: past })]);
        let (fx, source) = fixture(source).await;

        assert_eq!(fx.driver.run(Category::Likes).await, SyncState::Paused);

        // Script exhausted → the next fetch sees the end of the timeline.
        assert_eq!(fx.driver.run(Category::Likes).await, SyncState::Finished);
        assert_eq!(source.cursors().len(), 2);
    }

    #[tokio::test]
    async fn identity_rejection_errors_and_raises_auth_flag() {
        let source =
            ScriptedSource::new(vec![Err(ClientError::Identity("session expired".into()))]);
        let (fx, _source) = fixture(source).await;
        let auth = fx.driver.auth_required();
        assert!(!*auth.borrow());

        let state = fx.driver.run(Category::Bookmarks).await;
        assert_eq!(state, SyncState::Errored);
        assert!(*auth.borrow());
    }

    #[tokio::test]
    async fn transient_error_retries_same_page_on_next_run() {
        let source = ScriptedSource::new(vec![
            page(0..10, Some("cursor-1")),
            Err(ClientError::Http { status: 500 }),
            page(10..20, None),
        ]);
        let (fx, source) = fixture(source).await;

        assert_eq!(fx.driver.run(Category::Media).await, SyncState::Errored);

        // The rerun reuses cursor-1: the cursor was not advanced by the
        // failed attempt.
        assert_eq!(fx.driver.run(Category::Media).await, SyncState::Finished);
        assert_eq!(
            source.cursors(),
            vec![
                None,
                Some("cursor-1".into()),
                Some("cursor-1".into()),
            ]
        );
        assert_eq!(fx.records.count().await.unwrap(), 20);
    }

    #[tokio::test]
    async fn incremental_pass_converges_immediately_when_nothing_is_new() {
        let source = ScriptedSource::new(vec![page(0..5, Some("cursor-1")), empty_page()]);
        let (fx, source) = fixture(source).await;

        assert_eq!(fx.driver.run(Category::Replies).await, SyncState::Finished);

        // Later incremental pass: one fetch from the kept cursor, done.
        assert_eq!(fx.driver.run(Category::Replies).await, SyncState::Finished);
        assert_eq!(source.cursors().last().unwrap().as_deref(), Some("cursor-1"));
    }

    #[tokio::test]
    async fn page_with_items_but_no_cursor_finishes() {
        let source = ScriptedSource::new(vec![page(0..3, None)]);
        let (fx, _source) = fixture(source).await;

        assert_eq!(fx.driver.run(Category::Posts).await, SyncState::Finished);
        assert_eq!(fx.records.count().await.unwrap(), 3);

        // Nothing was ever saved under the cursor key: there was no cursor
        // to keep.
        let saved: Option<SyncCursor> = fx
            .state
            .get_json(&cursor_key(Category::Posts))
            .await
            .unwrap();
        assert!(saved.is_none());
    }

    #[tokio::test]
    async fn categories_run_concurrently_and_independently() {
        let source = ScriptedSource::new(vec![empty_page(), empty_page()]);
        let (fx, _source) = fixture(source).await;
        let driver = Arc::new(fx.driver);

        Arc::clone(&driver)
            .run_categories(&[Category::Posts, Category::Bookmarks])
            .await;

        assert_eq!(driver.board().get(Category::Posts).state, SyncState::Finished);
        assert_eq!(
            driver.board().get(Category::Bookmarks).state,
            SyncState::Finished
        );
    }
}
