//! Per-category sync status, observable by the presentation layer.
//!
//! The driver records a [`SyncStatus`] per category in a [`StatusBoard`];
//! every update bumps a revision on a `watch` channel so subscribers can
//! re-read the board without the core ever rendering anything itself.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use curator_client::Category;

/// Lifecycle state of one category's sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Never started in this session.
    Idle,
    /// Currently walking pages.
    Running,
    /// Halted on a rate limit; resumes after `reset_at`.
    Paused,
    /// Halted on a failure; the cursor was not advanced.
    Errored,
    /// Reached the end of the remote timeline.
    Finished,
}

/// Snapshot of one category's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Items persisted so far in this session.
    pub done: u64,
    /// Known total; equals `done` once the category finishes (the remote
    /// exposes no count up front).
    pub total: u64,
    /// Unix timestamp a rate-limited category may resume at, 0 otherwise.
    pub reset_at: i64,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Idle,
            done: 0,
            total: 0,
            reset_at: 0,
        }
    }
}

/// Shared, observable map of category → status.
pub struct StatusBoard {
    statuses: DashMap<Category, SyncStatus>,
    revision: watch::Sender<u64>,
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            statuses: DashMap::new(),
            revision,
        }
    }

    /// Current status of a category (idle if never touched).
    pub fn get(&self, category: Category) -> SyncStatus {
        self.statuses
            .get(&category)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Mutate a category's status and notify subscribers.
    pub fn update(&self, category: Category, f: impl FnOnce(&mut SyncStatus)) {
        let mut entry = self.statuses.entry(category).or_default();
        f(entry.value_mut());
        drop(entry);
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Subscribe to change notifications; the value is a monotonically
    /// increasing revision, re-read the board on each bump.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

// ── tests ────────────────────────────────────────────────────────────
