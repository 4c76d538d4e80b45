//! Durable, deduplicated FIFO task queue.
//!
//! Tasks are persisted as one ordered JSON list under a single state key
//! and read/replaced as a whole unit, so the queue survives a full restart
//! of the coordinator process. Enqueueing applies two ordered filters
//! against the **current persisted list** (not a snapshot from before the
//! triggering event):
//!
//! 1. Superseding rule — an `UnrollThread` task evicts any queued
//!    `DeleteBookmark` for the same target: the content-preserving action
//!    wins over the destructive one.
//! 2. Idempotence rule — any existing task with the same
//!    `(kind, target_id)` pair is removed before the new one is appended
//!    (last write wins; the identical action/target pair never runs twice).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use curator_store::StateStore;

use crate::error::EngineResult;
use crate::workflow::ActionKind;

/// State key the task list is persisted under.
pub const TASKS_STATE_KEY: &str = "tasks";

/// A queued, not-yet-executed instance of an action bound to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Creation-time token; used only for removal, FIFO order comes from
    /// list position.
    pub id: String,
    pub kind: ActionKind,
    pub target_id: String,
}

impl Task {
    /// Create a task bound to `target_id`.
    pub fn new(kind: ActionKind, target_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            kind,
            target_id: target_id.into(),
        }
    }
}

/// Persistent FIFO of pending tasks.
#[derive(Clone)]
pub struct TaskQueue {
    state: StateStore,
}

impl TaskQueue {
    /// Create a queue over the given state area.
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Append a task, applying the superseding and idempotence rules.
    pub async fn enqueue(&self, task: Task) -> EngineResult<()> {
        let mut tasks = self.load().await?;

        if task.kind == ActionKind::UnrollThread {
            tasks.retain(|t| {
                t.kind != ActionKind::DeleteBookmark || t.target_id != task.target_id
            });
        }
        tasks.retain(|t| t.kind != task.kind || t.target_id != task.target_id);

        debug!(task_id = %task.id, kind = %task.kind, target_id = %task.target_id, "task enqueued");
        tasks.push(task);
        self.save(&tasks).await
    }

    /// All pending tasks in insertion order (oldest first).
    pub async fn list(&self) -> EngineResult<Vec<Task>> {
        self.load().await
    }

    /// Remove a task by id.
    ///
    /// A missing id is a logged no-op — the task may already have been
    /// removed by a concurrent path.
    pub async fn remove(&self, id: &str) -> EngineResult<()> {
        let mut tasks = self.load().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            warn!(task_id = %id, "task not found on removal");
            return Ok(());
        }
        self.save(&tasks).await
    }

    async fn load(&self) -> EngineResult<Vec<Task>> {
        Ok(self
            .state
            .get_json(TASKS_STATE_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, tasks: &[Task]) -> EngineResult<()> {
        self.state.set_json(TASKS_STATE_KEY, &tasks).await?;
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
