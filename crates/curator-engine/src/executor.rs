//! Action executor — drain the task queue and perform side effects.
//!
//! [`ActionExecutor::run_all`] processes tasks strictly in insertion order,
//! one at a time, and removes each task only after its handler completes —
//! success or terminal failure. A crash mid-drain leaves the unfinished
//! tail durably queued for the next run. Failures are logged and the task
//! is removed anyway: a deliberate at-most-once policy, so a poison task
//! can never block the queue forever.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use curator_client::{RemoteApi, wire};
use curator_store::{Record, RecordStore, StateStore};

use crate::bus::{ChangeEvent, ChangeNotifier};
use crate::error::EngineResult;
use crate::queue::{Task, TaskQueue};
use crate::workflow::{ActionKind, Workflow, WORKFLOWS_STATE_KEY};

/// Collaborator that receives media download hand-offs.
///
/// The engine resolves the best variant URL; fetching and writing the file
/// belongs to the host environment.
#[async_trait]
pub trait MediaSink: Send + Sync {
    async fn download(&self, url: &str, file_name: &str) -> Result<(), String>;
}

/// Drains the task queue and executes each task's side effect.
pub struct ActionExecutor {
    owner_id: String,
    queue: TaskQueue,
    records: RecordStore,
    state: StateStore,
    api: Arc<dyn RemoteApi>,
    sink: Arc<dyn MediaSink>,
    notifier: ChangeNotifier,
}

impl ActionExecutor {
    pub fn new(
        owner_id: impl Into<String>,
        queue: TaskQueue,
        records: RecordStore,
        state: StateStore,
        api: Arc<dyn RemoteApi>,
        sink: Arc<dyn MediaSink>,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            queue,
            records,
            state,
            api,
            sink,
            notifier,
        }
    }

    /// Drain the queue once, oldest task first.
    ///
    /// Each task's own completion gates the next; there is no per-task
    /// timeout, so a hung remote call blocks only that drain, never the
    /// rest of the system.
    pub async fn run_all(&self) -> EngineResult<()> {
        let tasks = self.queue.list().await?;
        if tasks.is_empty() {
            return Ok(());
        }
        info!(pending = tasks.len(), "draining task queue");

        for task in tasks {
            if let Err(err) = self.execute(&task).await {
                // At-most-once: the task is removed below regardless.
                warn!(
                    task_id = %task.id,
                    kind = %task.kind,
                    target_id = %task.target_id,
                    error = %err,
                    "task failed"
                );
            }
            self.queue.remove(&task.id).await?;
            self.notifier.publish(ChangeEvent::TasksChanged);
        }
        Ok(())
    }

    async fn execute(&self, task: &Task) -> EngineResult<()> {
        debug!(task_id = %task.id, kind = %task.kind, target_id = %task.target_id, "executing task");
        match task.kind {
            ActionKind::UnrollThread => self.unroll_thread(task).await,
            ActionKind::DeleteBookmark => self.delete_bookmark(task).await,
            ActionKind::AutoComment => self.auto_comment(task).await,
            ActionKind::DownloadMedia => self.download_media(task).await,
        }
    }

    // ── handlers ─────────────────────────────────────────────────────

    /// Fetch the full conversation for the stored record and merge it in.
    async fn unroll_thread(&self, task: &Task) -> EngineResult<()> {
        let id = Record::composite_id(&self.owner_id, &task.target_id);
        if self.records.find_by_id(&id).await?.is_none() {
            warn!(record_id = %id, "no stored record to unroll");
            return Ok(());
        }

        match self.api.fetch_conversation(&task.target_id).await? {
            Some(thread) => {
                self.records.set_conversations(&id, thread).await?;
                self.notifier.publish(ChangeEvent::RecordUpdated { id });
            }
            None => debug!(target_id = %task.target_id, "remote conversation is empty"),
        }
        Ok(())
    }

    /// Remove the local record and republish the affected counters.
    async fn delete_bookmark(&self, task: &Task) -> EngineResult<()> {
        let id = Record::composite_id(&self.owner_id, &task.target_id);
        let Some(removed) = self.records.delete(&id).await? else {
            debug!(record_id = %id, "record already absent");
            return Ok(());
        };

        let total = self.records.count().await?;
        let folder = match removed.folder {
            Some(folder) => {
                let remaining = self.records.count_by_folder(&folder).await?;
                Some((folder, remaining))
            }
            None => None,
        };
        self.notifier
            .publish(ChangeEvent::CountsChanged { total, folder });
        Ok(())
    }

    /// Post a reply with the workflow-configured text.
    ///
    /// A missing or empty text means the action is misconfigured: skip with
    /// a diagnostic, never retry.
    async fn auto_comment(&self, task: &Task) -> EngineResult<()> {
        let Some(text) = self.comment_text().await? else {
            warn!(target_id = %task.target_id, "auto-comment has no configured text, skipping");
            return Ok(());
        };

        let posted_id = self.api.create_post(&text, &task.target_id).await?;
        debug!(target_id = %task.target_id, posted_id = %posted_id, "auto-comment posted");
        Ok(())
    }

    /// Fetch the item and hand its best media variant to the sink.
    async fn download_media(&self, task: &Task) -> EngineResult<()> {
        let Some(detail) = self
            .api
            .fetch_detail(&self.owner_id, &task.target_id)
            .await?
        else {
            debug!(target_id = %task.target_id, "item no longer exists remotely");
            return Ok(());
        };

        let Some(url) = detail.media.as_ref().and_then(wire::best_media_url) else {
            warn!(target_id = %task.target_id, "no downloadable media on item");
            return Ok(());
        };

        let file_name = format!("{}.mp4", task.target_id);
        self.sink
            .download(&url, &file_name)
            .await
            .map_err(crate::error::EngineError::Collaborator)
    }

    /// The first non-empty auto-comment input among the persisted workflows.
    async fn comment_text(&self) -> EngineResult<Option<String>> {
        let workflows: Vec<Workflow> = self
            .state
            .get_json(WORKFLOWS_STATE_KEY)
            .await?
            .unwrap_or_default();

        Ok(workflows
            .iter()
            .flat_map(|w| &w.then_list)
            .filter(|a| a.kind == ActionKind::AutoComment)
            .find_map(|a| a.inputs.first())
            .filter(|text| !text.is_empty())
            .cloned())
    }
}

// ── tests ────────────────────────────────────────────────────────────
