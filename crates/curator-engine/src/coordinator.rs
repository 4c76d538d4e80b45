//! Coordinator — classify, match, resolve, enqueue.
//!
//! The coordinator subscribes to the [`crate::bus::EventBus`] and handles one
//! intercepted call to completion before taking the next, so enqueue order
//! is deterministic per coordinator instance. Events that match no
//! workflow, or whose target id cannot be resolved, are dropped with a
//! diagnostic — most traffic is expected not to match.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use curator_store::StateStore;

use crate::bus::{ChangeEvent, ChangeNotifier};
use crate::error::EngineResult;
use crate::queue::{Task, TaskQueue};
use crate::trigger::InterceptedCall;
use crate::workflow::{self, Workflow, WORKFLOWS_STATE_KEY};

/// Turns intercepted calls into queued tasks.
pub struct Coordinator {
    queue: TaskQueue,
    state: StateStore,
    notifier: ChangeNotifier,
}

impl Coordinator {
    pub fn new(queue: TaskQueue, state: StateStore, notifier: ChangeNotifier) -> Self {
        Self {
            queue,
            state,
            notifier,
        }
    }

    /// Consume a bus subscription until the bus closes, handling events
    /// sequentially.
    pub async fn run(&self, mut rx: tokio::sync::broadcast::Receiver<Arc<InterceptedCall>>) {
        loop {
            match rx.recv().await {
                Ok(call) => {
                    if let Err(err) = self.handle(&call).await {
                        warn!(error = %err, "failed to handle intercepted call");
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "coordinator lagged behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    /// Handle a single intercepted call: look up the first matching
    /// workflow, resolve the target id, enqueue every configured action.
    pub async fn handle(&self, call: &Arc<InterceptedCall>) -> EngineResult<()> {
        let workflows: Vec<Workflow> = self
            .state
            .get_json(WORKFLOWS_STATE_KEY)
            .await?
            .unwrap_or_default();

        let Some(matched) = workflow::first_match(&workflows, call.trigger) else {
            debug!(trigger = %call.trigger, "no workflow matches trigger");
            return Ok(());
        };

        let Some(target_id) = workflow::resolve_target_id(call) else {
            debug!(trigger = %call.trigger, "no usable target id, dropping event");
            return Ok(());
        };

        for action in &matched.then_list {
            self.queue
                .enqueue(Task::new(action.kind, target_id.clone()))
                .await?;
        }
        if !matched.then_list.is_empty() {
            self.notifier.publish(ChangeEvent::TasksChanged);
        }
        Ok(())
    }
}

// ── tests ────────────────────────────────────────────────────────────
