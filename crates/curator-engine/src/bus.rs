//! Event channels between the page context, the coordinator, and the
//! presentation layer.
//!
//! The observer and the coordinator live in different execution contexts
//! and communicate only by message passing. [`EventBus`] models that
//! boundary as a broadcast channel with at-most-once publication per
//! originating call and no ordering guarantee across distinct calls.
//!
//! [`ChangeNotifier`] is the outbound side: the engine emits a
//! [`ChangeEvent`] whenever task lists, counts, or records change, and the
//! presentation layer subscribes; the engine never renders anything itself.
//!
//! Events are wrapped in [`Arc`] so broadcasting to multiple subscribers
//! does not clone the payload.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::trigger::InterceptedCall;

/// Broadcast bus carrying intercepted calls from the observer to the
/// coordinator.
///
/// Cheaply cloneable and `Send + Sync`. Publishing with no active
/// subscribers is not an error — common during startup and shutdown.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<InterceptedCall>>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// A subscriber that falls behind by more than `capacity` events
    /// receives a `Lagged` error indicating how many events it missed.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an intercepted call to all current subscribers.
    ///
    /// Returns the number of receivers that will observe the event.
    pub fn publish(&self, call: InterceptedCall) -> usize {
        match self.sender.send(Arc::new(call)) {
            Ok(n) => n,
            Err(_) => {
                tracing::trace!("intercepted call published with no active receivers");
                0
            }
        }
    }

    /// Create a subscriber that receives all future events.
    ///
    /// Events published before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<InterceptedCall>> {
        self.sender.subscribe()
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A state change the presentation layer may want to react to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ChangeEvent {
    /// The pending task list changed (enqueue or removal).
    TasksChanged,
    /// A stored record gained new data (e.g. an unrolled conversation).
    RecordUpdated { id: String },
    /// Aggregate counters changed after a record removal.
    CountsChanged {
        /// New total record count.
        total: i64,
        /// The affected folder and its new count, when the removed record
        /// belonged to one.
        folder: Option<(String, i64)>,
    },
}

/// Outbound change notifications for the presentation layer.
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit a change event; dropped silently when nobody listens.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

// ── tests ────────────────────────────────────────────────────────────
