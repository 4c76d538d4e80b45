//! Network observer — fire-and-observe capture of the page's API calls.
//!
//! The observer runs in the page context. For every outgoing call it
//! checks the endpoint against a fixed watch-list; watched calls get a
//! correlation token, and once the call completes the captured request and
//! response are classified and published onto the [`EventBus`] as a single
//! [`InterceptedCall`]. The original call is never altered or blocked.
//!
//! Calls do not have to complete in the order they started — correlation
//! is by token, not ordering. Calls that fail or time out are reported via
//! [`NetworkObserver::fail`] and simply dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::bus::EventBus;
use crate::trigger::{
    InterceptedCall, RequestEnvelope, ResponseEnvelope, WATCHED_ENDPOINTS, classify,
};

/// Correlation token for an in-flight watched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken(u64);

struct PendingCall {
    endpoint: String,
    request: RequestEnvelope,
}

/// Watches the page's outgoing calls and emits intercepted-call events.
pub struct NetworkObserver {
    bus: EventBus,
    watched: HashSet<String>,
    pending: Mutex<HashMap<u64, PendingCall>>,
    next_token: AtomicU64,
}

impl NetworkObserver {
    /// Create an observer with the default watch-list.
    pub fn new(bus: EventBus) -> Self {
        Self::with_watchlist(bus, WATCHED_ENDPOINTS.iter().map(|s| s.to_string()))
    }

    /// Create an observer watching a custom endpoint set.
    pub fn with_watchlist(bus: EventBus, endpoints: impl IntoIterator<Item = String>) -> Self {
        Self {
            bus,
            watched: endpoints.into_iter().collect(),
            pending: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Register an outgoing call.
    ///
    /// Returns `None` when the endpoint is not watched — the caller lets
    /// the call proceed without further bookkeeping. At most one event is
    /// ever emitted per token returned here.
    pub fn begin(&self, endpoint: &str, request: RequestEnvelope) -> Option<CallToken> {
        if !self.watched.contains(endpoint) {
            return None;
        }

        let token = CallToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.lock_pending().insert(
            token.0,
            PendingCall {
                endpoint: endpoint.to_owned(),
                request,
            },
        );
        debug!(endpoint, token = token.0, "watched call started");
        Some(token)
    }

    /// Complete a watched call with its response and publish the event.
    ///
    /// Unknown tokens (already completed or failed) are ignored.
    pub fn complete(&self, token: CallToken, response: ResponseEnvelope) {
        let Some(pending) = self.lock_pending().remove(&token.0) else {
            debug!(token = token.0, "completion for unknown call token");
            return;
        };

        let Some(trigger) = classify(&pending.endpoint, &pending.request.body) else {
            // Watch-list and classifier cover the same endpoints; reaching
            // here means the watch-list was customized beyond the
            // classifier's domain. Drop quietly.
            debug!(endpoint = %pending.endpoint, "watched call did not classify");
            return;
        };

        debug!(endpoint = %pending.endpoint, %trigger, "intercepted call classified");
        self.bus.publish(InterceptedCall {
            trigger,
            request: pending.request,
            response,
        });
    }

    /// Drop a watched call that failed or timed out; no event is emitted.
    pub fn fail(&self, token: CallToken) {
        if self.lock_pending().remove(&token.0).is_some() {
            debug!(token = token.0, "watched call failed, event dropped");
        }
    }

    /// Number of calls currently awaiting completion.
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    /// The pending map only ever sees infallible inserts/removes, so a
    /// poisoned lock still holds usable data — recover it.
    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingCall>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── tests ────────────────────────────────────────────────────────────
