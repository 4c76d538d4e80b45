//! # curator-engine
//!
//! Trigger–action workflow engine for curator.
//!
//! This crate provides:
//!
//! - **Trigger classification**: [`trigger::classify`] maps an intercepted
//!   endpoint call to a semantic [`Trigger`], disambiguating the overloaded
//!   create-post endpoint.
//! - **Workflow matching**: first-match lookup of the user's persisted
//!   trigger → action-list bindings, plus target-id resolution from the
//!   intercepted call.
//! - **Task queue**: a durable, deduplicated FIFO with superseding rules
//!   via [`TaskQueue`].
//! - **Action executor**: [`ActionExecutor`] drains the queue sequentially
//!   with an at-most-once policy.
//! - **Event channels**: [`EventBus`] carries observer events across the
//!   page/coordinator boundary; [`ChangeNotifier`] pushes state changes to
//!   the presentation layer.

pub mod bus;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod observer;
pub mod queue;
pub mod trigger;
pub mod workflow;

// ── re-exports ───────────────────────────────────────────────────────

pub use bus::{ChangeEvent, ChangeNotifier, EventBus};
pub use coordinator::Coordinator;
pub use error::{EngineError, EngineResult};
pub use executor::{ActionExecutor, MediaSink};
pub use observer::{CallToken, NetworkObserver};
pub use queue::{Task, TaskQueue};
pub use trigger::{InterceptedCall, RequestEnvelope, ResponseEnvelope, Trigger, classify};
pub use workflow::{Action, ActionKind, Workflow};
