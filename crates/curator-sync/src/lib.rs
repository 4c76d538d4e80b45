//! # curator-sync
//!
//! Incremental sync pipeline for curator.
//!
//! This crate provides:
//!
//! - **The sync driver**: [`SyncDriver`] walks each content category's
//!   cursor-paginated remote timeline into the local record store, saving
//!   the cursor after every page so progress survives crashes.
//! - **Rate-limit and failure state**: per-category
//!   `Idle → Running → {Paused | Errored | Finished}` transitions, with
//!   rate-limit windows persisted and respected across runs.
//! - **Observable progress**: a [`StatusBoard`] the presentation layer
//!   subscribes to; the core never renders.
//! - **Configuration**: [`SyncConfig`] from TOML (interval, timeout,
//!   categories).

pub mod config;
pub mod driver;
pub mod error;
pub mod status;

// ── re-exports ───────────────────────────────────────────────────────

pub use config::SyncConfig;
pub use driver::{SyncCursor, SyncDriver, cursor_key};
pub use error::{SyncError, SyncResult};
pub use status::{StatusBoard, SyncState, SyncStatus};
