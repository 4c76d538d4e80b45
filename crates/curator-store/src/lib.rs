//! # curator-store
//!
//! Storage engine for curator.
//!
//! Provides SQLite-backed persistence with WAL mode: the replicated
//! [`Record`] table written by the sync driver and the action executor, and
//! a small key-value state area holding per-category sync cursors, the
//! durable task queue, and workflow definitions.
//!
//! ## Quick start
//!
//! ```ignore
//! use curator_store::{Database, RecordStore, StateStore};
//!
//! let db = Database::open_and_migrate("data/curator.db").await?;
//! let records = RecordStore::new(db.clone());
//! let state = StateStore::new(db);
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod record_store;
pub mod state_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use record_store::{Record, RecordStore};
pub use state_store::StateStore;
