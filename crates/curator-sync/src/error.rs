//! Sync error types.
//!
//! Most remote and storage failures are captured as per-category state
//! rather than returned — see the state machine in [`crate::driver`].
//! [`SyncError`] covers the failures that do surface to the caller:
//! configuration problems and state-area corruption.

use thiserror::Error;

/// Alias for `Result<T, SyncError>`.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by the sync pipeline.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The TOML configuration failed to parse.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// A storage operation failed outside the state machine.
    #[error("store error: {0}")]
    Store(#[from] curator_store::StoreError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
