//! Engine error types.
//!
//! All engine subsystems surface errors through [`EngineError`]. Storage
//! and remote failures convert via `#[from]`; collaborator hand-offs (the
//! download sink) report through a dedicated variant.

use thiserror::Error;

/// Alias for `Result<T, EngineError>`.
pub type EngineResult<T> = Result<T, EngineError>;

/// Unified error type for the workflow engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A storage operation failed.
    #[error("store error: {0}")]
    Store(#[from] curator_store::StoreError),

    /// A remote API call failed.
    #[error("client error: {0}")]
    Client(#[from] curator_client::ClientError),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external collaborator (e.g. the download sink) failed.
    #[error("collaborator error: {0}")]
    Collaborator(String),
}
