//! Client error types.
//!
//! All remote-API operations surface errors through [`ClientError`]. The
//! variants encode the failure taxonomy the rest of the system dispatches
//! on: rate limits and timeouts are transient (captured as state and
//! retried later), identity rejections are permanent (the caller must stop
//! and ask the user to re-authenticate).

use thiserror::Error;

/// Alias for `Result<T, ClientError>`.
pub type ClientResult<T> = Result<T, ClientError>;

/// Unified error type for the remote API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request exceeded its time limit. Transient.
    #[error("request timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// The remote rejected the call with a rate limit. Transient; carries
    /// the server-provided reset timestamp (unix seconds, 0 if absent).
    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: i64 },

    /// Authentication or identity was rejected. Permanent; do not retry
    /// automatically.
    #[error("identity rejected: {0}")]
    Identity(String),

    /// The remote returned an unexpected HTTP status.
    #[error("unexpected http status {status}")]
    Http { status: u16 },

    /// The transport failed (connection refused, DNS, TLS, ...).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response parsed as JSON but did not carry the expected fields.
    #[error("malformed response: {reason}")]
    Decode { reason: String },
}

impl ClientError {
    /// Whether a retry at a later time can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transience_classification() {
        assert!(ClientError::Timeout { millis: 2800 }.is_transient());
        assert!(ClientError::RateLimited { reset_at: 0 }.is_transient());
        assert!(!ClientError::Identity("expired".into()).is_transient());
        assert!(!ClientError::Http { status: 500 }.is_transient());
    }
}
