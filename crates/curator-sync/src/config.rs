//! Sync configuration.
//!
//! Deserialized from TOML; every field has a default so an empty document
//! is a valid configuration.

use serde::Deserialize;

use curator_client::Category;

use crate::error::SyncResult;

/// Default seconds between incremental sync passes.
const DEFAULT_INTERVAL_SECS: u64 = 900;

/// Default per-request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 2_800;

/// Settings for the sync pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds between periodic incremental passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Per-request timeout in milliseconds, passed through to the client.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Categories to replicate, in sync order.
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            categories: default_categories(),
        }
    }
}

impl SyncConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> SyncResult<Self> {
        Ok(toml::from_str(raw)?)
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SyncConfig::from_toml_str("").unwrap();
        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert_eq!(config.categories.len(), Category::ALL.len());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            interval_secs = 60
            categories = ["bookmarks", "posts"]
            "#,
        )
        .unwrap();
        assert_eq!(config.interval_secs, 60);
        assert_eq!(
            config.categories,
            vec![Category::Bookmarks, Category::Posts]
        );
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(SyncConfig::from_toml_str("interval_secs = \"soon\"").is_err());
    }
}
