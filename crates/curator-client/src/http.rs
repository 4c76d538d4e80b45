//! HTTP implementation of the remote API seam.
//!
//! Wraps `reqwest` with a per-request timeout and maps HTTP-level failures
//! into the [`ClientError`] taxonomy: 401/403 → identity rejected,
//! 429 → rate limited (with the server's reset header), everything else
//! non-2xx → a plain status error.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use curator_store::Record;

use crate::api::{Category, RemoteApi, TimelinePage};
use crate::error::{ClientError, ClientResult};
use crate::wire;

/// Header carrying the unix timestamp at which a rate limit window resets.
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Default per-request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 2_800;

/// Page size requested from timeline endpoints.
const PAGE_COUNT: u32 = 100;

/// Connection settings for [`HttpRemoteApi`].
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the remote service.
    pub base_url: String,
    /// Bearer token presented on every call.
    pub bearer_token: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Production [`RemoteApi`] implementation over HTTP.
pub struct HttpRemoteApi {
    config: ClientConfig,
    client: reqwest::Client,
}

impl HttpRemoteApi {
    /// Create a new client from `config`.
    pub fn new(config: ClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("curator/0.1")
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// The timeline endpoint name for a category.
    fn endpoint(category: Category) -> &'static str {
        match category {
            Category::Posts => "UserPosts",
            Category::Replies => "UserReplies",
            Category::Media => "UserMedia",
            Category::Likes => "UserLikes",
            Category::Followers => "UserFollowers",
            Category::Bookmarks => "Bookmarks",
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{endpoint}", self.config.base_url.trim_end_matches('/'))
    }

    /// Send a prepared request, mapping transport and status failures.
    async fn send(&self, builder: reqwest::RequestBuilder) -> ClientResult<Value> {
        let timeout = std::time::Duration::from_millis(self.config.timeout_ms);
        let response = builder
            .bearer_auth(&self.config.bearer_token)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout {
                        millis: self.config.timeout_ms,
                    }
                } else {
                    ClientError::Network(e)
                }
            })?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                return Err(ClientError::Identity(format!(
                    "remote rejected credentials with status {status}"
                )));
            }
            429 => {
                let reset_at = rate_limit_reset(response.headers());
                return Err(ClientError::RateLimited { reset_at });
            }
            code => return Err(ClientError::Http { status: code }),
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn fetch_page(
        &self,
        category: Category,
        owner_id: &str,
        cursor: Option<&str>,
    ) -> ClientResult<TimelinePage> {
        let mut query = vec![
            ("owner_id", owner_id.to_owned()),
            ("count", PAGE_COUNT.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_owned()));
        }

        debug!(category = %category, cursor = cursor.unwrap_or(""), "fetching timeline page");
        let body = self
            .send(self.client.get(self.url(Self::endpoint(category))).query(&query))
            .await?;

        let fetched_at = chrono::Utc::now().timestamp();
        let items = wire::page_items(&body)
            .iter()
            .filter_map(|item| wire::item_to_record(item, owner_id, category.as_str(), fetched_at))
            .collect();

        Ok(TimelinePage {
            items,
            next_cursor: wire::page_cursor(&body),
        })
    }

    async fn create_post(&self, text: &str, reply_target_id: &str) -> ClientResult<String> {
        let body = json!({
            "variables": {
                "post_text": text,
                "reply": { "in_reply_to_post_id": reply_target_id },
            }
        });

        debug!(reply_target_id, "creating reply post");
        let response = self
            .send(self.client.post(self.url("CreatePost")).json(&body))
            .await?;

        wire::created_post_id(&response).ok_or_else(|| ClientError::Decode {
            reason: "create_post response carried no rest_id".into(),
        })
    }

    async fn fetch_conversation(
        &self,
        remote_id: &str,
    ) -> ClientResult<Option<serde_json::Value>> {
        let body = self
            .send(
                self.client
                    .get(self.url("ConversationDetail"))
                    .query(&[("post_id", remote_id)]),
            )
            .await?;
        Ok(wire::conversation_thread(&body))
    }

    async fn fetch_detail(
        &self,
        owner_id: &str,
        remote_id: &str,
    ) -> ClientResult<Option<Record>> {
        let result = self
            .send(
                self.client
                    .get(self.url("PostDetail"))
                    .query(&[("post_id", remote_id)]),
            )
            .await;

        let body = match result {
            Ok(body) => body,
            // A deleted item is an expected outcome, not a failure.
            Err(ClientError::Http { status: 404 }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let item = body
            .get("data")
            .and_then(|d| d.get("post"))
            .and_then(|p| p.get("result"))
            .cloned()
            .unwrap_or(Value::Null);

        let fetched_at = chrono::Utc::now().timestamp();
        Ok(wire::item_to_record(&item, owner_id, "detail", fetched_at))
    }
}

/// Parse the rate-limit reset header, 0 when absent or malformed.
fn rate_limit_reset(headers: &HeaderMap) -> i64 {
    headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

// ── tests ────────────────────────────────────────────────────────────
