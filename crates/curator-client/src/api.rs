//! The remote API seam.
//!
//! [`RemoteApi`] is the async trait the engine and the sync driver program
//! against; [`crate::http::HttpRemoteApi`] is the production implementation
//! and tests substitute scripted mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use curator_store::Record;

use crate::error::ClientResult;

/// A content category the sync pipeline replicates.
///
/// Each category has its own cursor and its own state machine; categories
/// are independent and may sync concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Posts,
    Replies,
    Media,
    Likes,
    Followers,
    Bookmarks,
}

impl Category {
    /// All categories, in default sync order.
    pub const ALL: [Category; 6] = [
        Category::Posts,
        Category::Replies,
        Category::Media,
        Category::Likes,
        Category::Followers,
        Category::Bookmarks,
    ];

    /// Stable lowercase name, used in state keys and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Posts => "posts",
            Category::Replies => "replies",
            Category::Media => "media",
            Category::Likes => "likes",
            Category::Followers => "followers",
            Category::Bookmarks => "bookmarks",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched page of a cursor-paginated timeline.
#[derive(Debug, Clone)]
pub struct TimelinePage {
    /// Records extracted from the page, in timeline order.
    pub items: Vec<Record>,
    /// Continuation cursor for the next page, if the response carried one.
    pub next_cursor: Option<String>,
}

/// The calls the core needs from the remote service.
///
/// Everything else the remote API offers is out of scope; implementations
/// extract only the small field set the core consumes (items, continuation
/// cursor, generated post id, rate-limit reset).
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetch one page of `category` for `owner_id`, resuming at `cursor`.
    async fn fetch_page(
        &self,
        category: Category,
        owner_id: &str,
        cursor: Option<&str>,
    ) -> ClientResult<TimelinePage>;

    /// Publish a reply to `reply_target_id` with the given text; returns the
    /// generated post id.
    async fn create_post(&self, text: &str, reply_target_id: &str) -> ClientResult<String>;

    /// Fetch the conversation thread rooted at `remote_id`. `None` when the
    /// remote reports no conversation.
    async fn fetch_conversation(
        &self,
        remote_id: &str,
    ) -> ClientResult<Option<serde_json::Value>>;

    /// Fetch the full detail of a single item. `None` when the item no
    /// longer exists remotely.
    async fn fetch_detail(&self, owner_id: &str, remote_id: &str)
    -> ClientResult<Option<Record>>;
}
