//! Trigger classification — turn an intercepted call into a semantic event.
//!
//! A [`Trigger`] names the user action observed on the wire. Most watched
//! endpoints map 1:1 to a trigger; the create-post endpoint is overloaded
//! and is disambiguated by the request body, in a fixed priority order:
//!
//! 1. a reply-target field makes it a [`Trigger::CreateReply`],
//! 2. else an attachment/quote URL makes it a [`Trigger::CreateQuote`],
//! 3. else it is a plain [`Trigger::CreatePost`].
//!
//! [`classify`] is pure, total, and side-effect-free; unrecognized
//! endpoints yield `None` and are discarded upstream, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A classified semantic user action observed on the wire.
///
/// Derived from the intercepted call, never persisted on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    CreatePost,
    CreateQuote,
    CreateReply,
    CreateRepost,
    CreateBookmark,
    DeleteBookmark,
}

impl Trigger {
    /// All triggers, in the order the workflow editor offers them.
    pub const ALL: [Trigger; 6] = [
        Trigger::CreatePost,
        Trigger::CreateQuote,
        Trigger::CreateReply,
        Trigger::CreateRepost,
        Trigger::CreateBookmark,
        Trigger::DeleteBookmark,
    ];
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Trigger::CreatePost => "create_post",
            Trigger::CreateQuote => "create_quote",
            Trigger::CreateReply => "create_reply",
            Trigger::CreateRepost => "create_repost",
            Trigger::CreateBookmark => "create_bookmark",
            Trigger::DeleteBookmark => "delete_bookmark",
        };
        f.write_str(name)
    }
}

/// Endpoint operation names the observer watches for.
pub const WATCHED_ENDPOINTS: [&str; 4] =
    ["CreatePost", "CreateRepost", "CreateBookmark", "DeleteBookmark"];

/// The captured request half of an intercepted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub url: String,
    pub method: String,
    pub body: Value,
}

/// The captured response half of an intercepted call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub body: Value,
}

/// A normalized `(trigger, request, response)` triple.
///
/// Transient: exists only for the duration of classification and matching.
#[derive(Debug, Clone)]
pub struct InterceptedCall {
    pub trigger: Trigger,
    pub request: RequestEnvelope,
    pub response: ResponseEnvelope,
}

/// Classify an endpoint call into a trigger.
///
/// Returns `None` for endpoints outside the watch-list — most of the host
/// page's traffic is expected not to match.
pub fn classify(endpoint: &str, body: &Value) -> Option<Trigger> {
    match endpoint {
        "CreatePost" => {
            if reply_target(body).is_some() {
                Some(Trigger::CreateReply)
            } else if attachment_url(body).is_some() {
                Some(Trigger::CreateQuote)
            } else {
                Some(Trigger::CreatePost)
            }
        }
        "CreateRepost" => Some(Trigger::CreateRepost),
        "CreateBookmark" => Some(Trigger::CreateBookmark),
        "DeleteBookmark" => Some(Trigger::DeleteBookmark),
        _ => None,
    }
}

// ── request body accessors ───────────────────────────────────────────

/// The reply-target id carried by a reply request, if any.
pub fn reply_target(body: &Value) -> Option<&str> {
    body.get("variables")?
        .get("reply")?
        .get("in_reply_to_post_id")?
        .as_str()
}

/// The attachment/quote-source URL carried by a quote request, if any.
pub fn attachment_url(body: &Value) -> Option<&str> {
    body.get("variables")?.get("attachment_url")?.as_str()
}

/// The explicit target id carried by repost/bookmark requests.
pub fn explicit_target(body: &Value) -> Option<&str> {
    body.get("variables")?.get("post_id")?.as_str()
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_post_with_reply_field_is_reply() {
        let body = json!({ "variables": { "reply": { "in_reply_to_post_id": "123" } } });
        assert_eq!(classify("CreatePost", &body), Some(Trigger::CreateReply));
    }

    #[test]
    fn create_post_with_attachment_is_quote() {
        let body = json!({ "variables": { "attachment_url": "https://example.com/status/42" } });
        assert_eq!(classify("CreatePost", &body), Some(Trigger::CreateQuote));
    }

    #[test]
    fn reply_field_wins_over_attachment() {
        // Both fields present: the reply predicate is evaluated first.
        let body = json!({ "variables": {
            "reply": { "in_reply_to_post_id": "123" },
            "attachment_url": "https://example.com/status/42",
        } });
        assert_eq!(classify("CreatePost", &body), Some(Trigger::CreateReply));
    }

    #[test]
    fn plain_create_post() {
        let body = json!({ "variables": {} });
        assert_eq!(classify("CreatePost", &body), Some(Trigger::CreatePost));
    }

    #[test]
    fn one_to_one_endpoints() {
        let body = json!({ "variables": { "post_id": "9" } });
        assert_eq!(classify("CreateRepost", &body), Some(Trigger::CreateRepost));
        assert_eq!(classify("CreateBookmark", &body), Some(Trigger::CreateBookmark));
        assert_eq!(classify("DeleteBookmark", &body), Some(Trigger::DeleteBookmark));
    }

    #[test]
    fn unknown_endpoint_is_none() {
        let body = json!({ "variables": {} });
        assert_eq!(classify("HomeTimeline", &body), None);
        assert_eq!(classify("", &body), None);
    }

    #[test]
    fn classify_tolerates_malformed_bodies() {
        // Total over its input space: a body with none of the expected
        // structure still classifies.
        assert_eq!(classify("CreatePost", &json!(null)), Some(Trigger::CreatePost));
        assert_eq!(classify("CreatePost", &json!("junk")), Some(Trigger::CreatePost));
    }
}
