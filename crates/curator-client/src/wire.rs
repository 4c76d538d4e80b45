//! Wire-format extraction.
//!
//! Pure helpers that pull the small field set the core cares about out of
//! the remote API's JSON payloads. Everything else in a payload is treated
//! as opaque and carried through untouched.
//!
//! Shapes handled here:
//!
//! - **Timeline page** — `data.timeline.instructions[]`, each instruction
//!   carrying an `entries[]` array. An entry is either a single item
//!   (`content.item`), a module of items (`content.items[]`), or a cursor
//!   (`content.cursor_type` + `content.value`). Only the `"Bottom"` cursor
//!   continues pagination.
//! - **Item** — `rest_id`, `author_handle`, `full_text`, optional `folder`,
//!   `created_at`, optional `sort_index`, optional `media` variants.
//! - **Create-post response** — `data.create_post.result.rest_id`.
//! - **Conversation response** — `data.conversation.entries[]`.

use serde_json::Value;

use curator_store::Record;

/// Collect the item objects of a timeline page, flattening module entries,
/// in the order the server returned them.
pub fn page_items(body: &Value) -> Vec<Value> {
    let mut items = Vec::new();
    for entry in entries(body) {
        let Some(content) = entry.get("content") else {
            continue;
        };
        if let Some(item) = content.get("item") {
            items.push(item.clone());
        } else if let Some(module) = content.get("items").and_then(Value::as_array) {
            for module_entry in module {
                if let Some(item) = module_entry.get("item") {
                    items.push(item.clone());
                }
            }
        }
    }
    items
}

/// Extract the bottom continuation cursor of a timeline page, if present.
pub fn page_cursor(body: &Value) -> Option<String> {
    for entry in entries(body) {
        let Some(content) = entry.get("content") else {
            continue;
        };
        if content.get("cursor_type").and_then(Value::as_str) == Some("Bottom") {
            return content
                .get("value")
                .and_then(Value::as_str)
                .map(str::to_owned);
        }
    }
    None
}

/// Map a timeline item into a [`Record`] owned by `owner_id`.
///
/// Returns `None` when the item lacks a `rest_id` — tombstones and ad slots
/// appear in timelines and are simply skipped.
pub fn item_to_record(
    item: &Value,
    owner_id: &str,
    category: &str,
    fetched_at: i64,
) -> Option<Record> {
    let remote_id = item.get("rest_id")?.as_str()?.to_owned();
    let created_at = item.get("created_at").and_then(Value::as_i64).unwrap_or(0);
    let sort_index = item
        .get("sort_index")
        .and_then(Value::as_str)
        .map(str::to_owned)
        // The remote omits sort_index on some surfaces; creation time keeps
        // the timeline ordering stable.
        .unwrap_or_else(|| created_at.to_string());

    Some(Record {
        id: Record::composite_id(owner_id, &remote_id),
        owner_id: owner_id.to_owned(),
        remote_id,
        author_handle: item
            .get("author_handle")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        full_text: item
            .get("full_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        folder: item
            .get("folder")
            .and_then(Value::as_str)
            .map(str::to_owned),
        category: Some(category.to_owned()),
        conversations: None,
        media: item.get("media").cloned(),
        sort_index,
        created_at,
        fetched_at,
    })
}

/// The id the server assigned to a just-created post, if the response
/// carries one.
pub fn created_post_id(body: &Value) -> Option<String> {
    body.get("data")?
        .get("create_post")?
        .get("result")?
        .get("rest_id")?
        .as_str()
        .map(str::to_owned)
}

/// The conversation thread of a conversation response; `None` when the
/// remote reports no entries.
pub fn conversation_thread(body: &Value) -> Option<Value> {
    let entries = body.get("data")?.get("conversation")?.get("entries")?;
    match entries.as_array() {
        Some(list) if !list.is_empty() => Some(entries.clone()),
        _ => None,
    }
}

/// Pick the highest-quality downloadable variant from a record's `media`
/// value.
///
/// Variant lists are ordered lowest-quality first, so the last variant wins.
/// Prefers a video entry; falls back to the first entry that has variants.
pub fn best_media_url(media: &Value) -> Option<String> {
    let list = media.as_array()?;
    let entry = list
        .iter()
        .find(|m| m.get("kind").and_then(Value::as_str) == Some("video"))
        .or_else(|| list.iter().find(|m| m.get("variants").is_some()))?;
    entry
        .get("variants")?
        .as_array()?
        .last()?
        .get("url")?
        .as_str()
        .map(str::to_owned)
}

// ── internals ────────────────────────────────────────────────────────

/// Flatten the entry arrays of every instruction in a timeline response.
fn entries(body: &Value) -> impl Iterator<Item = &Value> {
    body.get("data")
        .and_then(|d| d.get("timeline"))
        .and_then(|t| t.get("instructions"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|instruction| instruction.get("entries").and_then(Value::as_array))
        .flatten()
}

// ── tests ────────────────────────────────────────────────────────────
