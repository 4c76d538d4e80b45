//! Workflow model and matcher.
//!
//! A [`Workflow`] binds a trigger (`when`) to an ordered list of actions
//! (`then_list`). Workflow definitions are authored and persisted by the
//! presentation layer; during matching the engine reads them without
//! mutating them.
//!
//! Matching is a linear scan returning the **first** workflow whose `when`
//! equals the classified trigger. Storage may hold several workflows on the
//! same trigger, but only the first in stored order ever applies; this
//! single-active-rule behavior is deliberate and pinned by a test below.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use curator_client::wire;
use curator_store::StateStore;

use crate::error::EngineResult;
use crate::trigger::{self, InterceptedCall, Trigger};

/// State key the workflow list is persisted under.
pub const WORKFLOWS_STATE_KEY: &str = "workflows";

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// The kind of side effect an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Fetch and attach the full conversation of the target item.
    UnrollThread,
    /// Remove the local copy of the target bookmark.
    DeleteBookmark,
    /// Post a configured reply to the target item.
    AutoComment,
    /// Download the target item's best media variant.
    DownloadMedia,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::UnrollThread => "unroll_thread",
            ActionKind::DeleteBookmark => "delete_bookmark",
            ActionKind::AutoComment => "auto_comment",
            ActionKind::DownloadMedia => "download_media",
        };
        f.write_str(name)
    }
}

/// A configured action inside a workflow's `then_list`.
///
/// `inputs` carries content for content-bearing actions (the auto-comment
/// text) and stays empty for parameterless ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,
}

impl Action {
    /// A parameterless action.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
        }
    }

    /// A content-bearing action with one input.
    pub fn with_input(kind: ActionKind, input: impl Into<String>) -> Self {
        Self {
            kind,
            inputs: vec![input.into()],
        }
    }
}

/// A persisted trigger → action-list binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Opaque token generated at creation.
    pub id: String,
    /// User-chosen display name.
    pub name: String,
    /// The trigger this workflow reacts to.
    pub when: Trigger,
    /// Ordered actions to run when the trigger fires.
    pub then_list: Vec<Action>,
    /// Whether the editor currently allows changes.
    #[serde(default)]
    pub editable: bool,
}

impl Workflow {
    /// Create a new workflow reacting to `when`.
    pub fn new(name: impl Into<String>, when: Trigger) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            when,
            then_list: Vec::new(),
            editable: true,
        }
    }

    /// Append an action, replacing any existing action of the same kind.
    ///
    /// A workflow holds at most one action per kind.
    pub fn add_action(&mut self, action: Action) {
        self.then_list.retain(|a| a.kind != action.kind);
        self.then_list.push(action);
    }

    /// Replace the action at `index`, removing any other action of the new
    /// action's kind elsewhere in the list.
    pub fn set_action(&mut self, index: usize, action: Action) {
        if index >= self.then_list.len() {
            return;
        }
        let kind = action.kind;
        self.then_list[index] = action;
        // Drop a same-kind duplicate that lived at another position.
        if let Some(dup) = self
            .then_list
            .iter()
            .enumerate()
            .position(|(i, a)| i != index && a.kind == kind)
        {
            self.then_list.remove(dup);
        }
    }

    /// Whether the in-memory workflow equals its last-persisted copy.
    ///
    /// A derived view-state flag, recomputed on read or edit — never stored.
    /// A workflow that was never persisted counts as unchanged while it is
    /// still blank (no name or no actions).
    pub fn is_unchanged(&self, persisted: Option<&Workflow>) -> bool {
        match persisted {
            Some(p) => self.name == p.name && self.when == p.when && self.then_list == p.then_list,
            None => self.name.is_empty() || self.then_list.is_empty(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Matching
// ═══════════════════════════════════════════════════════════════════════

/// Return the first workflow in stored order whose `when` equals `trigger`.
pub fn first_match(workflows: &[Workflow], trigger: Trigger) -> Option<&Workflow> {
    workflows.iter().find(|w| w.when == trigger)
}

/// Resolve the target id of an intercepted call, per its trigger.
///
/// Returns `None` when no rule yields a usable id; the caller logs and
/// drops the event — an unresolved target is never an error.
pub fn resolve_target_id(call: &InterceptedCall) -> Option<String> {
    match call.trigger {
        // The id the server assigned to the newly created post.
        Trigger::CreatePost => wire::created_post_id(&call.response.body),
        // The quoted post, parsed from the attachment URL.
        Trigger::CreateQuote => {
            trigger::attachment_url(&call.request.body).and_then(last_path_segment)
        }
        // Prefer the server-assigned id of the reply itself, fall back to
        // the post being replied to.
        Trigger::CreateReply => wire::created_post_id(&call.response.body)
            .or_else(|| trigger::reply_target(&call.request.body).map(str::to_owned)),
        Trigger::CreateRepost | Trigger::CreateBookmark | Trigger::DeleteBookmark => {
            trigger::explicit_target(&call.request.body).map(str::to_owned)
        }
    }
}

/// Last non-empty path segment of a URL, tolerating bare paths.
fn last_path_segment(raw: &str) -> Option<String> {
    if let Ok(parsed) = url::Url::parse(raw) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).next_back() {
                return Some(last.to_owned());
            }
        }
        return None;
    }
    raw.rsplit('/')
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

// ═══════════════════════════════════════════════════════════════════════
//  Editor helpers
// ═══════════════════════════════════════════════════════════════════════

/// First trigger not yet used by any workflow, so a freshly added workflow
/// starts on something unclaimed. Falls back to [`Trigger::CreateBookmark`]
/// when every trigger is taken.
pub fn unused_trigger(workflows: &[Workflow]) -> Trigger {
    let used: std::collections::HashSet<Trigger> = workflows.iter().map(|w| w.when).collect();
    Trigger::ALL
        .into_iter()
        .find(|t| !used.contains(t))
        .unwrap_or(Trigger::CreateBookmark)
}

/// The workflows a fresh installation starts with.
pub fn default_workflows() -> Vec<Workflow> {
    let mut unroll = Workflow::new("Unroll bookmarked threads", Trigger::CreateBookmark);
    unroll.add_action(Action::new(ActionKind::UnrollThread));
    vec![unroll]
}

// ═══════════════════════════════════════════════════════════════════════
//  Persistence
// ═══════════════════════════════════════════════════════════════════════

/// Load the persisted workflow list, seeding the defaults when storage
/// holds none.
pub async fn load_workflows(state: &StateStore) -> EngineResult<Vec<Workflow>> {
    let stored: Option<Vec<Workflow>> = state.get_json(WORKFLOWS_STATE_KEY).await?;
    match stored {
        Some(workflows) if !workflows.is_empty() => Ok(workflows),
        _ => {
            let defaults = default_workflows();
            state.set_json(WORKFLOWS_STATE_KEY, &defaults).await?;
            debug!(count = defaults.len(), "seeded default workflows");
            Ok(defaults)
        }
    }
}

/// Persist one workflow: replace the stored copy with the same id, or
/// prepend when it is new. Returns the updated list.
pub async fn save_workflow(state: &StateStore, workflow: Workflow) -> EngineResult<Vec<Workflow>> {
    let mut workflows: Vec<Workflow> = state
        .get_json(WORKFLOWS_STATE_KEY)
        .await?
        .unwrap_or_default();

    match workflows.iter().position(|w| w.id == workflow.id) {
        Some(index) => workflows[index] = workflow,
        None => workflows.insert(0, workflow),
    }

    state.set_json(WORKFLOWS_STATE_KEY, &workflows).await?;
    Ok(workflows)
}

/// Remove a workflow by id. Returns the updated list.
pub async fn remove_workflow(state: &StateStore, id: &str) -> EngineResult<Vec<Workflow>> {
    let mut workflows: Vec<Workflow> = state
        .get_json(WORKFLOWS_STATE_KEY)
        .await?
        .unwrap_or_default();
    workflows.retain(|w| w.id != id);
    state.set_json(WORKFLOWS_STATE_KEY, &workflows).await?;
    Ok(workflows)
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::{RequestEnvelope, ResponseEnvelope};
    use curator_store::Database;
    use serde_json::{Value, json};

    fn call(trigger: Trigger, request_body: Value, response_body: Value) -> InterceptedCall {
        InterceptedCall {
            trigger,
            request: RequestEnvelope {
                url: "/api".into(),
                method: "POST".into(),
                body: request_body,
            },
            response: ResponseEnvelope {
                status: 200,
                body: response_body,
            },
        }
    }

    #[test]
    fn first_match_ignores_later_duplicates() {
        // Storage may hold several workflows on the same trigger; only the
        // first in stored order applies.
        let mut first = Workflow::new("first", Trigger::CreateBookmark);
        first.add_action(Action::new(ActionKind::UnrollThread));
        let mut second = Workflow::new("second", Trigger::CreateBookmark);
        second.add_action(Action::new(ActionKind::DownloadMedia));

        let workflows = vec![first.clone(), second];
        let matched = first_match(&workflows, Trigger::CreateBookmark).unwrap();
        assert_eq!(matched.id, first.id);
        assert_eq!(matched.then_list[0].kind, ActionKind::UnrollThread);
    }

    #[test]
    fn no_match_is_none() {
        let workflows = default_workflows();
        assert!(first_match(&workflows, Trigger::CreateRepost).is_none());
    }

    #[test]
    fn add_action_replaces_same_kind() {
        let mut wf = Workflow::new("wf", Trigger::CreateBookmark);
        wf.add_action(Action::with_input(ActionKind::AutoComment, "old"));
        wf.add_action(Action::new(ActionKind::UnrollThread));
        wf.add_action(Action::with_input(ActionKind::AutoComment, "new"));

        assert_eq!(wf.then_list.len(), 2);
        let comment = wf
            .then_list
            .iter()
            .find(|a| a.kind == ActionKind::AutoComment)
            .unwrap();
        assert_eq!(comment.inputs, vec!["new".to_string()]);
    }

    #[test]
    fn set_action_drops_duplicate_at_other_position() {
        let mut wf = Workflow::new("wf", Trigger::CreateBookmark);
        wf.add_action(Action::new(ActionKind::UnrollThread));
        wf.add_action(Action::new(ActionKind::DeleteBookmark));

        // Turn the second slot into UnrollThread: the original UnrollThread
        // at slot 0 must go.
        wf.set_action(1, Action::new(ActionKind::UnrollThread));
        assert_eq!(wf.then_list.len(), 1);
        assert_eq!(wf.then_list[0].kind, ActionKind::UnrollThread);
    }

    #[test]
    fn unchanged_against_persisted_copy() {
        let mut wf = Workflow::new("wf", Trigger::CreateBookmark);
        wf.add_action(Action::new(ActionKind::UnrollThread));
        let persisted = wf.clone();

        assert!(wf.is_unchanged(Some(&persisted)));

        wf.name = "renamed".into();
        assert!(!wf.is_unchanged(Some(&persisted)));
    }

    #[test]
    fn blank_new_workflow_counts_as_unchanged() {
        let wf = Workflow::new("", Trigger::CreateBookmark);
        assert!(wf.is_unchanged(None));

        let mut named = Workflow::new("named", Trigger::CreateBookmark);
        assert!(named.is_unchanged(None)); // no actions yet
        named.add_action(Action::new(ActionKind::UnrollThread));
        assert!(!named.is_unchanged(None));
    }

    #[test]
    fn unused_trigger_prefers_first_free() {
        let workflows = vec![Workflow::new("a", Trigger::CreatePost)];
        assert_eq!(unused_trigger(&workflows), Trigger::CreateQuote);
    }

    #[test]
    fn unused_trigger_falls_back_to_bookmark() {
        let workflows: Vec<Workflow> = Trigger::ALL
            .into_iter()
            .map(|t| Workflow::new("w", t))
            .collect();
        assert_eq!(unused_trigger(&workflows), Trigger::CreateBookmark);
    }

    // ── target resolution ────────────────────────────────────────────

    #[test]
    fn quote_target_from_attachment_url() {
        let c = call(
            Trigger::CreateQuote,
            json!({ "variables": { "attachment_url": "https://example.com/user/status/42" } }),
            json!({}),
        );
        assert_eq!(resolve_target_id(&c).as_deref(), Some("42"));
    }

    #[test]
    fn reply_target_falls_back_to_request() {
        // No server-assigned id in the response: use the reply-target id.
        let c = call(
            Trigger::CreateReply,
            json!({ "variables": { "reply": { "in_reply_to_post_id": "7" } } }),
            json!({}),
        );
        assert_eq!(resolve_target_id(&c).as_deref(), Some("7"));
    }

    #[test]
    fn reply_target_prefers_generated_id() {
        let c = call(
            Trigger::CreateReply,
            json!({ "variables": { "reply": { "in_reply_to_post_id": "7" } } }),
            json!({ "data": { "create_post": { "result": { "rest_id": "99" } } } }),
        );
        assert_eq!(resolve_target_id(&c).as_deref(), Some("99"));
    }

    #[test]
    fn bookmark_target_from_request() {
        let c = call(
            Trigger::DeleteBookmark,
            json!({ "variables": { "post_id": "5" } }),
            json!({}),
        );
        assert_eq!(resolve_target_id(&c).as_deref(), Some("5"));
    }

    #[test]
    fn unresolvable_target_is_none() {
        let c = call(Trigger::CreateQuote, json!({ "variables": {} }), json!({}));
        assert!(resolve_target_id(&c).is_none());
    }

    // ── persistence ──────────────────────────────────────────────────

    async fn setup_state() -> StateStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        StateStore::new(db)
    }

    #[tokio::test]
    async fn load_seeds_defaults_once() {
        let state = setup_state().await;

        let first = load_workflows(&state).await.unwrap();
        assert!(!first.is_empty());

        let second = load_workflows(&state).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn save_replaces_by_id_and_prepends_new() {
        let state = setup_state().await;
        let mut wf = Workflow::new("mine", Trigger::CreateRepost);
        wf.add_action(Action::new(ActionKind::DownloadMedia));

        let list = save_workflow(&state, wf.clone()).await.unwrap();
        assert_eq!(list[0].id, wf.id);

        wf.name = "renamed".into();
        let list = save_workflow(&state, wf.clone()).await.unwrap();
        assert_eq!(list.iter().filter(|w| w.id == wf.id).count(), 1);
        assert_eq!(list[0].name, "renamed");
    }

    #[tokio::test]
    async fn remove_workflow_by_id() {
        let state = setup_state().await;
        let wf = Workflow::new("gone", Trigger::CreateRepost);
        save_workflow(&state, wf.clone()).await.unwrap();

        let list = remove_workflow(&state, &wf.id).await.unwrap();
        assert!(list.iter().all(|w| w.id != wf.id));
    }
}
