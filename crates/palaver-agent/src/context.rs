//! Conversation-context resolution.
//!
//! Turns "what the user asked for" (flags, defaults, stored history) into a
//! single [`ConversationContext`] the agent loop consumes. Resolution is
//! pure once the candidate entry is loaded, so every inheritance rule is
//! unit-testable without a network.

use tracing::{debug, warn};

use palaver_core::config::DefaultsConfig;
use palaver_core::history::{HistoryEntry, HistoryError, HistoryStore, ResumeMode, ResumeSummary};
use palaver_core::types::{Effort, Message, Verbosity};
use palaver_core::utils::derive_title;

/// What the user explicitly asked for on this request. `None` means the
/// flag was not given and the value is inherited.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub model: Option<String>,
    pub effort: Option<Effort>,
    pub verbosity: Option<Verbosity>,
    /// `--continue`: reattach to the most recently updated conversation.
    pub continue_latest: bool,
    /// `--resume N`: reattach to the conversation at history ordinal `N`.
    pub resume_ordinal: Option<usize>,
}

/// Everything the agent loop and finalize pipeline need to know about the
/// conversation this request belongs to.
#[derive(Clone, Debug)]
pub struct ConversationContext {
    /// True when the request starts a fresh response-id chain. The system
    /// prompt is only sent for new conversations.
    pub is_new_conversation: bool,
    /// Response id to chain onto, if any.
    pub previous_response_id: Option<String>,
    /// The matched entry's `last_response_id`, used by the history upsert
    /// to find the entry again even after compaction severed the chain.
    pub active_last_response_id: Option<String>,
    /// Title of the continued entry, if any.
    pub previous_title: Option<String>,
    pub title: String,
    /// Compaction summary carried into this request, if the continued entry
    /// had one.
    pub resume_summary: Option<ResumeSummary>,
    /// Messages injected before the user's new text. At most one synthetic
    /// system message carrying a compaction summary.
    pub resume_base_messages: Vec<Message>,
    pub model: String,
    pub effort: Effort,
    pub verbosity: Verbosity,
}

impl ConversationContext {
    /// The input list for the first model request of this turn.
    pub fn initial_messages(&self, user_text: &str) -> Vec<Message> {
        let mut messages = self.resume_base_messages.clone();
        messages.push(Message::user(user_text));
        messages
    }
}

/// Resolve the conversation context for one request.
///
/// Inheritance is per field: each of model, effort and verbosity falls back
/// from explicit flag to the continued entry's stored value to the config
/// default, independently of the others.
pub fn resolve_context(
    options: &RequestOptions,
    defaults: &DefaultsConfig,
    store: &HistoryStore,
    input_text: &str,
) -> Result<ConversationContext, HistoryError> {
    let active = find_active_entry(options, store)?;
    let continuing = active.is_some();

    let model = options
        .model
        .clone()
        .or_else(|| active.as_ref().map(|e| e.model.clone()))
        .unwrap_or_else(|| defaults.model.clone());
    let effort = options
        .effort
        .or_else(|| active.as_ref().map(|e| e.effort))
        .unwrap_or(defaults.effort);
    let verbosity = options
        .verbosity
        .or_else(|| active.as_ref().map(|e| e.verbosity))
        .unwrap_or(defaults.verbosity);

    let mut previous_response_id = active
        .as_ref()
        .map(|e| e.last_response_id.clone())
        .filter(|id| !id.is_empty());
    let mut new_request_resume = false;
    let mut resume_base_messages = Vec::new();
    let mut resume_summary = None;

    if let Some(resume) = active.as_ref().and_then(|e| e.resume.as_ref()) {
        if let Some(id) = resume
            .previous_response_id
            .as_ref()
            .filter(|id| !id.is_empty())
        {
            previous_response_id = Some(id.clone());
        }
        if resume.mode == Some(ResumeMode::NewRequest) {
            // Compaction severed the chain; resume from the summary alone.
            previous_response_id = None;
            new_request_resume = true;
        }
        if let Some(summary) = &resume.summary {
            resume_base_messages.push(Message::system(&summary.text));
            resume_summary = Some(summary.clone());
        }
    }

    let is_new_conversation =
        !continuing || (previous_response_id.is_none() && !new_request_resume);

    let previous_title = active.as_ref().map(|e| e.title.clone());
    let title = match &previous_title {
        Some(title) => title.clone(),
        None => derive_title(input_text),
    };

    debug!(
        continuing,
        is_new_conversation,
        chained = previous_response_id.is_some(),
        %model,
        "resolved conversation context"
    );

    Ok(ConversationContext {
        is_new_conversation,
        previous_response_id,
        active_last_response_id: active.map(|e| e.last_response_id),
        previous_title,
        title,
        resume_summary,
        resume_base_messages,
        model,
        effort,
        verbosity,
    })
}

fn find_active_entry(
    options: &RequestOptions,
    store: &HistoryStore,
) -> Result<Option<HistoryEntry>, HistoryError> {
    if let Some(n) = options.resume_ordinal {
        return store.select_by_number(n).map(Some);
    }
    if options.continue_latest {
        let latest = store.find_latest()?;
        if latest.is_none() {
            warn!("no stored conversation to continue; starting a new one");
        }
        return Ok(latest);
    }
    Ok(None)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use palaver_core::history::{ResumeState, ResumeSummary};

    fn entry(title: &str, last_id: &str, age_minutes: i64) -> HistoryEntry {
        let at = Utc::now() - Duration::minutes(age_minutes);
        HistoryEntry {
            title: title.into(),
            model: "o4-mini".into(),
            effort: Effort::High,
            verbosity: Verbosity::Low,
            created_at: at,
            updated_at: at,
            first_response_id: "resp_first".into(),
            last_response_id: last_id.into(),
            request_count: 1,
            resume: None,
            turns: Vec::new(),
            context: None,
        }
    }

    fn store_with(entries: Vec<HistoryEntry>) -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        store.save_entries(&entries).unwrap();
        (dir, store)
    }

    #[test]
    fn test_fresh_request_uses_defaults() {
        let (_dir, store) = store_with(vec![]);
        let ctx = resolve_context(
            &RequestOptions::default(),
            &DefaultsConfig::default(),
            &store,
            "explain lifetimes in rust please",
        )
        .unwrap();

        assert!(ctx.is_new_conversation);
        assert!(ctx.previous_response_id.is_none());
        assert_eq!(ctx.model, "gpt-5");
        assert_eq!(ctx.effort, Effort::Medium);
        assert_eq!(ctx.title, "explain lifetimes in rust please");
        assert!(ctx.resume_base_messages.is_empty());
    }

    #[test]
    fn test_continue_picks_most_recently_updated() {
        let (_dir, store) = store_with(vec![
            entry("old", "resp_old", 60),
            entry("fresh", "resp_fresh", 1),
        ]);
        let options = RequestOptions {
            continue_latest: true,
            ..Default::default()
        };
        let ctx =
            resolve_context(&options, &DefaultsConfig::default(), &store, "and then?").unwrap();

        assert!(!ctx.is_new_conversation);
        assert_eq!(ctx.previous_response_id.as_deref(), Some("resp_fresh"));
        assert_eq!(ctx.title, "fresh");
    }

    #[test]
    fn test_continue_with_empty_history_starts_new() {
        let (_dir, store) = store_with(vec![]);
        let options = RequestOptions {
            continue_latest: true,
            ..Default::default()
        };
        let ctx =
            resolve_context(&options, &DefaultsConfig::default(), &store, "hello").unwrap();

        assert!(ctx.is_new_conversation);
        assert!(ctx.previous_response_id.is_none());
    }

    #[test]
    fn test_resume_ordinal_selects_entry() {
        let (_dir, store) = store_with(vec![
            entry("old", "resp_old", 60),
            entry("fresh", "resp_fresh", 1),
        ]);
        // Ordinal 2 is the second most recently updated entry.
        let options = RequestOptions {
            resume_ordinal: Some(2),
            ..Default::default()
        };
        let ctx =
            resolve_context(&options, &DefaultsConfig::default(), &store, "more").unwrap();

        assert_eq!(ctx.title, "old");
        assert_eq!(ctx.previous_response_id.as_deref(), Some("resp_old"));
    }

    #[test]
    fn test_resume_out_of_range_is_an_error() {
        let (_dir, store) = store_with(vec![entry("only", "resp_1", 1)]);
        let options = RequestOptions {
            resume_ordinal: Some(5),
            ..Default::default()
        };
        assert!(
            resolve_context(&options, &DefaultsConfig::default(), &store, "x").is_err()
        );
    }

    #[test]
    fn test_per_field_inheritance() {
        let (_dir, store) = store_with(vec![entry("t", "resp_1", 1)]);
        // Only the model is overridden; effort and verbosity inherit from
        // the stored entry, not from the defaults.
        let options = RequestOptions {
            model: Some("gpt-5".into()),
            continue_latest: true,
            ..Default::default()
        };
        let ctx = resolve_context(&options, &DefaultsConfig::default(), &store, "x").unwrap();

        assert_eq!(ctx.model, "gpt-5");
        assert_eq!(ctx.effort, Effort::High);
        assert_eq!(ctx.verbosity, Verbosity::Low);
    }

    #[test]
    fn test_compacted_entry_resumes_from_summary() {
        let mut compacted = entry("compacted", "resp_9", 1);
        compacted.resume = Some(ResumeState {
            mode: Some(ResumeMode::NewRequest),
            previous_response_id: None,
            summary: Some(ResumeSummary {
                text: "prior context".into(),
                created_at: Utc::now(),
            }),
        });
        let (_dir, store) = store_with(vec![compacted]);

        let options = RequestOptions {
            continue_latest: true,
            ..Default::default()
        };
        let ctx = resolve_context(&options, &DefaultsConfig::default(), &store, "go on").unwrap();

        // The chain is severed but the conversation is not "new".
        assert!(ctx.previous_response_id.is_none());
        assert!(!ctx.is_new_conversation);
        assert_eq!(
            ctx.resume_summary.as_ref().map(|s| s.text.as_str()),
            Some("prior context")
        );
        assert_eq!(ctx.resume_base_messages.len(), 1);
        let messages = ctx.initial_messages("go on");
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            Message::System { content } => assert_eq!(content, "prior context"),
            other => panic!("expected system summary, got {other:?}"),
        }
    }

    #[test]
    fn test_resume_state_overrides_chain_id() {
        let mut pinned = entry("pinned", "resp_latest", 1);
        pinned.resume = Some(ResumeState {
            mode: None,
            previous_response_id: Some("resp_pinned".into()),
            summary: None,
        });
        let (_dir, store) = store_with(vec![pinned]);

        let options = RequestOptions {
            continue_latest: true,
            ..Default::default()
        };
        let ctx = resolve_context(&options, &DefaultsConfig::default(), &store, "x").unwrap();
        assert_eq!(ctx.previous_response_id.as_deref(), Some("resp_pinned"));
    }

    #[test]
    fn test_title_kept_when_continuing() {
        let (_dir, store) = store_with(vec![entry("original title", "resp_1", 1)]);
        let options = RequestOptions {
            continue_latest: true,
            ..Default::default()
        };
        let ctx = resolve_context(
            &options,
            &DefaultsConfig::default(),
            &store,
            "a completely different prompt",
        )
        .unwrap();
        assert_eq!(ctx.title, "original title");
        assert_eq!(ctx.previous_title.as_deref(), Some("original title"));
    }
}
