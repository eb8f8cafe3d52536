//! History entry shapes — one entry per conversation thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Effort, Verbosity};

// ─────────────────────────────────────────────
// HistoryEntry
// ─────────────────────────────────────────────

/// One conversation thread in the history file.
///
/// Created on the first successful model response of a new conversation,
/// then mutated in place (matched by `last_response_id`) on every later
/// turn. `request_count` only increases.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Derived from the first user text (≤50 chars, whitespace collapsed).
    pub title: String,
    pub model: String,
    pub effort: Effort,
    pub verbosity: Verbosity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub first_response_id: String,
    pub last_response_id: String,
    pub request_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume: Option<ResumeState>,
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Per-mode payload; unknown fields inside it are preserved verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ModeContext>,
}

/// A single conversation turn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: String,
    pub text: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Turn {
    pub fn user(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Turn {
            role: "user".into(),
            text: text.into(),
            at,
            response_id: None,
            kind: None,
        }
    }

    pub fn assistant(
        text: impl Into<String>,
        at: DateTime<Utc>,
        response_id: impl Into<String>,
    ) -> Self {
        Turn {
            role: "assistant".into(),
            text: text.into(),
            at,
            response_id: Some(response_id.into()),
            kind: None,
        }
    }

    /// The single turn a compacted conversation keeps.
    pub fn summary(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Turn {
            role: "system".into(),
            text: text.into(),
            at,
            response_id: None,
            kind: Some("summary".into()),
        }
    }
}

// ─────────────────────────────────────────────
// Resume state
// ─────────────────────────────────────────────

/// How a stored conversation reattaches to a new request.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ResumeState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ResumeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ResumeSummary>,
}

/// Resume mode. `NewRequest` means compaction severed the response-id chain;
/// the conversation resumes from its summary instead.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResumeMode {
    #[serde(rename = "new_request")]
    NewRequest,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResumeSummary {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────
// Per-mode context payload
// ─────────────────────────────────────────────

/// Mode-specific context carried by an entry, tagged by the CLI mode that
/// produced it. Fields this build does not know about survive a round trip
/// through the `extra` map; entire shapes it does not know about survive
/// through the `Legacy` variant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ModeContext {
    Ask {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_file: Option<String>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        copy: bool,
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    },
    Diagram {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output_file: Option<String>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        copy: bool,
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    },
    Query {
        /// Fingerprint of the SQL connection the conversation targets.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection: Option<String>,
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    },
    /// Pre-tagging shapes that the load-time migration could not classify.
    #[serde(untagged)]
    Legacy(serde_json::Value),
}
