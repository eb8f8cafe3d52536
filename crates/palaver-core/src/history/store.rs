//! The history store — sole writer of the on-disk conversation collection.
//!
//! File format: a single JSON array of entries. Every mutation is a
//! whole-collection rewrite through a temp file + rename, so a crash
//! mid-write never leaves a half-written file behind. Ordinals (1-based,
//! most recently updated first) are recomputed on every call, never cached.

use std::path::{Path, PathBuf};

use chrono::Utc;
use colored::Colorize;
use thiserror::Error;
use tracing::{debug, warn};

use super::entry::{HistoryEntry, ModeContext, ResumeMode, ResumeState, ResumeSummary, Turn};
use crate::types::{Effort, Verbosity};
use crate::utils;

// ─────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum HistoryError {
    /// Out-of-range ordinal. A user error, recoverable at the command level.
    #[error("invalid history index {index}: expected a value between 1 and {len}")]
    InvalidIndex { index: usize, len: usize },

    /// File-level failure (permissions, unwritable directory). Fatal.
    #[error("history file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────

/// Identifies an entry removed by [`HistoryStore::delete_by_number`].
#[derive(Clone, Debug)]
pub struct RemovedEntry {
    pub response_id: String,
    pub title: String,
}

/// Parameters for the single write path used by the finalize pipeline.
#[derive(Clone, Debug)]
pub struct UpsertParams {
    pub response_id: String,
    pub user_text: String,
    pub assistant_text: String,
    pub model: String,
    pub effort: Effort,
    pub verbosity: Verbosity,
    /// Title to use if this turn starts a new entry.
    pub title: String,
    pub previous_response_id: Option<String>,
    pub active_last_response_id: Option<String>,
    pub context: Option<ModeContext>,
}

/// Owns the on-disk collection of [`HistoryEntry`].
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location (`~/.palaver/history.json`).
    pub fn at_default_location() -> Self {
        Self::new(utils::get_history_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ────────────── Load / save ──────────────

    /// Read the backing file. A missing or corrupt file reads as empty
    /// history; only real I/O failures (permissions) are fatal.
    pub fn load_entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history file unparsable, treating as empty");
                return Ok(Vec::new());
            }
        };

        migrate_entries(&mut value);

        match serde_json::from_value(value) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history entries undecodable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Serialize the full collection atomically: write a sibling temp file,
    /// then rename over the target.
    pub fn save_entries(&self, entries: &[HistoryEntry]) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            entries = entries.len(),
            "history saved"
        );
        Ok(())
    }

    // ────────────── Ordinal access ──────────────

    /// Select the `n`-th entry (1-based, most recently updated first).
    pub fn select_by_number(&self, n: usize) -> Result<HistoryEntry, HistoryError> {
        let entries = self.load_entries()?;
        let idx = resolve_ordinal(&entries, n)?;
        Ok(entries[idx].clone())
    }

    /// Delete the `n`-th entry and rewrite the collection without it.
    pub fn delete_by_number(&self, n: usize) -> Result<RemovedEntry, HistoryError> {
        let mut entries = self.load_entries()?;
        let idx = resolve_ordinal(&entries, n)?;
        let removed = entries.remove(idx);
        self.save_entries(&entries)?;
        Ok(RemovedEntry {
            response_id: removed.last_response_id,
            title: removed.title,
        })
    }

    /// Read-only display projection of the `n`-th entry.
    pub fn show_by_number(&self, n: usize, no_color: bool) -> Result<String, HistoryError> {
        let entry = self.select_by_number(n)?;
        Ok(render_entry(&entry, n, no_color))
    }

    /// The most recently updated entry, if any. Used for implicit
    /// continuation when the user asks to continue without picking one.
    pub fn find_latest(&self) -> Result<Option<HistoryEntry>, HistoryError> {
        let entries = self.load_entries()?;
        Ok(entries.into_iter().max_by_key(|e| e.updated_at))
    }

    // ────────────── Write paths ──────────────

    /// The single write path used by the finalize pipeline.
    ///
    /// Updates the entry matching the context's response-id linkage if one
    /// exists, otherwise appends a brand-new entry.
    pub fn upsert_conversation(
        &self,
        params: &UpsertParams,
    ) -> Result<HistoryEntry, HistoryError> {
        let mut entries = self.load_entries()?;
        let now = Utc::now();

        let target_id = params
            .active_last_response_id
            .as_deref()
            .or(params.previous_response_id.as_deref());
        let pos = target_id.and_then(|id| entries.iter().position(|e| e.last_response_id == id));

        let committed = match pos {
            Some(i) => {
                let entry = &mut entries[i];
                entry.request_count += 1;
                entry.turns.push(Turn::user(&params.user_text, now));
                entry.turns.push(Turn::assistant(
                    &params.assistant_text,
                    now,
                    &params.response_id,
                ));
                entry.last_response_id = params.response_id.clone();
                entry.updated_at = now;
                entry.model = params.model.clone();
                entry.effort = params.effort;
                entry.verbosity = params.verbosity;
                // A successful turn re-establishes the response-id chain;
                // a stale summary-resume state would inject its summary on
                // every later continuation, so it is dropped here.
                entry.resume = None;
                if params.context.is_some() {
                    entry.context = params.context.clone();
                }
                entry.clone()
            }
            None => {
                let entry = HistoryEntry {
                    title: params.title.clone(),
                    model: params.model.clone(),
                    effort: params.effort,
                    verbosity: params.verbosity,
                    created_at: now,
                    updated_at: now,
                    first_response_id: params.response_id.clone(),
                    last_response_id: params.response_id.clone(),
                    request_count: 1,
                    resume: None,
                    turns: vec![
                        Turn::user(&params.user_text, now),
                        Turn::assistant(&params.assistant_text, now, &params.response_id),
                    ],
                    context: params.context.clone(),
                };
                entries.push(entry.clone());
                entry
            }
        };

        self.save_entries(&entries)?;
        Ok(committed)
    }

    /// Compact the `n`-th entry in place: its turn log collapses to a single
    /// summary turn and the response-id linkage is severed
    /// (`resume.mode = "new_request"`) while title and identity survive.
    pub fn compact_entry(&self, n: usize, summary_text: &str) -> Result<(), HistoryError> {
        let mut entries = self.load_entries()?;
        let idx = resolve_ordinal(&entries, n)?;
        let now = Utc::now();

        let entry = &mut entries[idx];
        entry.turns = vec![Turn::summary(summary_text, now)];
        entry.resume = Some(ResumeState {
            mode: Some(ResumeMode::NewRequest),
            previous_response_id: None,
            summary: Some(ResumeSummary {
                text: summary_text.to_string(),
                created_at: now,
            }),
        });
        entry.updated_at = now;

        self.save_entries(&entries)
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

/// Map a 1-based ordinal (most recently updated first) to an index into the
/// collection as stored. Recomputed on every call.
fn resolve_ordinal(entries: &[HistoryEntry], n: usize) -> Result<usize, HistoryError> {
    if n == 0 || n > entries.len() {
        return Err(HistoryError::InvalidIndex {
            index: n,
            len: entries.len(),
        });
    }
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| entries[b].updated_at.cmp(&entries[a].updated_at));
    Ok(order[n - 1])
}

fn render_entry(entry: &HistoryEntry, ordinal: usize, no_color: bool) -> String {
    let paint = |s: &str, color: &str| -> String {
        if no_color {
            s.to_string()
        } else {
            match color {
                "bold" => s.bold().to_string(),
                "cyan" => s.cyan().to_string(),
                "green" => s.green().to_string(),
                "yellow" => s.yellow().to_string(),
                _ => s.to_string(),
            }
        }
    };

    let mut lines = Vec::new();
    lines.push(format!("#{} {}", ordinal, paint(&entry.title, "bold")));
    lines.push(format!(
        "model: {}  effort: {}  verbosity: {}  requests: {}",
        entry.model, entry.effort, entry.verbosity, entry.request_count
    ));
    lines.push(format!(
        "created: {}  updated: {}",
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.updated_at.format("%Y-%m-%d %H:%M")
    ));
    if let Some(resume) = &entry.resume {
        if resume.summary.is_some() {
            lines.push("(compacted: resumes from summary)".to_string());
        }
    }
    lines.push(String::new());
    for turn in &entry.turns {
        let role = match turn.role.as_str() {
            "user" => paint("user", "cyan"),
            "assistant" => paint("assistant", "green"),
            _ => paint(&turn.role, "yellow"),
        };
        let marker = match turn.kind.as_deref() {
            Some(kind) => format!(" ({kind})"),
            None => String::new(),
        };
        lines.push(format!("[{role}{marker}] {}", turn.text));
    }
    lines.join("\n")
}

/// Load-time migration for pre-tagging entries: contexts stored without a
/// `mode` discriminator are classified from their fields. Shapes that
/// cannot be classified fall through to `ModeContext::Legacy` untouched.
fn migrate_entries(value: &mut serde_json::Value) {
    let Some(entries) = value.as_array_mut() else {
        return;
    };
    for entry in entries {
        let Some(ctx) = entry.get_mut("context") else {
            continue;
        };
        let Some(obj) = ctx.as_object_mut() else {
            continue;
        };
        if obj.contains_key("mode") {
            continue;
        }
        if obj.contains_key("connection") {
            obj.insert("mode".into(), serde_json::Value::String("query".into()));
            debug!("migrated untagged history context to mode=query");
        } else if obj.contains_key("output_file") || obj.contains_key("copy") {
            obj.insert("mode".into(), serde_json::Value::String("ask".into()));
            debug!("migrated untagged history context to mode=ask");
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
