//! Durable conversation history: one JSON file, one writer, ordinal access.

pub mod entry;
pub mod store;

pub use entry::{HistoryEntry, ModeContext, ResumeMode, ResumeState, ResumeSummary, Turn};
pub use store::{HistoryError, HistoryStore, RemovedEntry, UpsertParams};
