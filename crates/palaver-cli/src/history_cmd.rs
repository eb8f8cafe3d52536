//! `palaver history` — inspect and maintain stored conversations.
//!
//! Ordinals are positional: 1 is the most recently updated conversation,
//! and they shift when entries are added or deleted.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use palaver_core::history::HistoryStore;
use palaver_core::utils::truncate_string;

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List stored conversations, most recent first
    List {
        /// Disable colored output
        #[arg(long, default_value_t = false)]
        no_color: bool,
    },

    /// Show one conversation's turns
    Show {
        /// Conversation number from `palaver history list`
        number: usize,

        /// Disable colored output
        #[arg(long, default_value_t = false)]
        no_color: bool,
    },

    /// Delete one conversation
    Delete {
        /// Conversation number from `palaver history list`
        number: usize,
    },

    /// Collapse a conversation's turns into a resumable summary
    Compact {
        /// Conversation number from `palaver history list`
        number: usize,
    },
}

pub fn dispatch(action: HistoryCommands) -> Result<()> {
    let store = HistoryStore::at_default_location();

    match action {
        HistoryCommands::List { no_color } => list(&store, no_color),
        HistoryCommands::Show { number, no_color } => {
            let rendered = store
                .show_by_number(number, no_color)
                .context("failed to show conversation")?;
            println!("{rendered}");
            Ok(())
        }
        HistoryCommands::Delete { number } => {
            let removed = store
                .delete_by_number(number)
                .context("failed to delete conversation")?;
            println!("Deleted conversation: {}", removed.title);
            Ok(())
        }
        HistoryCommands::Compact { number } => compact(&store, number),
    }
}

fn list(store: &HistoryStore, no_color: bool) -> Result<()> {
    let mut entries = store.load_entries().context("failed to load history")?;
    if entries.is_empty() {
        println!("No stored conversations.");
        return Ok(());
    }

    entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    for (i, entry) in entries.iter().enumerate() {
        let ordinal = format!("{:>3}.", i + 1);
        let title = truncate_string(&entry.title, 50);
        let when = entry.updated_at.format("%Y-%m-%d %H:%M");
        let detail = format!(
            "{when}  {} requests  {}",
            entry.request_count, entry.model
        );
        if no_color {
            println!("{ordinal} {title}  ({detail})");
        } else {
            println!(
                "{} {}  {}",
                ordinal.bold(),
                title.cyan(),
                format!("({detail})").dimmed()
            );
        }
    }
    Ok(())
}

/// Compaction keeps the thread resumable without its full transcript: the
/// summary text is derived locally from the first user turn and the most
/// recent assistant turn.
fn compact(store: &HistoryStore, number: usize) -> Result<()> {
    let entry = store
        .select_by_number(number)
        .context("failed to select conversation")?;

    let opening = entry
        .turns
        .iter()
        .find(|t| t.role == "user")
        .map(|t| t.text.as_str())
        .unwrap_or(&entry.title);
    let latest = entry
        .turns
        .iter()
        .rev()
        .find(|t| t.role == "assistant")
        .map(|t| t.text.as_str());

    let summary = match latest {
        Some(latest) => format!(
            "The user asked: {}\nThe conversation ended with: {}",
            truncate_string(opening, 200),
            truncate_string(latest, 500)
        ),
        None => format!("The user asked: {}", truncate_string(opening, 200)),
    };

    store
        .compact_entry(number, &summary)
        .context("failed to compact conversation")?;
    println!("Compacted conversation: {}", entry.title);
    Ok(())
}
