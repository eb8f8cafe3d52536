//! Shared CLI helpers — path expansion and response printing.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use palaver_core::utils::expand_home;

/// Resolve the configured workspace, falling back to the default under the
/// data directory, and make sure it exists.
pub fn resolve_workspace(configured: &str) -> Result<PathBuf> {
    let workspace = if configured.is_empty() {
        palaver_core::utils::get_default_workspace_path()
    } else {
        expand_home(configured)
    };
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("failed to create workspace: {}", workspace.display()))?;
    Ok(workspace)
}

/// The prompt for this request: the positional argument, or stdin when the
/// prompt was piped in.
pub fn resolve_prompt(positional: Option<String>) -> Result<String> {
    let prompt = match positional {
        Some(prompt) => prompt,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read prompt from stdin")?;
            buffer
        }
    };
    let prompt = prompt.trim().to_string();
    if prompt.is_empty() {
        bail!("no prompt given; pass it as an argument or pipe it on stdin");
    }
    Ok(prompt)
}

/// Print the final answer to stdout.
pub fn print_response(content: &str, no_color: bool) {
    if no_color {
        println!("{content}");
        return;
    }
    println!();
    println!("{}", "Palaver".cyan().bold());
    if content.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{content}");
    }
    println!();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
