//! Utility helpers — data paths, title derivation, string manipulation.

use std::path::PathBuf;

/// Get the Palaver data directory (e.g. `~/.palaver/`).
pub fn get_data_path() -> PathBuf {
    let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".palaver")
}

/// Get the history file path (e.g. `~/.palaver/history.json`).
pub fn get_history_path() -> PathBuf {
    get_data_path().join("history.json")
}

/// Get the default workspace path (e.g. `~/.palaver/workspace/`).
pub fn get_default_workspace_path() -> PathBuf {
    get_data_path().join("workspace")
}

/// Maximum length of a derived conversation title.
pub const TITLE_MAX_LEN: usize = 50;

/// Derive a conversation title from the first user text: whitespace runs
/// collapse to single spaces, result capped at [`TITLE_MAX_LEN`] characters.
pub fn derive_title(input: &str) -> String {
    let collapsed: String = input.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(TITLE_MAX_LEN).collect()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated.
/// Unicode-safe.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Current ISO 8601 timestamp.
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path == "~" {
        let home = home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(path.strip_prefix("~/").unwrap_or(""))
    } else {
        PathBuf::from(path)
    }
}

fn home_dir() -> Option<PathBuf> {
    dirs_next::home_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_short() {
        assert_eq!(derive_title("hello world"), "hello world");
    }

    #[test]
    fn test_derive_title_collapses_whitespace() {
        assert_eq!(
            derive_title("  explain \n\t the   borrow checker  "),
            "explain the borrow checker"
        );
    }

    #[test]
    fn test_derive_title_caps_at_fifty() {
        let long = "x".repeat(120);
        assert_eq!(derive_title(&long).chars().count(), 50);
    }

    #[test]
    fn test_derive_title_unicode() {
        let input = "日本語のとても長い説明".repeat(10);
        assert!(derive_title(&input).chars().count() <= 50);
    }

    #[test]
    fn test_truncate_short_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long_string() {
        let result = truncate_string("hello world, this is a long string", 15);
        assert_eq!(result, "hello world,...");
    }

    #[test]
    fn test_expand_home_tilde() {
        let expanded = expand_home("~/test/path");
        assert!(!expanded.starts_with("~"));
        assert!(expanded.to_str().unwrap().ends_with("test/path"));
    }

    #[test]
    fn test_expand_home_absolute() {
        let expanded = expand_home("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_timestamp_is_valid() {
        let ts = timestamp();
        chrono::DateTime::parse_from_rfc3339(&ts).unwrap();
    }

    #[test]
    fn test_history_path_under_data_dir() {
        let path = get_history_path();
        assert!(path.ends_with("history.json"));
        assert!(path.parent().unwrap().ends_with(".palaver"));
    }
}
