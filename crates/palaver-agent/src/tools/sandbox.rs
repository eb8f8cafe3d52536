//! Workspace sandbox for tool paths.
//!
//! Every path a tool touches is resolved lexically against the workspace
//! root. Resolution never consults the filesystem, so a path to a file that
//! does not exist yet resolves the same way as one that does, and symlinks
//! are not followed during the check.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("path '{path}' resolves outside the workspace")]
    PathOutsideWorkspace { path: String },
}

/// Resolve `raw` against `workspace` and reject anything that escapes it.
///
/// Relative paths are joined onto the workspace root; absolute paths are
/// accepted only when they already sit inside it. `.` and `..` components
/// are folded out lexically before the containment check, so `a/../../x`
/// fails even though it never exists on disk.
pub fn resolve_workspace_path(raw: &str, workspace: &Path) -> Result<PathBuf, ToolError> {
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        workspace.join(candidate)
    };

    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return Err(ToolError::PathOutsideWorkspace {
                        path: raw.to_string(),
                    });
                }
            }
            other => resolved.push(other),
        }
    }

    if resolved.strip_prefix(workspace).is_err() {
        return Err(ToolError::PathOutsideWorkspace {
            path: raw.to_string(),
        });
    }

    Ok(resolved)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
