//! File tools: `read_file` and `write_file`, both sandboxed to the workspace.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::base::{require_string, Tool, ToolContext};
use super::sandbox::resolve_workspace_path;

// ─────────────────────────────────────────────
// read_file
// ─────────────────────────────────────────────

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace and return its content"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>, ctx: &ToolContext) -> Result<Value> {
        let raw = require_string(&params, "path")?;
        let path = resolve_workspace_path(&raw, &ctx.workspace)?;

        if !path.is_file() {
            bail!("file '{raw}' does not exist");
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read '{raw}'"))?;

        debug!(path = %raw, bytes = content.len(), "read_file");
        Ok(json!({
            "success": true,
            "path": raw,
            "content": content,
        }))
    }
}

// ─────────────────────────────────────────────
// write_file
// ─────────────────────────────────────────────

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating parent directories as needed"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Full content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>, ctx: &ToolContext) -> Result<Value> {
        let raw = require_string(&params, "path")?;
        let content = require_string(&params, "content")?;
        let path = resolve_workspace_path(&raw, &ctx.workspace)?;

        if path.is_dir() {
            bail!("'{raw}' is an existing directory");
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create directories for '{raw}'"))?;
        }

        tokio::fs::write(&path, &content)
            .await
            .with_context(|| format!("failed to write '{raw}'"))?;

        debug!(path = %raw, bytes = content.len(), "write_file");
        Ok(json!({
            "success": true,
            "path": raw,
            "bytes_written": content.len(),
        }))
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let written = WriteFileTool
            .execute(params(&[("path", "notes/hello.md"), ("content", "hi")]), &ctx)
            .await
            .unwrap();
        assert_eq!(written["success"], true);
        assert_eq!(written["bytes_written"], 2);

        let read = ReadFileTool
            .execute(params(&[("path", "notes/hello.md")]), &ctx)
            .await
            .unwrap();
        assert_eq!(read["content"], "hi");
    }

    #[tokio::test]
    async fn test_read_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let err = ReadFileTool
            .execute(params(&[("path", "nope.txt")]), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let err = WriteFileTool
            .execute(params(&[("path", "../evil.txt"), ("content", "x")]), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outside the workspace"));
    }

    #[tokio::test]
    async fn test_write_to_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let ctx = ToolContext::new(dir.path());

        let err = WriteFileTool
            .execute(params(&[("path", "sub"), ("content", "x")]), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("existing directory"));
    }

    #[tokio::test]
    async fn test_missing_param_errors() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let err = WriteFileTool
            .execute(params(&[("path", "a.txt")]), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }
}
