//! Diagram tooling: validates Mermaid sources by compiling them with `mmdc`.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{require_string, Tool, ToolContext};
use super::command::run_reporting_command;
use super::sandbox::resolve_workspace_path;

pub struct LintDiagramTool;

#[async_trait]
impl Tool for LintDiagramTool {
    fn name(&self) -> &str {
        "lint_diagram"
    }

    fn description(&self) -> &str {
        "Validate a Mermaid diagram file by compiling it with the mermaid CLI"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the .mmd file, relative to the workspace root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>, ctx: &ToolContext) -> Result<Value> {
        let raw = require_string(&params, "path")?;
        let source = resolve_workspace_path(&raw, &ctx.workspace)?;
        let output = source.with_extension("svg");

        // mmdc has no lint-only mode; compiling to SVG is the validity check.
        let result = run_reporting_command(
            "mmdc",
            &[
                "--input",
                &source.to_string_lossy(),
                "--output",
                &output.to_string_lossy(),
            ],
            &ctx.workspace,
        )
        .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_escape_rejected_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());

        let mut params = HashMap::new();
        params.insert("path".to_string(), json!("../out.mmd"));

        let err = LintDiagramTool.execute(params, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("outside the workspace"));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_failure_payload() {
        // mmdc is not installed in CI; the spawn failure must come back as a
        // structured payload rather than an Err.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("d.mmd"), "graph TD; A-->B;").unwrap();
        let ctx = ToolContext::new(dir.path());

        let mut params = HashMap::new();
        params.insert("path".to_string(), json!("d.mmd"));

        let result = LintDiagramTool.execute(params, &ctx).await.unwrap();
        assert!(result.get("success").is_some());
        assert!(result.get("exit_code").is_some());
    }
}
