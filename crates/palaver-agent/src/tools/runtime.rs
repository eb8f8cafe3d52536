//! Tool runtime: registration, definition export and failure-proof dispatch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use palaver_core::types::{ToolCall, ToolDefinition};

use super::base::{Tool, ToolContext};
use super::diagram::LintDiagramTool;
use super::filesystem::{ReadFileTool, WriteFileTool};
use super::sql::{DescribeSchemaTool, DryRunSqlTool};

/// Holds the tools offered for one request and dispatches calls to them.
///
/// Dispatch never fails: every outcome, including unknown tools and handler
/// errors, is rendered as a JSON string the model can read.
pub struct ToolRuntime {
    tools: HashMap<String, Arc<dyn Tool>>,
    ctx: ToolContext,
}

impl ToolRuntime {
    pub fn new(workspace: impl AsRef<Path>) -> Self {
        ToolRuntime {
            tools: HashMap::new(),
            ctx: ToolContext::new(workspace.as_ref()),
        }
    }

    /// Baseline file tools, offered in every mode.
    pub fn for_ask(workspace: impl AsRef<Path>) -> Self {
        let mut runtime = Self::new(workspace);
        runtime.register(Arc::new(ReadFileTool));
        runtime.register(Arc::new(WriteFileTool));
        runtime
    }

    /// File tools plus Mermaid validation.
    pub fn for_diagram(workspace: impl AsRef<Path>) -> Self {
        let mut runtime = Self::for_ask(workspace);
        runtime.register(Arc::new(LintDiagramTool));
        runtime
    }

    /// File tools plus database introspection and SQL dry-runs.
    pub fn for_query(workspace: impl AsRef<Path>, connection: Option<String>) -> Self {
        let mut runtime = Self::for_ask(workspace);
        runtime.register(Arc::new(DescribeSchemaTool::new(connection.clone())));
        runtime.register(Arc::new(DryRunSqlTool::new(connection)));
        runtime
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions advertised to the model, in stable name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| self.tools[name].definition())
            .collect()
    }

    /// Execute one requested call and return its result as a JSON string.
    pub async fn execute_call(&self, call: &ToolCall) -> String {
        let result = self.dispatch(call).await;
        serde_json::to_string(&result).unwrap_or_else(|_| {
            json!({"success": false, "message": "tool result was not serializable"}).to_string()
        })
    }

    async fn dispatch(&self, call: &ToolCall) -> Value {
        let name = &call.function.name;
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = %name, "model requested an unregistered tool");
            return json!({
                "success": false,
                "message": format!("Unknown tool: {name}"),
            });
        };

        let params: HashMap<String, Value> = match serde_json::from_str(&call.function.arguments) {
            Ok(params) => params,
            Err(err) => {
                warn!(tool = %name, %err, "unparseable tool arguments");
                return json!({
                    "success": false,
                    "message": format!("invalid arguments for '{name}': {err}"),
                });
            }
        };

        debug!(tool = %name, call_id = %call.id, "executing tool");
        match tool.execute(params, &self.ctx).await {
            Ok(mut value) => {
                if let Some(object) = value.as_object_mut() {
                    object
                        .entry("success".to_string())
                        .or_insert(Value::Bool(true));
                }
                value
            }
            Err(err) => {
                warn!(tool = %name, error = %err, "tool execution failed");
                json!({
                    "success": false,
                    "message": err.to_string(),
                })
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;

    struct BoomTool;

    #[async_trait]
    impl Tool for BoomTool {
        fn name(&self) -> &str {
            "boom"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(
            &self,
            _params: HashMap<String, Value>,
            _ctx: &ToolContext,
        ) -> anyhow::Result<Value> {
            bail!("boom went boom")
        }
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall::new("call_1", name, arguments)
    }

    #[tokio::test]
    async fn test_unknown_tool_reports_structured_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = ToolRuntime::for_ask(dir.path());

        let output = runtime.execute_call(&call("does_not_exist", "{}")).await;
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["message"], "Unknown tool: does_not_exist");
    }

    #[tokio::test]
    async fn test_bad_arguments_report_structured_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = ToolRuntime::for_ask(dir.path());

        let output = runtime.execute_call(&call("read_file", "not json")).await;
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["success"], false);
        assert!(parsed["message"].as_str().unwrap().contains("read_file"));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let mut runtime = ToolRuntime::new(dir.path());
        runtime.register(Arc::new(BoomTool));

        let output = runtime.execute_call(&call("boom", "{}")).await;
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["message"], "boom went boom");
    }

    #[tokio::test]
    async fn test_successful_call_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();
        let runtime = ToolRuntime::for_ask(dir.path());

        let output = runtime
            .execute_call(&call("read_file", r#"{"path":"a.txt"}"#))
            .await;
        let parsed: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["content"], "content");
    }

    #[test]
    fn test_definitions_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = ToolRuntime::for_query(dir.path(), None);

        let names: Vec<String> = runtime
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec!["describe_schema", "dry_run_sql", "read_file", "write_file"]
        );
    }

    #[test]
    fn test_mode_tool_sets() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ToolRuntime::for_ask(dir.path()).definitions().len(), 2);
        assert_eq!(ToolRuntime::for_diagram(dir.path()).definitions().len(), 3);
        assert_eq!(
            ToolRuntime::for_query(dir.path(), None).definitions().len(),
            4
        );
    }
}
