//! The `Tool` trait and shared parameter helpers.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use palaver_core::types::ToolDefinition;

/// Ambient state every tool invocation sees.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Workspace root; all tool paths are sandboxed to it.
    pub workspace: PathBuf,
}

impl ToolContext {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        ToolContext {
            workspace: workspace.into(),
        }
    }
}

/// A capability the model may invoke during the agent loop.
///
/// `execute` returns a JSON value on success; errors are turned into
/// structured failure payloads by the runtime, never surfaced to the model
/// as a thrown error.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value;

    async fn execute(&self, params: HashMap<String, Value>, ctx: &ToolContext) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

// ───── Parameter helpers ─────

pub fn require_string(params: &HashMap<String, Value>, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| anyhow!("missing required parameter '{key}'"))
}

pub fn optional_string(params: &HashMap<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(Value::as_str).map(String::from)
}
