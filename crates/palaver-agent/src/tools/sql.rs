//! SQL tools for query mode: schema introspection and statement dry-runs.
//!
//! Both shell out to `psql`. No statement is ever executed against real
//! data; dry-runs go through `EXPLAIN`, which plans without running.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{optional_string, require_string, Tool, ToolContext};
use super::command::run_reporting_command;

fn psql_args<'a>(connection: &'a Option<String>, command: &'a str) -> Vec<&'a str> {
    let mut args = vec!["-X", "-A"];
    if let Some(conn) = connection {
        args.push(conn);
    }
    args.push("-c");
    args.push(command);
    args
}

// ─────────────────────────────────────────────
// describe_schema
// ─────────────────────────────────────────────

pub struct DescribeSchemaTool {
    /// Connection string; when absent psql falls back to its environment.
    connection: Option<String>,
}

impl DescribeSchemaTool {
    pub fn new(connection: Option<String>) -> Self {
        DescribeSchemaTool { connection }
    }
}

#[async_trait]
impl Tool for DescribeSchemaTool {
    fn name(&self) -> &str {
        "describe_schema"
    }

    fn description(&self) -> &str {
        "List tables in the connected database, or describe one table's columns and indexes"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "table": {
                    "type": "string",
                    "description": "Table to describe; omit to list all tables"
                }
            }
        })
    }

    async fn execute(&self, params: HashMap<String, Value>, ctx: &ToolContext) -> Result<Value> {
        let command = match optional_string(&params, "table") {
            Some(table) => format!("\\d {table}"),
            None => "\\dt".to_string(),
        };

        let args = psql_args(&self.connection, &command);
        Ok(run_reporting_command("psql", &args, &ctx.workspace).await)
    }
}

// ─────────────────────────────────────────────
// dry_run_sql
// ─────────────────────────────────────────────

pub struct DryRunSqlTool {
    connection: Option<String>,
}

impl DryRunSqlTool {
    pub fn new(connection: Option<String>) -> Self {
        DryRunSqlTool { connection }
    }
}

#[async_trait]
impl Tool for DryRunSqlTool {
    fn name(&self) -> &str {
        "dry_run_sql"
    }

    fn description(&self) -> &str {
        "Validate a SQL statement against the connected database without executing it"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "The SQL statement to validate"
                }
            },
            "required": ["sql"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>, ctx: &ToolContext) -> Result<Value> {
        let sql = require_string(&params, "sql")?;
        let command = format!("EXPLAIN {}", sql.trim_end_matches(';'));

        let args = psql_args(&self.connection, &command);
        Ok(run_reporting_command("psql", &args, &ctx.workspace).await)
    }
}
