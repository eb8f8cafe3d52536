//! The bounded model ↔ tool loop.
//!
//! Each iteration sends the accumulated input to the model. A final answer
//! ends the loop; a tool-call turn executes every requested call in order,
//! appends the results and goes around again. The iteration budget caps the
//! number of model round trips, and hitting it is a graceful outcome with
//! whatever partial content the model produced.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use palaver_core::types::Message;
use palaver_providers::{ModelClient, ModelRequest};

use crate::context::ConversationContext;
use crate::tools::ToolRuntime;

pub struct AgentLoop {
    client: Arc<dyn ModelClient>,
    tools: ToolRuntime,
    max_iterations: usize,
}

/// What one request produced.
#[derive(Clone, Debug)]
pub struct LoopOutcome {
    /// Final answer, or the best partial content if the budget ran out.
    pub content: String,
    /// Id of the last model response, `None` only if no response arrived.
    pub response_id: Option<String>,
    /// True when the loop stopped on the iteration budget rather than on a
    /// final answer.
    pub reached_max_iterations: bool,
}

impl AgentLoop {
    pub fn new(client: Arc<dyn ModelClient>, tools: ToolRuntime, max_iterations: usize) -> Self {
        AgentLoop {
            client,
            tools,
            max_iterations,
        }
    }

    /// Run the loop for one user request.
    pub async fn run(
        &self,
        ctx: &ConversationContext,
        instructions: Option<String>,
        user_text: &str,
    ) -> Result<LoopOutcome> {
        let mut input = ctx.initial_messages(user_text);
        let tools = self.tools.definitions();
        // The system prompt only opens a conversation; continued requests
        // already carry it through the chained response id.
        let instructions = if ctx.is_new_conversation {
            instructions
        } else {
            None
        };

        let mut previous_response_id = ctx.previous_response_id.clone();
        let mut last_response_id: Option<String> = None;
        let mut partial_content: Option<String> = None;

        for iteration in 1..=self.max_iterations {
            let request = ModelRequest {
                model: ctx.model.clone(),
                input: input.clone(),
                instructions: instructions.clone(),
                tools: tools.clone(),
                previous_response_id: previous_response_id.clone(),
                effort: ctx.effort,
                verbosity: ctx.verbosity,
            };

            debug!(
                iteration,
                max = self.max_iterations,
                provider = self.client.display_name(),
                "requesting model turn"
            );
            let turn = self.client.respond(&request).await?;

            last_response_id = Some(turn.response_id.clone());
            previous_response_id = Some(turn.response_id.clone());
            if let Some(content) = &turn.content {
                if !content.is_empty() {
                    partial_content = Some(content.clone());
                }
            }

            if !turn.requires_action {
                return Ok(LoopOutcome {
                    content: turn.content.unwrap_or_default(),
                    response_id: last_response_id,
                    reached_max_iterations: false,
                });
            }

            if turn.tool_calls.is_empty() {
                // The model claims to need tools but named none. Nothing can
                // make progress from here.
                bail!("model signalled tool use but requested no tool calls");
            }

            info!(
                iteration,
                calls = turn.tool_calls.len(),
                "executing requested tool calls"
            );
            input.push(Message::assistant_tool_calls(turn.tool_calls.clone()));
            for call in &turn.tool_calls {
                let output = self.tools.execute_call(call).await;
                input.push(Message::tool_result(&call.id, output));
            }
        }

        warn!(
            max = self.max_iterations,
            "iteration budget exhausted before a final answer"
        );
        Ok(LoopOutcome {
            content: partial_content
                .unwrap_or_else(|| "(no answer produced within the iteration budget)".into()),
            response_id: last_response_id,
            reached_max_iterations: true,
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
