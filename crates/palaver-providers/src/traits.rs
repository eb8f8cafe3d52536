//! ModelClient trait — the abstraction over the remote reasoning service.

use async_trait::async_trait;

use palaver_core::types::{Effort, Message, ModelTurn, ToolDefinition, Verbosity};

/// One request to the reasoning service.
#[derive(Clone, Debug)]
pub struct ModelRequest {
    pub model: String,
    /// Accumulated conversation input for this request.
    pub input: Vec<Message>,
    /// System prompt; only sent when a conversation starts.
    pub instructions: Option<String>,
    /// Tools the model may call. Empty slice means no tools are offered.
    pub tools: Vec<ToolDefinition>,
    /// Chains this request onto a stored conversation.
    pub previous_response_id: Option<String>,
    pub effort: Effort,
    pub verbosity: Verbosity,
}

/// Trait every reasoning-service backend implements.
///
/// The production implementation is [`crate::HttpModelClient`]; tests use
/// scripted mocks.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one request and return the model's turn.
    ///
    /// Transport and protocol failures propagate as errors; the caller must
    /// only treat a turn as durable when it carries a real response id.
    async fn respond(&self, request: &ModelRequest) -> anyhow::Result<ModelTurn>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
