//! HTTP client for the reasoning service's `/responses` endpoint.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use palaver_core::types::{
    ModelTurn, ReasoningOptions, ResponsesReply, ResponsesRequest, TextOptions,
};

use crate::traits::{ModelClient, ModelRequest};

// ─────────────────────────────────────────────
// HttpModelClient
// ─────────────────────────────────────────────

/// Talks to any service exposing the `/responses` contract.
pub struct HttpModelClient {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
}

impl std::fmt::Debug for HttpModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl HttpModelClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("Failed to build HTTP client");

        HttpModelClient {
            client,
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    fn responses_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/responses", base)
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn respond(&self, request: &ModelRequest) -> Result<ModelTurn> {
        let body = ResponsesRequest {
            model: request.model.clone(),
            input: request.input.clone(),
            instructions: request.instructions.clone(),
            tools: if request.tools.is_empty() {
                None
            } else {
                Some(request.tools.clone())
            },
            previous_response_id: request.previous_response_id.clone(),
            reasoning: Some(ReasoningOptions {
                effort: request.effort,
            }),
            text: Some(TextOptions {
                verbosity: request.verbosity,
            }),
        };

        debug!(
            model = %request.model,
            input = request.input.len(),
            tools = request.tools.len(),
            chained = request.previous_response_id.is_some(),
            "calling reasoning service"
        );

        let response = self
            .client
            .post(self.responses_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("request to reasoning service failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            bail!("reasoning service returned {status}: {error_text}");
        }

        let reply: ResponsesReply = response
            .json()
            .await
            .context("failed to parse reasoning service response")?;

        let turn: ModelTurn = reply.into();
        debug!(
            response_id = %turn.response_id,
            has_content = turn.content.is_some(),
            tool_calls = turn.tool_calls.len(),
            requires_action = turn.requires_action,
            "reasoning service responded"
        );
        Ok(turn)
    }

    fn display_name(&self) -> &str {
        "HttpModelClient"
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
