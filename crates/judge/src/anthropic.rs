//! Anthropic Messages API judge

use crate::error::JudgeError;
use async_trait::async_trait;
use kbeval_core::error::Result;
use kbeval_core::{JudgeRequest, JudgeService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Judge backed by the Anthropic Messages API
pub struct AnthropicJudge {
    client: Arc<claudius::Anthropic>,
    model: claudius::Model,
    timeout: Duration,
}

impl AnthropicJudge {
    /// Create a new Anthropic judge
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `model` - Model name (e.g., "claude-haiku-4-5")
    /// * `timeout_secs` - Per-request deadline in seconds
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Result<Self> {
        info!("Initializing Anthropic judge");
        info!("  Model: {model}");
        info!("  Timeout: {timeout_secs}s");

        let client = claudius::Anthropic::new(Some(api_key))
            .map_err(|e| JudgeError::Config(format!("Failed to create Anthropic client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            model: claudius::Model::Custom(model),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[async_trait]
impl JudgeService for AnthropicJudge {
    async fn complete(&self, request: JudgeRequest) -> Result<String> {
        let mut params = claudius::MessageCreateParams::simple(
            claudius::MessageParam::user(request.prompt),
            self.model.clone(),
        );
        params.max_tokens = request.max_tokens;
        params.temperature = Some(0.0);

        debug!("Sending judge request ({} max tokens)", request.max_tokens);

        let response = tokio::time::timeout(self.timeout, self.client.send(params))
            .await
            .map_err(|_| {
                JudgeError::Request(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| JudgeError::Claudius(format!("Judge API call failed: {e}")))?;

        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                claudius::ContentBlock::Text(text_block) => Some(text_block.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}
