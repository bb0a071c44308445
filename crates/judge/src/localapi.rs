//! OpenAI-compatible chat completions judge

use crate::error::JudgeError;
use async_trait::async_trait;
use kbeval_core::error::Result;
use kbeval_core::{JudgeRequest, JudgeService};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Judge backed by a local OpenAI-compatible server (vLLM, llama.cpp, ...)
pub struct LocalApiJudge {
    client: Client,
    model: String,
    api_base_url: String,
    api_key: Option<String>,
}

impl LocalApiJudge {
    /// Create a new local API judge
    ///
    /// # Arguments
    /// * `model` - Model name served by the endpoint
    /// * `api_base_url` - Base URL for the API (e.g., "http://localhost:8000/v1")
    /// * `api_key` - Optional bearer token
    /// * `timeout_secs` - Request timeout in seconds
    pub fn new(
        model: String,
        api_base_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        info!("Initializing local API judge");
        info!("  Model: {model}");
        info!("  API Base URL: {api_base_url}");
        info!("  Timeout: {timeout_secs}s");

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| JudgeError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl JudgeService for LocalApiJudge {
    async fn complete(&self, request: JudgeRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.api_base_url);
        debug!("Sending judge request to {url}");

        let mut http_request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request.send().await.map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection"
            } else {
                "request"
            };
            warn!("Judge request failed ({error_kind}): {e}");
            JudgeError::Request(format!("{error_kind}: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(JudgeError::Api(format!("{status}: {error_text}")).into());
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::Api(format!("Failed to parse completion response: {e}")))?;

        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| JudgeError::Api("Completion response has no content".to_string()))?;

        Ok(text)
    }
}
