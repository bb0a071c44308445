//! HTTP client for the knowledge-base proxy

use crate::error::KnowledgeBaseError;
use crate::location::extract_location;
use crate::types::*;
use async_trait::async_trait;
use kbeval_core::config::MAX_RETRIEVAL_RESULTS;
use kbeval_core::error::Result;
use kbeval_core::{
    Citation, GeneratedAnswer, GenerationRequest, GenerationService, RetrievalRequest,
    RetrievalService, RetrievedPassage,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Response wrappers are peeled at most this many times
const MAX_ENVELOPE_DEPTH: usize = 4;

/// Generation settings sent with every `retrieve_and_generate` call
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub model_arn: Option<String>,
}

/// Knowledge-base proxy client
///
/// Speaks the proxy's tool-invocation protocol: every call is a POST of
/// `{"tool_name", "tool_input"}` answered by a `{success, data | error}`
/// envelope, possibly wrapped in a Lambda response or an MCP tool result.
pub struct KnowledgeBaseClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    generation: GenerationSettings,
}

impl KnowledgeBaseClient {
    /// Create a new knowledge-base client
    ///
    /// # Arguments
    /// * `endpoint` - URL the proxy accepts tool invocations on
    /// * `api_key` - Optional bearer token
    /// * `timeout_secs` - Request timeout in seconds
    /// * `generation` - Settings for answer generation calls
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        timeout_secs: u64,
        generation: GenerationSettings,
    ) -> Result<Self> {
        info!("Initializing knowledge base client");
        info!("  Endpoint: {endpoint}");
        info!("  Timeout: {timeout_secs}s");
        info!("  Generation max tokens: {}", generation.max_tokens);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                KnowledgeBaseError::ConfigError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            generation,
        })
    }

    /// List the data sources connected to a knowledge base
    pub async fn list_sources(&self, knowledge_base_id: &str) -> Result<Vec<DataSourceSummary>> {
        let data: SourcesData = self
            .invoke(TOOL_LIST_SOURCES, KnowledgeBaseInput { knowledge_base_id })
            .await?;
        Ok(data.sources)
    }

    /// Fetch the knowledge base configuration summary
    pub async fn knowledge_base_info(&self, knowledge_base_id: &str) -> Result<KnowledgeBaseInfo> {
        self.invoke(TOOL_KB_INFO, KnowledgeBaseInput { knowledge_base_id })
            .await
    }

    /// Invoke one proxy tool and decode its `data` payload
    async fn invoke<I, T>(&self, tool_name: &str, tool_input: I) -> Result<T>
    where
        I: Serialize + Send,
        T: DeserializeOwned,
    {
        let body = ToolInvocation {
            tool_name,
            tool_input,
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.send().await.map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connection"
            } else if e.is_request() {
                "request build"
            } else if e.is_body() {
                "body"
            } else {
                "unknown"
            };
            warn!("{tool_name} failed ({error_kind}): {e}");
            KnowledgeBaseError::TransportError(format!("{tool_name} failed ({error_kind}): {e}"))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            KnowledgeBaseError::TransportError(format!(
                "Failed to read {tool_name} response body: {e}"
            ))
        })?;

        let data = decode_response(status, &text)?;
        serde_json::from_value(data).map_err(|e| {
            KnowledgeBaseError::ResponseFormatError(format!(
                "Failed to parse {tool_name} payload: {e}"
            ))
            .into()
        })
    }
}

/// Decode an HTTP response from the proxy into its `data` payload
pub(crate) fn decode_response(
    status: StatusCode,
    body: &str,
) -> std::result::Result<Value, KnowledgeBaseError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(KnowledgeBaseError::TransportError(
            "Service is busy (throttled)".to_string(),
        ));
    }

    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if !status.is_success() {
        // Prefer the proxy's own error message when the body carries one
        let message = parsed
            .and_then(|v| unwrap_envelope(v).err())
            .map(|e| e.to_string())
            .unwrap_or_else(|| truncate_for_error(body));
        return Err(KnowledgeBaseError::BackendError(format!(
            "HTTP {status}: {message}"
        )));
    }

    let value = parsed.ok_or_else(|| {
        KnowledgeBaseError::ResponseFormatError(format!(
            "Body is not JSON: {}",
            truncate_for_error(body)
        ))
    })?;
    unwrap_envelope(value)
}

/// Peel Lambda and MCP wrappers until the proxy envelope is reached
fn unwrap_envelope(mut value: Value) -> std::result::Result<Value, KnowledgeBaseError> {
    for _ in 0..MAX_ENVELOPE_DEPTH {
        // JSON-RPC error from an MCP gateway
        if let Some(err) = value.get("jsonrpc").and(value.get("error")) {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(KnowledgeBaseError::BackendError(message));
        }

        // MCP tool result: {"result": {"content": [{"type": "text", "text": "..."}]}}
        if let Some(content) = value
            .get("result")
            .and_then(|r| r.get("content"))
            .and_then(Value::as_array)
        {
            let text = content
                .iter()
                .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .and_then(|item| item.get("text"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    KnowledgeBaseError::ResponseFormatError(
                        "No text content in tool result".to_string(),
                    )
                })?;
            value = parse_nested(text)?;
            continue;
        }

        // Lambda response: {"statusCode": 200, "body": "<json>"}
        if value.get("statusCode").is_some() {
            if let Some(body) = value.get("body") {
                value = match body {
                    Value::String(text) => parse_nested(text)?,
                    other => other.clone(),
                };
                continue;
            }
        }

        let envelope: ProxyEnvelope = serde_json::from_value(value).map_err(|e| {
            KnowledgeBaseError::ResponseFormatError(format!("Not a proxy envelope: {e}"))
        })?;

        if !envelope.success {
            return Err(KnowledgeBaseError::BackendError(
                envelope
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        return envelope.data.ok_or_else(|| {
            KnowledgeBaseError::ResponseFormatError("Envelope has no data".to_string())
        });
    }

    Err(KnowledgeBaseError::ResponseFormatError(
        "Response nested too deeply".to_string(),
    ))
}

fn parse_nested(text: &str) -> std::result::Result<Value, KnowledgeBaseError> {
    serde_json::from_str(text).map_err(|e| {
        KnowledgeBaseError::ResponseFormatError(format!(
            "Embedded body is not JSON ({e}): {}",
            truncate_for_error(text)
        ))
    })
}

fn truncate_for_error(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl RetrievalService for KnowledgeBaseClient {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<RetrievedPassage>> {
        if let Some(filter) = &request.filter {
            filter.validate()?;
        }

        let max_results = request.max_results.min(MAX_RETRIEVAL_RESULTS);
        debug!(
            "Retrieving up to {max_results} passages for '{}'",
            request.query
        );

        let data: QueryData = self
            .invoke(
                TOOL_QUERY,
                QueryInput {
                    query: &request.query,
                    max_results,
                    filter: request.filter.as_ref(),
                    knowledge_base_id: &request.knowledge_base_id,
                },
            )
            .await?;

        let passages: Vec<RetrievedPassage> = data
            .results
            .into_iter()
            .take(max_results)
            .map(|raw| RetrievedPassage {
                content: raw.content,
                score: raw.score,
                source_id: extract_location(&raw.location),
                metadata: raw.metadata,
            })
            .collect();

        debug!("Retrieved {} passages", passages.len());
        Ok(passages)
    }
}

#[async_trait]
impl GenerationService for KnowledgeBaseClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAnswer> {
        debug!("Generating answer for '{}'", request.query);

        let data: RagData = self
            .invoke(
                TOOL_RETRIEVE_AND_GENERATE,
                GenerateInput {
                    query: &request.query,
                    max_tokens: self.generation.max_tokens,
                    temperature: self.generation.temperature,
                    model_arn: self.generation.model_arn.as_deref(),
                    knowledge_base_id: &request.knowledge_base_id,
                },
            )
            .await?;

        Ok(GeneratedAnswer {
            answer: data.answer,
            citations: data
                .citations
                .into_iter()
                .map(|c| Citation {
                    source_id: extract_location(&c.location),
                    content: c.content,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_bare_envelope() {
        let body = json!({
            "success": true,
            "data": {"results": [], "count": 0, "query": "fees"},
            "timestamp": "2025-01-01T00:00:00Z"
        })
        .to_string();

        let data = decode_response(StatusCode::OK, &body).unwrap();
        assert_eq!(data["count"], json!(0));
    }

    #[test]
    fn test_decode_lambda_wrapped_envelope() {
        let inner = json!({"success": true, "data": {"answer": "It costs $39.99/month."}});
        let body = json!({
            "statusCode": 200,
            "body": inner.to_string(),
            "headers": {"Content-Type": "application/json"}
        })
        .to_string();

        let data = decode_response(StatusCode::OK, &body).unwrap();
        assert_eq!(data["answer"], json!("It costs $39.99/month."));
    }

    #[test]
    fn test_decode_mcp_wrapped_lambda_response() {
        let lambda = json!({
            "statusCode": 200,
            "body": json!({"success": true, "data": {"sources": []}}).to_string()
        });
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": lambda.to_string()}]}
        })
        .to_string();

        let data = decode_response(StatusCode::OK, &body).unwrap();
        assert_eq!(data, json!({"sources": []}));
    }

    #[test]
    fn test_decode_unsuccessful_envelope_is_backend_error() {
        let body = json!({
            "statusCode": 400,
            "body": json!({"success": false, "error": "Knowledge base not found"}).to_string()
        })
        .to_string();

        let err = decode_response(StatusCode::OK, &body).unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::BackendError(ref m) if m.contains("not found")));
        assert!(kbeval_core::Error::from(err).is_transport());
    }

    #[test]
    fn test_decode_jsonrpc_error() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32602, "message": "Unknown tool"}
        })
        .to_string();

        let err = decode_response(StatusCode::OK, &body).unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::BackendError(ref m) if m == "Unknown tool"));
    }

    #[test]
    fn test_decode_throttled() {
        let err = decode_response(StatusCode::TOO_MANY_REQUESTS, "").unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::TransportError(_)));
    }

    #[test]
    fn test_decode_http_error_prefers_proxy_message() {
        let body = json!({"success": false, "error": "Service is busy"}).to_string();
        let err = decode_response(StatusCode::INTERNAL_SERVER_ERROR, &body).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("Service is busy"));
    }

    #[test]
    fn test_decode_non_json_body() {
        let err = decode_response(StatusCode::OK, "<html>gateway error</html>").unwrap_err();
        assert!(matches!(err, KnowledgeBaseError::ResponseFormatError(_)));
        assert!(kbeval_core::Error::from(err).is_transport());
    }

    #[test]
    fn test_query_data_maps_to_passages() {
        let data = json!({
            "results": [
                {
                    "content": "Professional selling plan: $39.99/month",
                    "score": 0.8123,
                    "location": "s3://kb-docs/documents/seller-guide-us.md",
                    "metadata": {"marketplace": "US"}
                },
                {
                    "content": "Individual plan",
                    "location": {"s3Location": {"uri": "s3://kb-docs/documents/seller-guide-uk.md"}}
                }
            ]
        });

        let parsed: QueryData = serde_json::from_value(data).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1].score, 0.0);
        assert_eq!(
            extract_location(&parsed.results[1].location),
            "s3://kb-docs/documents/seller-guide-uk.md"
        );
        assert_eq!(parsed.results[0].metadata["marketplace"], json!("US"));
    }

    #[test]
    fn test_query_input_wire_shape() {
        let filter = kbeval_core::RetrievalFilter::equals("marketplace", "UK");
        let invocation = ToolInvocation {
            tool_name: TOOL_QUERY,
            tool_input: QueryInput {
                query: "return window",
                max_results: 5,
                filter: Some(&filter),
                knowledge_base_id: "KB1",
            },
        };

        assert_eq!(
            serde_json::to_value(&invocation).unwrap(),
            json!({
                "tool_name": "query_knowledge_base",
                "tool_input": {
                    "query": "return window",
                    "max_results": 5,
                    "filter": {"equals": {"key": "marketplace", "value": "UK"}},
                    "knowledge_base_id": "KB1"
                }
            })
        );
    }

    #[test]
    fn test_generate_input_omits_unset_model() {
        let input = GenerateInput {
            query: "q",
            max_tokens: 2048,
            temperature: 0.5,
            model_arn: None,
            knowledge_base_id: "KB1",
        };
        let value = serde_json::to_value(&input).unwrap();
        assert!(value.get("model_arn").is_none());
        assert_eq!(value["max_tokens"], json!(2048));
    }

    #[test]
    fn test_truncate_for_error_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_for_error(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
    }
}
