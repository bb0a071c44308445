//! Wire types for the knowledge-base proxy

use kbeval_core::{PassageMetadata, RetrievalFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const TOOL_QUERY: &str = "query_knowledge_base";
pub(crate) const TOOL_RETRIEVE_AND_GENERATE: &str = "retrieve_and_generate";
pub(crate) const TOOL_LIST_SOURCES: &str = "list_sources";
pub(crate) const TOOL_KB_INFO: &str = "get_knowledge_base_info";

/// Request body accepted by the proxy
#[derive(Debug, Serialize)]
pub(crate) struct ToolInvocation<'a, I: Serialize> {
    pub tool_name: &'a str,
    pub tool_input: I,
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryInput<'a> {
    pub query: &'a str,
    pub max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<&'a RetrievalFilter>,
    pub knowledge_base_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateInput<'a> {
    pub query: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_arn: Option<&'a str>,
    pub knowledge_base_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct KnowledgeBaseInput<'a> {
    pub knowledge_base_id: &'a str,
}

/// `{success, data, error, timestamp}` envelope every proxy response uses
#[derive(Debug, Deserialize)]
pub(crate) struct ProxyEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryData {
    #[serde(default)]
    pub results: Vec<RawPassage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPassage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub location: Value,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RagData {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<RawCitation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCitation {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub location: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SourcesData {
    #[serde(default)]
    pub sources: Vec<DataSourceSummary>,
}

/// A data source connected to the knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Knowledge base configuration summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
}
