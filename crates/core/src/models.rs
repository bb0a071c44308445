//! Request and response models shared by the evaluation engine and the
//! service clients

use crate::filter::RetrievalFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque per-passage metadata as returned by the retrieval backend
pub type PassageMetadata = BTreeMap<String, serde_json::Value>;

/// One scored result from the Retrieval Service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub content: String,
    /// Backend-defined scale; never compared across backends
    pub score: f64,
    /// Where the passage came from (an S3 URI, URL or file path)
    pub source_id: String,
    #[serde(default)]
    pub metadata: PassageMetadata,
}

impl RetrievedPassage {
    pub fn new(content: impl Into<String>, score: f64, source_id: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score,
            source_id: source_id.into(),
            metadata: PassageMetadata::new(),
        }
    }
}

/// Retrieval call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    /// Backend reference (knowledge base ID)
    pub knowledge_base_id: String,
    pub max_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<RetrievalFilter>,
}

/// Generation call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub query: String,
    /// Backend reference (knowledge base ID)
    pub knowledge_base_id: String,
}

/// A reference the generator cited for its answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: String,
    #[serde(default)]
    pub content: String,
}

/// Generation call result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub answer: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl GeneratedAnswer {
    /// Distinct non-empty citation source ids, in first-cited order
    pub fn cited_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for c in &self.citations {
            let id = c.source_id.as_str();
            if !id.is_empty() && !sources.contains(&id) {
                sources.push(id);
            }
        }
        sources
    }
}

/// Judge call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub prompt: String,
    pub max_tokens: u32,
}
