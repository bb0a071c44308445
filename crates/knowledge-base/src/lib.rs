//! Knowledge-base proxy client
//!
//! This crate implements the retrieval and generation service boundaries
//! against the knowledge-base proxy: a single HTTP endpoint that accepts
//! tool invocations and answers with a success/error envelope.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use kbeval_core::config::KnowledgeBaseConfig;
use kbeval_core::error::Result;
use std::sync::Arc;
use tracing::info;

pub mod error;
mod location;
mod proxy;
mod types;

pub use error::KnowledgeBaseError;
pub use location::extract_location;
pub use proxy::{GenerationSettings, KnowledgeBaseClient};
pub use types::{DataSourceSummary, KnowledgeBaseInfo};

/// Create a knowledge-base client from configuration
///
/// The same client serves both retrieval and generation, so callers clone
/// the returned `Arc` into each role.
///
/// # Arguments
/// * `config` - Knowledge base configuration including the proxy endpoint
pub fn create_knowledge_base_client(
    config: &KnowledgeBaseConfig,
) -> Result<Arc<KnowledgeBaseClient>> {
    let endpoint = config.require_endpoint()?.to_string();

    info!("Creating knowledge base client");
    let client = KnowledgeBaseClient::new(
        endpoint,
        config.resolve_api_key(),
        config.timeout_secs,
        GenerationSettings {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            model_arn: config.model_arn.clone(),
        },
    )?;

    Ok(Arc::new(client))
}
