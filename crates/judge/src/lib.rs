//! Judge providers for answer grading
//!
//! A judge is a bounded-length text completion service. The evaluation
//! engine builds the grading prompt and interprets the reply; providers
//! here only move text to a model and back.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use kbeval_core::config::JudgeConfig;
use kbeval_core::error::{Error, Result};
use kbeval_core::JudgeService;
use std::sync::Arc;
use tracing::info;

mod anthropic;
pub mod error;
mod localapi;
mod mock;

pub use anthropic::AnthropicJudge;
pub use error::JudgeError;
pub use localapi::LocalApiJudge;
pub use mock::MockJudge;

/// Create a judge based on configuration
///
/// # Arguments
/// * `config` - Judge configuration including provider type
pub fn create_judge(config: &JudgeConfig) -> Result<Arc<dyn JudgeService>> {
    match config.provider.as_str() {
        "anthropic" => {
            let api_key = config.resolve_api_key().ok_or_else(|| {
                Error::from(JudgeError::MissingApiKey(
                    "anthropic (set judge.api_key or ANTHROPIC_API_KEY)".to_string(),
                ))
            })?;

            info!("Creating Anthropic judge");
            let judge = AnthropicJudge::new(api_key, config.model.clone(), config.timeout_secs)?;
            Ok(Arc::new(judge))
        }
        "localapi" => {
            let api_base_url = config
                .api_base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:8000/v1".to_string());

            info!("Creating local API judge");
            let judge = LocalApiJudge::new(
                config.model.clone(),
                api_base_url,
                config.resolve_api_key(),
                config.timeout_secs,
            )?;
            Ok(Arc::new(judge))
        }
        "mock" => {
            info!("Creating mock judge");
            Ok(Arc::new(MockJudge::default()))
        }
        other => Err(Error::config(format!(
            "Unknown judge provider: '{other}'. Valid providers: anthropic, localapi, mock"
        ))),
    }
}
