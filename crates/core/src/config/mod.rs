//! Configuration module for kbeval
//!
//! This module provides configuration structures and loading mechanisms for the
//! evaluation harness. Configuration can be loaded from TOML files and/or
//! environment variables, and is passed explicitly into the runner and
//! evaluator rather than read from global state.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use defaults::{MAX_GENERATION_TOKENS, MAX_RETRIEVAL_RESULTS};

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.kbeval/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".kbeval").join("config.toml"))
}

/// Main configuration structure for kbeval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Knowledge-base proxy (retrieval + generation backend)
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// Judge model used for the faithfulness metric
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Pass/fail gates
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// Batch execution settings
    #[serde(default)]
    pub runner: RunnerConfig,
}

/// Configuration for the knowledge-base proxy
#[derive(Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// URL the proxy accepts tool invocations on
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Backend reference (knowledge base ID); or KBEVAL_KNOWLEDGE_BASE_ID
    #[serde(default)]
    pub knowledge_base_id: Option<String>,

    /// Optional bearer token (or use KBEVAL_KB_API_KEY env var)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Passages requested per retrieval call
    #[serde(default = "default_num_results")]
    pub num_results: usize,

    /// Generation output budget
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: u32,

    /// Generation temperature
    #[serde(default = "default_generation_temperature")]
    pub temperature: f32,

    /// Generation model override; the proxy's default is used when unset
    #[serde(default)]
    pub model_arn: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_kb_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for KnowledgeBaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBaseConfig")
            .field("endpoint", &self.endpoint)
            .field("knowledge_base_id", &self.knowledge_base_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field("num_results", &self.num_results)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("model_arn", &self.model_arn)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl KnowledgeBaseConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("KBEVAL_KB_API_KEY").ok())
    }

    /// The backend reference, which every run needs before issuing any call.
    pub fn require_knowledge_base_id(&self) -> Result<&str> {
        match self.knowledge_base_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::config(
                "No knowledge base reference. Pass --knowledge-base or set knowledge_base.knowledge_base_id",
            )),
        }
    }

    /// The proxy endpoint, which every run needs before issuing any call.
    pub fn require_endpoint(&self) -> Result<&str> {
        match self.endpoint.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(Error::config(
                "No knowledge base endpoint. Set knowledge_base.endpoint or KBEVAL_KNOWLEDGE_BASE__ENDPOINT",
            )),
        }
    }
}

/// Configuration for the judge model
///
/// # Providers
/// - `anthropic` (default): Anthropic Messages API, uses ANTHROPIC_API_KEY env var
/// - `localapi`: OpenAI-compatible chat completions endpoint (vLLM, llama.cpp, ...)
/// - `mock`: fixed-score judge for dry runs and tests
#[derive(Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Provider type: "anthropic" (default), "localapi", "mock"
    #[serde(default = "default_judge_provider")]
    pub provider: String,

    /// Model name to use
    #[serde(default = "default_judge_model")]
    pub model: String,

    /// API key (or use ANTHROPIC_API_KEY / KBEVAL_JUDGE_API_KEY env vars)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL for the localapi provider
    #[serde(default = "default_judge_api_base_url")]
    pub api_base_url: Option<String>,

    /// Judge output budget
    #[serde(default = "default_judge_max_tokens")]
    pub max_tokens: u32,

    /// Number of top-ranked passages included in the judge prompt
    #[serde(default = "default_context_passages")]
    pub context_passages: usize,

    /// Characters kept from each passage in the judge prompt
    #[serde(default = "default_passage_char_budget")]
    pub passage_char_budget: usize,

    /// Request timeout in seconds
    #[serde(default = "default_judge_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .field("api_base_url", &self.api_base_url)
            .field("max_tokens", &self.max_tokens)
            .field("context_passages", &self.context_passages)
            .field("passage_char_budget", &self.passage_char_budget)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl JudgeConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| match self.provider.as_str() {
            "anthropic" => std::env::var("ANTHROPIC_API_KEY").ok(),
            _ => std::env::var("KBEVAL_JUDGE_API_KEY").ok(),
        })
    }
}

/// Pass/fail gates applied to every case
///
/// A case passes iff `f1 >= min_f1`, `faithfulness >= min_faithfulness` and
/// `relevance >= min_relevance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default = "default_min_f1")]
    pub min_f1: f64,

    #[serde(default = "default_min_faithfulness")]
    pub min_faithfulness: f64,

    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
}

/// Configuration for batch execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum number of cases evaluated at once
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Deadline for the whole run; unfinished cases are recorded as timeouts
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Directory report snapshots are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

// Default implementations

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            knowledge_base_id: None,
            api_key: None,
            num_results: default_num_results(),
            max_tokens: default_generation_max_tokens(),
            temperature: default_generation_temperature(),
            model_arn: None,
            timeout_secs: default_kb_timeout_secs(),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            provider: default_judge_provider(),
            model: default_judge_model(),
            api_key: None,
            api_base_url: default_judge_api_base_url(),
            max_tokens: default_judge_max_tokens(),
            context_passages: default_context_passages(),
            passage_char_budget: default_passage_char_budget(),
            timeout_secs: default_judge_timeout_secs(),
        }
    }
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            min_f1: default_min_f1(),
            min_faithfulness: default_min_faithfulness(),
            min_relevance: default_min_relevance(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            run_timeout_secs: None,
            output_dir: default_output_dir(),
        }
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::config(format!(
            "{name} must be between 0.0 and 1.0 (got {value})"
        )));
    }
    Ok(())
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate knowledge base settings
        if self.knowledge_base.num_results == 0 {
            return Err(Error::config(
                "knowledge_base.num_results must be greater than 0".to_string(),
            ));
        }
        if self.knowledge_base.num_results > MAX_RETRIEVAL_RESULTS {
            return Err(Error::config(format!(
                "knowledge_base.num_results too large (max {MAX_RETRIEVAL_RESULTS}, got {})",
                self.knowledge_base.num_results
            )));
        }
        if self.knowledge_base.max_tokens == 0 {
            return Err(Error::config(
                "knowledge_base.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.knowledge_base.max_tokens > MAX_GENERATION_TOKENS {
            return Err(Error::config(format!(
                "knowledge_base.max_tokens too large (max {MAX_GENERATION_TOKENS}, got {})",
                self.knowledge_base.max_tokens
            )));
        }
        check_unit_interval(
            "knowledge_base.temperature",
            f64::from(self.knowledge_base.temperature),
        )?;
        if self.knowledge_base.timeout_secs == 0 {
            return Err(Error::config(
                "knowledge_base.timeout_secs must be greater than 0".to_string(),
            ));
        }

        // Validate judge
        let valid_providers = ["anthropic", "localapi", "mock"];
        if !valid_providers.contains(&self.judge.provider.as_str()) {
            return Err(Error::config(format!(
                "Invalid judge provider '{}'. Must be one of: {:?}",
                self.judge.provider, valid_providers
            )));
        }
        if self.judge.context_passages == 0 {
            return Err(Error::config(
                "judge.context_passages must be greater than 0".to_string(),
            ));
        }
        if self.judge.passage_char_budget == 0 {
            return Err(Error::config(
                "judge.passage_char_budget must be greater than 0".to_string(),
            ));
        }
        if self.judge.max_tokens == 0 {
            return Err(Error::config(
                "judge.max_tokens must be greater than 0".to_string(),
            ));
        }

        // Validate thresholds
        check_unit_interval("thresholds.min_f1", self.thresholds.min_f1)?;
        check_unit_interval(
            "thresholds.min_faithfulness",
            self.thresholds.min_faithfulness,
        )?;
        check_unit_interval("thresholds.min_relevance", self.thresholds.min_relevance)?;

        // Validate runner
        if self.runner.concurrency_limit == 0 {
            return Err(Error::config(
                "runner.concurrency_limit must be greater than 0".to_string(),
            ));
        }
        if self.runner.concurrency_limit > 64 {
            return Err(Error::config(format!(
                "runner.concurrency_limit too large (max 64, got {})",
                self.runner.concurrency_limit
            )));
        }
        if self.runner.run_timeout_secs == Some(0) {
            return Err(Error::config(
                "runner.run_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Saves the configuration to a TOML file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, toml_string)
            .map_err(|e| Error::config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }
}
