//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `KBEVAL_` and use double underscores
    /// for nested values. For example:
    /// - `KBEVAL_JUDGE__PROVIDER=localapi`
    /// - `KBEVAL_THRESHOLDS__MIN_F1=0.8`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        // Thresholds are the operator-facing gates, keep them explicit even when the section is absent
        let builder = set_config_default(builder, "thresholds.min_f1", default_min_f1())?;
        let builder = set_config_default(
            builder,
            "thresholds.min_faithfulness",
            default_min_faithfulness(),
        )?;
        let builder =
            set_config_default(builder, "thresholds.min_relevance", default_min_relevance())?;

        // Runner defaults
        let builder = set_config_default(
            builder,
            "runner.concurrency_limit",
            default_concurrency_limit() as i64,
        )?;
        let mut builder = set_config_default(builder, "runner.output_dir", default_output_dir())?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        // Add environment variables with KBEVAL_ prefix
        builder = builder.add_source(
            Environment::with_prefix("KBEVAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Convenience variables for the common CI case
        if let Ok(kb_id) = std::env::var("KBEVAL_KNOWLEDGE_BASE_ID") {
            builder = builder
                .set_override("knowledge_base.knowledge_base_id", kb_id)
                .map_err(|e| {
                    Error::config(format!("Failed to set KBEVAL_KNOWLEDGE_BASE_ID: {e}"))
                })?;
        }
        if let Ok(endpoint) = std::env::var("KBEVAL_ENDPOINT") {
            builder = builder
                .set_override("knowledge_base.endpoint", endpoint)
                .map_err(|e| Error::config(format!("Failed to set KBEVAL_ENDPOINT: {e}")))?;
        }
        if let Ok(limit) = std::env::var("KBEVAL_CONCURRENCY") {
            if let Ok(val) = limit.parse::<i64>() {
                builder = builder
                    .set_override("runner.concurrency_limit", val)
                    .map_err(|e| {
                        Error::config(format!("Failed to set KBEVAL_CONCURRENCY: {e}"))
                    })?;
            }
        }

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.kbeval/config.toml or custom --config path)
    /// 3. Environment variables (KBEVAL_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
