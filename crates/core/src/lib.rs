//! Core types and traits for the kbeval retrieval evaluation harness
//!
//! This crate provides the foundational abstractions used throughout
//! kbeval, including:
//!
//! - **Service traits**: retrieval, generation and judge boundaries
//! - **Models**: passages, answers and request types crossing those boundaries
//! - **Filters**: metadata filter expressions for retrieval calls
//! - **Configuration**: layered configuration loading and validation
//! - **Error handling**: unified error types
//!

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod service_api;

// Re-export main types for convenience
pub use config::{Config, JudgeConfig, KnowledgeBaseConfig, RunnerConfig, ThresholdsConfig};
pub use error::{Error, Result, ResultExt};
pub use filter::{FilterAttribute, RetrievalFilter};
pub use models::{
    Citation, GeneratedAnswer, GenerationRequest, JudgeRequest, PassageMetadata,
    RetrievalRequest, RetrievedPassage,
};
pub use service_api::{GenerationService, JudgeService, RetrievalService};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
