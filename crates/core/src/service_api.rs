//! Service trait definitions
//!
//! These traits are the boundary between the evaluation engine and the
//! remote services it measures. HTTP implementations live in the
//! knowledge-base and judge crates; tests substitute in-process stubs.

use crate::error::Result;
use async_trait::async_trait;

pub use super::models::*;

/// Ranked passage retrieval for a free-text query
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// Return passages in rank order, at most `request.max_results` of them
    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<RetrievedPassage>>;
}

/// Answer generation grounded in the same knowledge source
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAnswer>;
}

/// Bounded-length text completion used to grade answers
#[async_trait]
pub trait JudgeService: Send + Sync {
    /// Return the raw completion text; interpreting it is the caller's job
    async fn complete(&self, request: JudgeRequest) -> Result<String>;
}
