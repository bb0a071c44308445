//! Fixed-score judge for dry runs

use async_trait::async_trait;
use kbeval_core::error::Result;
use kbeval_core::{JudgeRequest, JudgeService};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Judge that always returns the same grade without calling a model
#[derive(Debug)]
pub struct MockJudge {
    score: f64,
    calls: AtomicUsize,
}

impl MockJudge {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completions served so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for MockJudge {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl JudgeService for MockJudge {
    async fn complete(&self, _request: JudgeRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(serde_json::json!({
            "score": self.score,
            "reasoning": "mock judge"
        })
        .to_string())
    }
}
