//! Batch execution of test cases

use crate::evaluator::CaseEvaluator;
use crate::ground_truth::TestCase;
use crate::report::{CaseResult, Report};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use kbeval_core::config::RunnerConfig;
use kbeval_core::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Callback invoked as each case completes, in completion order
pub type ProgressFn = Arc<dyn Fn(&CaseResult) + Send + Sync>;

/// Drives test cases through a [`CaseEvaluator`] with bounded concurrency
pub struct BatchRunner {
    evaluator: Arc<CaseEvaluator>,
    concurrency_limit: usize,
    run_timeout: Option<Duration>,
    progress: Option<ProgressFn>,
}

impl BatchRunner {
    pub fn new(evaluator: Arc<CaseEvaluator>, config: &RunnerConfig) -> Self {
        Self {
            evaluator,
            concurrency_limit: config.concurrency_limit.max(1),
            run_timeout: config.run_timeout_secs.map(Duration::from_secs),
            progress: None,
        }
    }

    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Evaluate `cases` and aggregate the results.
    ///
    /// Results keep the input order. Cases still running at the run
    /// deadline are recorded with a `"timeout"` error. An empty case set
    /// is a configuration error.
    pub async fn run(&self, cases: &[TestCase]) -> Result<Report> {
        if cases.is_empty() {
            return Err(Error::config(
                "No test cases to run; check the category and partition filters",
            ));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting run {run_id}: {} cases against {} (concurrency {})",
            cases.len(),
            self.evaluator.knowledge_base_id(),
            self.concurrency_limit
        );

        let mut slots: Vec<Option<CaseResult>> = vec![None; cases.len()];

        let mut results = stream::iter(cases.iter().enumerate())
            .map(|(idx, case)| {
                let evaluator = Arc::clone(&self.evaluator);
                async move { (idx, evaluator.evaluate(case).await) }
            })
            .buffer_unordered(self.concurrency_limit);

        let deadline = self.run_timeout.map(|t| Instant::now() + t);

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, results.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Run deadline reached; recording unfinished cases as timeouts");
                        break;
                    }
                },
                None => results.next().await,
            };

            let Some((idx, result)) = next else { break };
            if let Some(progress) = &self.progress {
                progress(&result);
            }
            slots[idx] = Some(result);
        }

        // Dropping the stream cancels anything still in flight
        drop(results);

        let case_results: Vec<CaseResult> = slots
            .into_iter()
            .zip(cases)
            .map(|(slot, case)| slot.unwrap_or_else(|| CaseResult::timed_out(case)))
            .collect();

        let report = Report::build(
            run_id,
            started_at,
            self.evaluator.knowledge_base_id(),
            *self.evaluator.thresholds(),
            case_results,
        );

        info!(
            "Run {run_id} finished: {}/{} passed, {} errors",
            report.passed, report.total, report.error_count
        );
        Ok(report)
    }
}
