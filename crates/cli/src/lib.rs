//! Library interface for the kbeval CLI
//!
//! This module exposes the command wiring for integration testing while
//! keeping argument parsing in main.rs.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use kbeval_evals::{BatchRunner, CaseEvaluator, CaseResult, GroundTruthStore, Report, TestCase};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

// Re-export commonly needed types for tests
pub use kbeval_core::config::Config;

/// Command-line overrides for an evaluation run
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub knowledge_base: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub num_results: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub min_f1: Option<f64>,
    pub min_faithfulness: Option<f64>,
    pub min_relevance: Option<f64>,
}

impl RunOverrides {
    /// Apply overrides on top of loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(id) = &self.knowledge_base {
            config.knowledge_base.knowledge_base_id = Some(id.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.runner.output_dir = dir.to_string_lossy().into_owned();
        }
        if let Some(n) = self.concurrency {
            config.runner.concurrency_limit = n;
        }
        if let Some(n) = self.num_results {
            config.knowledge_base.num_results = n;
        }
        if let Some(secs) = self.timeout_secs {
            config.runner.run_timeout_secs = Some(secs);
        }
        if let Some(v) = self.min_f1 {
            config.thresholds.min_f1 = v;
        }
        if let Some(v) = self.min_faithfulness {
            config.thresholds.min_faithfulness = v;
        }
        if let Some(v) = self.min_relevance {
            config.thresholds.min_relevance = v;
        }
    }
}

/// Cases from the built-in corpus matching the optional filters
pub fn select_cases(category: Option<&str>, partition: Option<&str>) -> Vec<TestCase> {
    GroundTruthStore::builtin()
        .filter(category, partition)
        .into_iter()
        .cloned()
        .collect()
}

/// Render the corpus listing printed by `kbeval cases`
pub fn format_cases(cases: &[TestCase]) -> String {
    let mut out = format!(
        "{:<36} {:<11} {:<9} QUERY\n",
        "ID", "CATEGORY", "PARTITION"
    );
    for case in cases {
        out.push_str(&format!(
            "{:<36} {:<11} {:<9} {}\n",
            case.id, case.category, case.partition, case.query
        ));
    }
    out.push_str(&format!("\n{} cases\n", cases.len()));
    out
}

/// Progress bar for a run over `total` cases
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| error!("Failed to set progress bar style: {}", e))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb
}

/// Validate configuration, build the service clients and run `cases`.
///
/// Every configuration problem surfaces here before any network call.
pub async fn run_evaluation(
    config: &Config,
    cases: &[TestCase],
    progress: Option<ProgressBar>,
) -> Result<Report> {
    config.validate().context("Invalid configuration")?;
    config.knowledge_base.require_knowledge_base_id()?;
    if cases.is_empty() {
        anyhow::bail!("No test cases match the selected category/partition filters");
    }

    let knowledge_base = kbeval_knowledge_base::create_knowledge_base_client(&config.knowledge_base)
        .context("Failed to create knowledge base client")?;
    let judge =
        kbeval_judge::create_judge(&config.judge).context("Failed to create judge")?;

    let evaluator = Arc::new(CaseEvaluator::new(
        config,
        knowledge_base.clone(),
        knowledge_base,
        judge,
    )?);

    let mut runner = BatchRunner::new(evaluator, &config.runner);
    if let Some(pb) = progress.clone() {
        runner = runner.with_progress(Arc::new(move |result: &CaseResult| {
            pb.set_message(result.case_id.clone());
            pb.inc(1);
        }));
    }

    info!("Evaluating {} cases", cases.len());
    let report = runner.run(cases).await?;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    Ok(report)
}
