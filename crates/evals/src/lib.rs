//! Retrieval-accuracy evaluation engine
//!
//! Issues a fixed battery of ground truth queries against a knowledge base,
//! scores each response with retrieval metrics and an LLM judge, and
//! aggregates the results into a report with pass/fail verdicts.
//!
//! The pieces, leaves first:
//!
//! - [`ground_truth`]: the test case registry
//! - [`eval_metrics`] and [`faithfulness`]: metric calculators
//! - [`evaluator`]: runs one case
//! - [`runner`]: runs many cases with bounded concurrency
//! - [`report`]: aggregation, snapshots and console output
//! - [`compare`]: trend comparison between snapshots

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod compare;
pub mod eval_metrics;
pub mod evaluator;
pub mod faithfulness;
pub mod ground_truth;
pub mod report;
pub mod runner;

pub use compare::{compare, MetricDelta, ReportComparison};
pub use eval_metrics::MetricScores;
pub use evaluator::CaseEvaluator;
pub use faithfulness::{FaithfulnessGrade, FaithfulnessGrader};
pub use ground_truth::{GroundTruthStore, TestCase, PARTITION_BOTH};
pub use report::{CaseResult, GroupStats, Report};
pub use runner::{BatchRunner, ProgressFn};
