//! Evaluation metrics for retrieval and answer quality.
//!
//! Metrics implemented (all in [0, 1]):
//! - **Precision**: fraction of retrieved passages whose source is expected
//! - **Recall**: fraction of expected evidence strings present in retrieved text
//! - **F1**: harmonic mean of precision and recall
//! - **MRR**: reciprocal rank of the first passage from an expected source
//! - **Relevance**: fraction of expected answer terms present in the answer
//! - **Faithfulness**: judge-graded support of the answer by the passages
//!   (see [`crate::faithfulness`])
//!
//! # Source matching
//!
//! A passage matches an expected source iff the expected identifier is a
//! contiguous, case-sensitive substring of the passage's `source_id`.
//! Ground truth names files (`seller-guide-us.md`) while backends report
//! full locations (`s3://bucket/documents/seller-guide-us.md`).

use crate::ground_truth::TestCase;
use kbeval_core::config::ThresholdsConfig;
use kbeval_core::RetrievedPassage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Metric names in report order
pub const METRIC_NAMES: [&str; 6] = [
    "precision",
    "recall",
    "f1",
    "mrr",
    "faithfulness",
    "relevance",
];

/// The six scalar metrics for one case, or their means over many
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub mrr: f64,
    pub faithfulness: f64,
    pub relevance: f64,
}

impl MetricScores {
    /// Values in [`METRIC_NAMES`] order
    pub fn values(&self) -> [f64; 6] {
        [
            self.precision,
            self.recall,
            self.f1,
            self.mrr,
            self.faithfulness,
            self.relevance,
        ]
    }

    /// Metric names paired with values, in report order
    pub fn named(&self) -> [(&'static str, f64); 6] {
        let values = self.values();
        std::array::from_fn(|i| (METRIC_NAMES[i], values[i]))
    }

    /// A case passes iff F1, faithfulness and relevance all meet their thresholds
    pub fn passes(&self, thresholds: &ThresholdsConfig) -> bool {
        self.f1 >= thresholds.min_f1
            && self.faithfulness >= thresholds.min_faithfulness
            && self.relevance >= thresholds.min_relevance
    }

    /// Arithmetic mean of each metric; `None` for an empty input
    pub fn mean<'a>(scores: impl IntoIterator<Item = &'a MetricScores>) -> Option<MetricScores> {
        let mut count = 0usize;
        let mut sum = MetricScores {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
            mrr: 0.0,
            faithfulness: 0.0,
            relevance: 0.0,
        };

        for s in scores {
            count += 1;
            sum.precision += s.precision;
            sum.recall += s.recall;
            sum.f1 += s.f1;
            sum.mrr += s.mrr;
            sum.faithfulness += s.faithfulness;
            sum.relevance += s.relevance;
        }

        if count == 0 {
            return None;
        }

        let n = count as f64;
        Some(MetricScores {
            precision: sum.precision / n,
            recall: sum.recall / n,
            f1: sum.f1 / n,
            mrr: sum.mrr / n,
            faithfulness: sum.faithfulness / n,
            relevance: sum.relevance / n,
        })
    }
}

/// Whether `source_id` matches the expected source identifier
pub fn source_matches(expected: &str, source_id: &str) -> bool {
    source_id.contains(expected)
}

fn matches_any(passage: &RetrievedPassage, expected_sources: &[String]) -> bool {
    expected_sources
        .iter()
        .any(|expected| source_matches(expected, &passage.source_id))
}

/// Matching passages / retrieved passages; 0.0 when nothing was retrieved
pub fn precision(passages: &[RetrievedPassage], expected_sources: &[String]) -> f64 {
    if passages.is_empty() {
        return 0.0;
    }

    let matching = passages
        .iter()
        .filter(|p| matches_any(p, expected_sources))
        .count();

    matching as f64 / passages.len() as f64
}

/// Distinct evidence strings found case-insensitively in the combined
/// passage text / distinct evidence strings; 1.0 when nothing is expected
pub fn recall(passages: &[RetrievedPassage], expected_evidence: &[String]) -> f64 {
    let evidence: BTreeSet<String> = expected_evidence.iter().map(|e| e.to_lowercase()).collect();
    if evidence.is_empty() {
        return 1.0;
    }

    let haystack = passages
        .iter()
        .map(|p| p.content.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let found = evidence.iter().filter(|e| haystack.contains(e.as_str())).count();
    found as f64 / evidence.len() as f64
}

/// Harmonic mean of precision and recall; 0.0 when both are 0
pub fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// 1 / rank (1-indexed) of the first passage from an expected source; 0.0 if none
pub fn mrr(passages: &[RetrievedPassage], expected_sources: &[String]) -> f64 {
    passages
        .iter()
        .position(|p| matches_any(p, expected_sources))
        .map_or(0.0, |idx| 1.0 / (idx + 1) as f64)
}

/// Distinct expected terms found case-insensitively in the answer / distinct
/// expected terms; 1.0 when none expected
pub fn relevance(answer: &str, expected_terms: &[String]) -> f64 {
    let terms: BTreeSet<String> = expected_terms.iter().map(|t| t.to_lowercase()).collect();
    if terms.is_empty() {
        return 1.0;
    }

    let answer = answer.to_lowercase();
    let found = terms.iter().filter(|t| answer.contains(t.as_str())).count();

    found as f64 / terms.len() as f64
}

/// Compute all six metrics for a case given its faithfulness grade
pub fn score_case(
    case: &TestCase,
    passages: &[RetrievedPassage],
    answer: &str,
    faithfulness: f64,
) -> MetricScores {
    let precision = precision(passages, &case.expected_sources);
    let recall = recall(passages, &case.expected_evidence);

    MetricScores {
        precision,
        recall,
        f1: f1(precision, recall),
        mrr: mrr(passages, &case.expected_sources),
        faithfulness: faithfulness.clamp(0.0, 1.0),
        relevance: relevance(answer, &case.expected_answer_terms),
    }
}
