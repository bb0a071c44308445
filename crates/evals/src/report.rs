//! Per-case results, aggregation and report snapshots

use crate::eval_metrics::MetricScores;
use crate::ground_truth::TestCase;
use chrono::{DateTime, Utc};
use kbeval_core::config::ThresholdsConfig;
use kbeval_core::error::{Error, Result, ResultExt};
use kbeval_core::RetrievedPassage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Snapshot format version; bumped only for incompatible changes
pub const SCHEMA_VERSION: u32 = 1;

/// File name of the most recent snapshot in an output directory
pub const LATEST_SNAPSHOT: &str = "latest.json";

/// Error recorded for cases still running at the run deadline
pub const TIMEOUT_ERROR: &str = "timeout";

/// Outcome of evaluating one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub case_id: String,
    pub query: String,
    pub partition: String,
    pub category: String,
    /// Retrieved passages in rank order
    #[serde(default)]
    pub passages: Vec<RetrievedPassage>,
    #[serde(default)]
    pub answer: String,
    /// Distinct source ids among the passages, in first-seen order
    #[serde(default)]
    pub observed_sources: Vec<String>,
    /// Source ids the generated answer cited
    #[serde(default)]
    pub cited_sources: Vec<String>,
    #[serde(default)]
    pub latency_ms: u64,
    /// Absent iff `error` is set
    #[serde(default)]
    pub metrics: Option<MetricScores>,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub faithfulness_reasoning: Option<String>,
    /// Non-fatal problems, e.g. an unparseable judge reply
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CaseResult {
    /// A scored result
    pub fn scored(
        case: &TestCase,
        passages: Vec<RetrievedPassage>,
        answer: String,
        latency_ms: u64,
        metrics: MetricScores,
        thresholds: &ThresholdsConfig,
    ) -> Self {
        let observed_sources = distinct_sources(&passages);
        Self {
            passed: metrics.passes(thresholds),
            metrics: Some(metrics),
            passages,
            answer,
            observed_sources,
            latency_ms,
            ..Self::empty(case)
        }
    }

    /// A result for a case that could not be evaluated
    pub fn errored(case: &TestCase, error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            error: Some(error.into()),
            latency_ms,
            ..Self::empty(case)
        }
    }

    /// A result for a case unfinished at the run deadline
    pub fn timed_out(case: &TestCase) -> Self {
        Self::errored(case, TIMEOUT_ERROR, 0)
    }

    fn empty(case: &TestCase) -> Self {
        Self {
            case_id: case.id.clone(),
            query: case.query.clone(),
            partition: case.partition.clone(),
            category: case.category.clone(),
            passages: Vec::new(),
            answer: String::new(),
            observed_sources: Vec::new(),
            cited_sources: Vec::new(),
            latency_ms: 0,
            metrics: None,
            passed: false,
            faithfulness_reasoning: None,
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn distinct_sources(passages: &[RetrievedPassage]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for p in passages {
        if !sources.contains(&p.source_id) {
            sources.push(p.source_id.clone());
        }
    }
    sources
}

/// Statistics for one category or partition, over non-error cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub size: usize,
    pub passed: usize,
    pub pass_rate: f64,
    pub metrics: MetricScores,
}

/// Outcome of a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub run_id: Uuid,
    #[serde(default)]
    pub started_at: DateTime<Utc>,
    /// Knowledge base the run was issued against
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Cases that produced no result at all
    #[serde(default)]
    pub error_count: usize,
    /// Cases scored below threshold
    #[serde(default)]
    pub assertion_failures: usize,
    /// Means over non-error cases; absent when there are none
    #[serde(default)]
    pub metrics: Option<MetricScores>,
    #[serde(default)]
    pub by_category: BTreeMap<String, GroupStats>,
    #[serde(default)]
    pub by_partition: BTreeMap<String, GroupStats>,
    #[serde(default)]
    pub cases: Vec<CaseResult>,
}

impl Report {
    /// Aggregate case results into a report
    pub fn build(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        backend: impl Into<String>,
        thresholds: ThresholdsConfig,
        cases: Vec<CaseResult>,
    ) -> Self {
        let total = cases.len();
        let passed = cases.iter().filter(|c| c.passed).count();
        let error_count = cases.iter().filter(|c| c.is_error()).count();
        let failed = total - passed;

        let scored: Vec<&CaseResult> = cases.iter().filter(|c| !c.is_error()).collect();
        let metrics = MetricScores::mean(scored.iter().filter_map(|c| c.metrics.as_ref()));

        Self {
            schema_version: SCHEMA_VERSION,
            run_id,
            started_at,
            backend: backend.into(),
            thresholds,
            total,
            passed,
            failed,
            error_count,
            assertion_failures: failed - error_count,
            metrics,
            by_category: group_stats(&scored, |c| c.category.as_str()),
            by_partition: group_stats(&scored, |c| c.partition.as_str()),
            cases,
        }
    }

    /// Fraction of all cases that passed; 0.0 for an empty report
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| c.is_error())
    }

    pub fn assertion_failed(&self) -> impl Iterator<Item = &CaseResult> {
        self.cases.iter().filter(|c| !c.is_error() && !c.passed)
    }

    /// Snapshot file name for this run
    pub fn snapshot_file_name(&self) -> String {
        format!(
            "eval-{}-{}.json",
            self.started_at.format("%Y%m%dT%H%M%SZ"),
            self.run_id
        )
    }

    /// Write the report to `output_dir` as a timestamped snapshot and as
    /// `latest.json`, returning the snapshot path
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir).context(format!(
            "Failed to create output directory {}",
            output_dir.display()
        ))?;

        let json = serde_json::to_string_pretty(self)?;

        let path = output_dir.join(self.snapshot_file_name());
        std::fs::write(&path, &json)
            .context(format!("Failed to write report to {}", path.display()))?;
        std::fs::write(output_dir.join(LATEST_SNAPSHOT), &json)
            .context("Failed to write latest report")?;

        info!("Report saved to {}", path.display());
        Ok(path)
    }

    /// Read a snapshot written by [`Report::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .context(format!("Failed to read report {}", path.display()))?;
        serde_json::from_str(&json).map_err(|e| {
            Error::parse(format!("Invalid report snapshot {}: {e}", path.display()))
        })
    }

    /// Human-readable summary
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let t = &self.thresholds;

        let _ = writeln!(out, "Evaluation Results (run {})", self.run_id);
        let _ = writeln!(out, "  Knowledge base: {}", self.backend);
        let _ = writeln!(
            out,
            "  Cases: {} total, {} passed, {} failed ({} errors, {} below threshold)",
            self.total, self.passed, self.failed, self.error_count, self.assertion_failures
        );
        let _ = writeln!(out);

        match &self.metrics {
            None => {
                let _ = writeln!(out, "No scored cases; aggregate metrics unavailable");
            }
            Some(m) => {
                let _ = writeln!(out, "Aggregate metrics:");
                for (name, value) in m.named() {
                    let target = match name {
                        "f1" => Some(t.min_f1),
                        "faithfulness" => Some(t.min_faithfulness),
                        "relevance" => Some(t.min_relevance),
                        _ => None,
                    };
                    match target {
                        Some(target) => {
                            let marker = if value >= target { "✅" } else { "❌" };
                            let _ = writeln!(
                                out,
                                "  {marker} {name:<13} {value:.3}  (target >= {target:.2})"
                            );
                        }
                        None => {
                            let _ = writeln!(out, "     {name:<13} {value:.3}");
                        }
                    }
                }
            }
        }

        for (title, groups) in [
            ("category", &self.by_category),
            ("partition", &self.by_partition),
        ] {
            if groups.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "By {title}:\n  {:<14} {:>5} {:>8} {:>7} {:>7} {:>7} {:>7}",
                "", "cases", "pass", "prec", "recall", "f1", "faith"
            );
            for (tag, g) in groups {
                let _ = writeln!(
                    out,
                    "  {:<14} {:>5} {:>7.0}% {:>7.3} {:>7.3} {:>7.3} {:>7.3}",
                    tag,
                    g.size,
                    g.pass_rate * 100.0,
                    g.metrics.precision,
                    g.metrics.recall,
                    g.metrics.f1,
                    g.metrics.faithfulness
                );
            }
        }

        let failures: Vec<&CaseResult> = self.assertion_failed().collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "\nFailed assertions:");
            for c in failures {
                if let Some(m) = &c.metrics {
                    let _ = writeln!(
                        out,
                        "  ❌ {} (f1 {:.2}, faithfulness {:.2}, relevance {:.2})",
                        c.case_id, m.f1, m.faithfulness, m.relevance
                    );
                }
            }
        }

        let errors: Vec<&CaseResult> = self.errors().collect();
        if !errors.is_empty() {
            let _ = writeln!(out, "\nExecution errors:");
            for c in errors {
                let _ = writeln!(
                    out,
                    "  ⚠️  {}: {}",
                    c.case_id,
                    c.error.as_deref().unwrap_or_default()
                );
            }
        }

        out
    }

    /// Print the summary to stdout
    pub fn print_summary(&self) {
        print!("{}", self.summary());
    }
}

fn group_stats<'a>(
    cases: &[&'a CaseResult],
    key: impl Fn(&'a CaseResult) -> &'a str,
) -> BTreeMap<String, GroupStats> {
    let mut groups: BTreeMap<&'a str, Vec<&'a CaseResult>> = BTreeMap::new();
    for &case in cases {
        groups.entry(key(case)).or_default().push(case);
    }

    groups
        .into_iter()
        .filter_map(|(tag, members)| {
            let metrics = MetricScores::mean(members.iter().filter_map(|c| c.metrics.as_ref()))?;
            let passed = members.iter().filter(|c| c.passed).count();
            Some((
                tag.to_string(),
                GroupStats {
                    size: members.len(),
                    passed,
                    pass_rate: passed as f64 / members.len() as f64,
                    metrics,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn case(id: &str, category: &str, partition: &str) -> TestCase {
        TestCase::new(id, category, partition, format!("query for {id}"))
    }

    fn scores(f1: f64) -> MetricScores {
        MetricScores {
            precision: f1,
            recall: f1,
            f1,
            mrr: 1.0,
            faithfulness: 0.9,
            relevance: 1.0,
        }
    }

    fn scored(id: &str, category: &str, partition: &str, f1: f64) -> CaseResult {
        CaseResult::scored(
            &case(id, category, partition),
            vec![
                RetrievedPassage::new("a", 0.9, "s3://b/doc-a.md"),
                RetrievedPassage::new("b", 0.8, "s3://b/doc-a.md"),
                RetrievedPassage::new("c", 0.7, "s3://b/doc-b.md"),
            ],
            "answer".to_string(),
            120,
            scores(f1),
            &ThresholdsConfig::default(),
        )
    }

    fn report(cases: Vec<CaseResult>) -> Report {
        Report::build(
            Uuid::new_v4(),
            Utc::now(),
            "KB-TEST",
            ThresholdsConfig::default(),
            cases,
        )
    }

    #[test]
    fn test_scored_result_dedupes_sources() {
        let r = scored("a", "fees", "US", 0.9);
        assert_eq!(r.observed_sources, vec!["s3://b/doc-a.md", "s3://b/doc-b.md"]);
        assert!(r.passed);
        assert!(r.error.is_none());
    }

    #[test]
    fn test_errored_result_has_no_metrics() {
        let r = CaseResult::errored(&case("a", "fees", "US"), "Transport error: reset", 5);
        assert!(r.is_error());
        assert!(r.metrics.is_none());
        assert!(!r.passed);
    }

    #[test]
    fn test_counts_and_means_exclude_errors() {
        let report = report(vec![
            scored("a", "fees", "US", 1.0),
            scored("b", "fees", "UK", 0.5),
            CaseResult::errored(&case("c", "returns", "US"), "boom", 0),
        ]);

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.assertion_failures, 1);
        assert!(!report.all_passed());

        let m = report.metrics.unwrap();
        assert!((m.f1 - 0.75).abs() < 0.001);

        // The errored case's category has no scored members
        assert!(report.by_category.get("returns").is_none());
        let fees = &report.by_category["fees"];
        assert_eq!(fees.size, 2);
        assert_eq!(fees.passed, 1);
        assert!((fees.pass_rate - 0.5).abs() < 0.001);

        let us = &report.by_partition["US"];
        assert_eq!(us.size, 1);
        assert_eq!(us.pass_rate, 1.0);
    }

    #[test]
    fn test_all_errors_yield_absent_aggregates() {
        let report = report(vec![
            CaseResult::timed_out(&case("a", "fees", "US")),
            CaseResult::errored(&case("b", "fees", "UK"), "boom", 0),
        ]);
        assert!(report.metrics.is_none());
        assert!(report.by_category.is_empty());
        assert_eq!(report.failed, 2);
        assert_eq!(report.assertion_failures, 0);

        let summary = report.summary();
        assert!(summary.contains("aggregate metrics unavailable"));
        assert!(summary.contains("Execution errors"));
        assert!(summary.contains("timeout"));
    }

    #[test]
    fn test_empty_report() {
        let report = report(Vec::new());
        assert!(report.metrics.is_none());
        assert_eq!(report.pass_rate(), 0.0);
        assert!(report.all_passed());
    }

    #[test]
    fn test_summary_marks_targets() {
        let report = report(vec![scored("a", "fees", "US", 0.5)]);
        let summary = report.summary();
        assert!(summary.contains("❌ f1"));
        assert!(summary.contains("✅ faithfulness"));
        assert!(summary.contains("Failed assertions"));
        assert!(!summary.contains("Execution errors"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let report = report(vec![
            scored("a", "fees", "US", 0.9),
            CaseResult::errored(&case("b", "fees", "UK"), "boom", 3),
        ]);

        let path = report.save(dir.path()).unwrap();
        assert!(path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("eval-") && n.ends_with(".json")));

        let loaded = Report::load(&path).unwrap();
        assert_eq!(loaded, report);

        let latest = Report::load(&dir.path().join(LATEST_SNAPSHOT)).unwrap();
        assert_eq!(latest.run_id, report.run_id);
    }

    #[test]
    fn test_load_tolerates_unknown_and_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        std::fs::write(
            &path,
            r#"{
                "total": 1, "passed": 1, "failed": 0,
                "some_future_field": {"nested": true},
                "cases": [{
                    "case_id": "a", "query": "q", "partition": "US", "category": "fees",
                    "passed": true,
                    "metrics": {"precision": 1.0, "recall": 1.0, "f1": 1.0,
                                "mrr": 1.0, "faithfulness": 1.0, "relevance": 1.0}
                }]
            }"#,
        )
        .unwrap();

        let loaded = Report::load(&path).unwrap();
        assert_eq!(loaded.total, 1);
        assert_eq!(loaded.schema_version, 0);
        assert!(loaded.run_id.is_nil());
        assert_eq!(loaded.thresholds, ThresholdsConfig::default());
        assert_eq!(loaded.cases[0].case_id, "a");
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Report::load(&path).is_err());
    }
}
