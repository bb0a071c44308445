//! Trend comparison between two report snapshots

use crate::eval_metrics::METRIC_NAMES;
use crate::report::Report;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use uuid::Uuid;

/// Change in one aggregate metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: String,
    pub baseline: Option<f64>,
    pub current: Option<f64>,
    /// `current - baseline`; absent unless both sides are present
    pub delta: Option<f64>,
}

/// Differences between a baseline run and a current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportComparison {
    pub baseline_run_id: Uuid,
    pub current_run_id: Uuid,
    pub metrics: Vec<MetricDelta>,
    pub baseline_pass_rate: f64,
    pub current_pass_rate: f64,
    pub pass_rate_delta: f64,
    /// Cases that passed in the baseline and no longer do
    pub regressed: Vec<String>,
    /// Cases that now pass but did not in the baseline
    pub improved: Vec<String>,
    /// Cases only present in the current run
    pub added: Vec<String>,
    /// Cases only present in the baseline
    pub removed: Vec<String>,
}

/// Compare two reports case by case and metric by metric
pub fn compare(baseline: &Report, current: &Report) -> ReportComparison {
    let baseline_values = baseline.metrics.map(|m| m.values());
    let current_values = current.metrics.map(|m| m.values());

    let metrics = METRIC_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let b = baseline_values.map(|v| v[i]);
            let c = current_values.map(|v| v[i]);
            MetricDelta {
                metric: name.to_string(),
                baseline: b,
                current: c,
                delta: b.zip(c).map(|(b, c)| c - b),
            }
        })
        .collect();

    let baseline_passed: HashMap<&str, bool> = baseline
        .cases
        .iter()
        .map(|c| (c.case_id.as_str(), c.passed))
        .collect();
    let current_ids: HashSet<&str> = current.cases.iter().map(|c| c.case_id.as_str()).collect();

    let mut regressed = Vec::new();
    let mut improved = Vec::new();
    let mut added = Vec::new();
    for case in &current.cases {
        match baseline_passed.get(case.case_id.as_str()) {
            Some(true) if !case.passed => regressed.push(case.case_id.clone()),
            Some(false) if case.passed => improved.push(case.case_id.clone()),
            Some(_) => {}
            None => added.push(case.case_id.clone()),
        }
    }

    let removed = baseline
        .cases
        .iter()
        .filter(|c| !current_ids.contains(c.case_id.as_str()))
        .map(|c| c.case_id.clone())
        .collect();

    ReportComparison {
        baseline_run_id: baseline.run_id,
        current_run_id: current.run_id,
        metrics,
        baseline_pass_rate: baseline.pass_rate(),
        current_pass_rate: current.pass_rate(),
        pass_rate_delta: current.pass_rate() - baseline.pass_rate(),
        regressed,
        improved,
        added,
        removed,
    }
}

impl ReportComparison {
    pub fn has_regressions(&self) -> bool {
        !self.regressed.is_empty()
    }

    /// Human-readable comparison
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Comparing run {} (baseline) with run {}",
            self.baseline_run_id, self.current_run_id
        );
        let _ = writeln!(
            out,
            "  Pass rate: {:.1}% -> {:.1}% ({:+.1} pts)",
            self.baseline_pass_rate * 100.0,
            self.current_pass_rate * 100.0,
            self.pass_rate_delta * 100.0
        );
        let _ = writeln!(out);

        for m in &self.metrics {
            let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}"));
            let delta = m
                .delta
                .map_or_else(|| "n/a".to_string(), |d| format!("{d:+.3}"));
            let _ = writeln!(
                out,
                "  {:<13} {:>7} -> {:>7}  ({delta})",
                m.metric,
                fmt(m.baseline),
                fmt(m.current)
            );
        }

        for (title, ids) in [
            ("Regressed", &self.regressed),
            ("Improved", &self.improved),
            ("New cases", &self.added),
            ("Removed cases", &self.removed),
        ] {
            if ids.is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n{title}:");
            for id in ids {
                let _ = writeln!(out, "  - {id}");
            }
        }

        out
    }
}
