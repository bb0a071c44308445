//! Hand-authored ground truth for the seller knowledge base.
//!
//! Each [`TestCase`] pairs a query with the sources, evidence and answer
//! terms a correct retrieval+generation round trip should produce. The
//! built-in corpus covers the US and UK marketplaces; cases tagged
//! [`PARTITION_BOTH`] need documents from both.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Partition tag for cases spanning more than one marketplace
pub const PARTITION_BOTH: &str = "BOTH";

/// A single ground truth query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique identifier
    pub id: String,
    pub query: String,
    /// Source identifiers retrieval should hit (order irrelevant)
    pub expected_sources: Vec<String>,
    /// Literal substrings that must appear in retrieved passage text
    pub expected_evidence: Vec<String>,
    /// Literal substrings expected in the generated answer
    pub expected_answer_terms: Vec<String>,
    /// Marketplace tag, or [`PARTITION_BOTH`]
    pub partition: String,
    pub category: String,
}

impl TestCase {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        partition: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
            expected_sources: Vec::new(),
            expected_evidence: Vec::new(),
            expected_answer_terms: Vec::new(),
            partition: partition.into(),
            category: category.into(),
        }
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.expected_sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_evidence(mut self, evidence: &[&str]) -> Self {
        self.expected_evidence = evidence.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_answer_terms(mut self, terms: &[&str]) -> Self {
        self.expected_answer_terms = terms.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether the case spans several marketplaces
    pub fn spans_partitions(&self) -> bool {
        self.partition == PARTITION_BOTH
    }
}

/// Read-only registry of test cases
#[derive(Debug, Clone, Default)]
pub struct GroundTruthStore {
    cases: Vec<TestCase>,
}

static BUILTIN: LazyLock<GroundTruthStore> = LazyLock::new(|| GroundTruthStore::new(builtin_cases()));

impl GroundTruthStore {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }

    /// The corpus shipped with kbeval
    pub fn builtin() -> &'static GroundTruthStore {
        &BUILTIN
    }

    /// All cases in declaration order
    pub fn all(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.id == id)
    }

    pub fn by_category(&self, category: &str) -> Vec<&TestCase> {
        self.cases.iter().filter(|c| c.category == category).collect()
    }

    pub fn by_partition(&self, partition: &str) -> Vec<&TestCase> {
        self.cases
            .iter()
            .filter(|c| c.partition == partition)
            .collect()
    }

    /// Cases matching both optional filters; `None` matches everything
    pub fn filter(&self, category: Option<&str>, partition: Option<&str>) -> Vec<&TestCase> {
        self.cases
            .iter()
            .filter(|c| category.is_none_or(|tag| c.category == tag))
            .filter(|c| partition.is_none_or(|tag| c.partition == tag))
            .collect()
    }

    /// Distinct categories in first-appearance order
    pub fn categories(&self) -> Vec<&str> {
        distinct(self.cases.iter().map(|c| c.category.as_str()))
    }

    /// Distinct partitions in first-appearance order
    pub fn partitions(&self) -> Vec<&str> {
        distinct(self.cases.iter().map(|c| c.partition.as_str()))
    }
}

fn distinct<'a>(tags: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for tag in tags {
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

fn builtin_cases() -> Vec<TestCase> {
    vec![
        // Fees
        TestCase::new(
            "fees-us-professional-plan",
            "fees",
            "US",
            "What is the monthly subscription fee for the Professional selling plan in the US?",
        )
        .with_sources(&["seller-guide-us.md"])
        .with_evidence(&["$39.99/month"])
        .with_answer_terms(&["$39.99"]),
        TestCase::new(
            "fees-us-individual-plan",
            "fees",
            "US",
            "How much does an Individual seller pay per item sold in the US?",
        )
        .with_sources(&["seller-guide-us.md"])
        .with_evidence(&["$0.99 per item"])
        .with_answer_terms(&["$0.99", "per item"]),
        TestCase::new(
            "fees-uk-pro-merchant",
            "fees",
            "UK",
            "What does the Pro-Merchant subscription cost on the UK marketplace?",
        )
        .with_sources(&["seller-guide-uk.md"])
        .with_evidence(&["£25 (excl. VAT) per month"])
        .with_answer_terms(&["£25", "VAT"]),
        TestCase::new(
            "fees-uk-referral",
            "fees",
            "UK",
            "What referral fee applies to consumer electronics in the UK?",
        )
        .with_sources(&["fees-uk.md"])
        .with_evidence(&["Consumer Electronics", "7%"])
        .with_answer_terms(&["7%"]),
        // Shipping
        TestCase::new(
            "shipping-us-handling-time",
            "shipping",
            "US",
            "What is the default handling time for seller-fulfilled orders in the US?",
        )
        .with_sources(&["shipping-us.md"])
        .with_evidence(&["2 business days"])
        .with_answer_terms(&["2 business days"]),
        TestCase::new(
            "shipping-uk-tracking",
            "shipping",
            "UK",
            "Which UK orders must be dispatched with tracking?",
        )
        .with_sources(&["shipping-uk.md"])
        .with_evidence(&["valid tracking", "95%"])
        .with_answer_terms(&["tracking", "95%"]),
        TestCase::new(
            "shipping-us-late-shipment-rate",
            "shipping",
            "US",
            "What late shipment rate must US sellers stay under?",
        )
        .with_sources(&["shipping-us.md", "performance-us.md"])
        .with_evidence(&["under 4%"])
        .with_answer_terms(&["4%"]),
        // Returns
        TestCase::new(
            "returns-us-window",
            "returns",
            "US",
            "How long do US buyers have to return most items?",
        )
        .with_sources(&["returns-us.md"])
        .with_evidence(&["within 30 days"])
        .with_answer_terms(&["30 days"]),
        TestCase::new(
            "returns-uk-cancellation-period",
            "returns",
            "UK",
            "What cancellation period do UK buyers have under consumer law?",
        )
        .with_sources(&["returns-uk.md"])
        .with_evidence(&["14 days", "Consumer Contracts Regulations"])
        .with_answer_terms(&["14 days"]),
        // Policy
        TestCase::new(
            "policy-us-sales-tax",
            "policy",
            "US",
            "Who collects sales tax on US marketplace orders?",
        )
        .with_sources(&["sales-tax-us.md"])
        .with_evidence(&["marketplace facilitator"])
        .with_answer_terms(&["marketplace facilitator"]),
        TestCase::new(
            "policy-uk-vat-threshold",
            "policy",
            "UK",
            "At what turnover must a UK-established seller register for VAT?",
        )
        .with_sources(&["vat-guide-uk.md"])
        .with_evidence(&["£90,000"])
        .with_answer_terms(&["£90,000"]),
        TestCase::new(
            "policy-both-prohibited-items",
            "policy",
            PARTITION_BOTH,
            "Which product categories are restricted on both the US and UK marketplaces?",
        )
        .with_sources(&["restricted-products-us.md", "restricted-products-uk.md"])
        .with_evidence(&["hazardous materials", "offensive weapons"])
        .with_answer_terms(&["hazardous materials"]),
        // Comparison
        TestCase::new(
            "comparison-both-subscription-fees",
            "comparison",
            PARTITION_BOTH,
            "How does the Professional plan fee in the US compare with the UK Pro-Merchant fee?",
        )
        .with_sources(&["seller-guide-us.md", "seller-guide-uk.md"])
        .with_evidence(&["$39.99/month", "£25 (excl. VAT) per month"])
        .with_answer_terms(&["$39.99", "£25"]),
        TestCase::new(
            "comparison-both-return-windows",
            "comparison",
            PARTITION_BOTH,
            "How do the return windows differ between the US and UK marketplaces?",
        )
        .with_sources(&["returns-us.md", "returns-uk.md"])
        .with_evidence(&["within 30 days", "14 days"])
        .with_answer_terms(&["30 days", "14 days"]),
        TestCase::new(
            "comparison-both-tax-collection",
            "comparison",
            PARTITION_BOTH,
            "Compare how sales tax and VAT are collected on US and UK orders.",
        )
        .with_sources(&["sales-tax-us.md", "vat-guide-uk.md"])
        .with_evidence(&["marketplace facilitator", "deemed supplier"])
        .with_answer_terms(&["sales tax", "VAT"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_ids_unique() {
        let store = GroundTruthStore::builtin();
        let ids: HashSet<&str> = store.all().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), store.len());
    }

    #[test]
    fn test_builtin_cases_have_expectations() {
        for case in GroundTruthStore::builtin().all() {
            assert!(!case.query.is_empty(), "{} has no query", case.id);
            assert!(
                !case.expected_sources.is_empty(),
                "{} has no expected sources",
                case.id
            );
        }
    }

    #[test]
    fn test_both_cases_span_two_sources() {
        let store = GroundTruthStore::builtin();
        let both = store.by_partition(PARTITION_BOTH);
        assert!(!both.is_empty());
        for case in both {
            assert!(case.spans_partitions());
            assert!(case.expected_sources.len() >= 2, "{}", case.id);
        }
    }

    #[test]
    fn test_by_category_and_partition() {
        let store = GroundTruthStore::builtin();
        assert!(store.by_category("fees").iter().all(|c| c.category == "fees"));
        assert!(store.by_category("nonexistent").is_empty());
        assert!(store.by_partition("UK").iter().all(|c| c.partition == "UK"));
        assert!(store.by_partition("DE").is_empty());
    }

    #[test]
    fn test_filter_composes() {
        let store = GroundTruthStore::builtin();
        assert_eq!(store.filter(None, None).len(), store.len());

        let us_fees = store.filter(Some("fees"), Some("US"));
        assert!(!us_fees.is_empty());
        assert!(us_fees
            .iter()
            .all(|c| c.category == "fees" && c.partition == "US"));
        assert!(store.filter(Some("comparison"), Some("US")).is_empty());
    }

    #[test]
    fn test_declaration_order_and_distinct_tags() {
        let store = GroundTruthStore::new(vec![
            TestCase::new("a", "fees", "US", "q1"),
            TestCase::new("b", "returns", "UK", "q2"),
            TestCase::new("c", "fees", "UK", "q3"),
        ]);
        let ids: Vec<&str> = store.all().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.categories(), vec!["fees", "returns"]);
        assert_eq!(store.partitions(), vec!["US", "UK"]);
        assert_eq!(store.get("b").map(|c| c.query.as_str()), Some("q2"));
        assert!(store.get("z").is_none());
    }
}
