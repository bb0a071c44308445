//! End-to-end tests of the evaluation pipeline against stub services

use async_trait::async_trait;
use kbeval_core::config::{Config, RunnerConfig};
use kbeval_core::error::{Error, Result};
use kbeval_core::{
    Citation, GeneratedAnswer, GenerationRequest, GenerationService, JudgeRequest, JudgeService,
    RetrievalRequest, RetrievalService, RetrievedPassage,
};
use kbeval_evals::{
    BatchRunner, CaseEvaluator, GroundTruthStore, Report, TestCase, PARTITION_BOTH,
};
use kbeval_judge::MockJudge;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned retrieval and generation responses keyed by query
#[derive(Default)]
struct StubKnowledgeBase {
    passages: HashMap<String, Vec<RetrievedPassage>>,
    answers: HashMap<String, String>,
    failing: Vec<String>,
    delays: HashMap<String, Duration>,
    retrieval_calls: AtomicUsize,
    requested_caps: Mutex<Vec<usize>>,
}

impl StubKnowledgeBase {
    fn respond(mut self, query: &str, passages: Vec<RetrievedPassage>, answer: &str) -> Self {
        self.passages.insert(query.to_string(), passages);
        self.answers.insert(query.to_string(), answer.to_string());
        self
    }

    fn fail(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    fn delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }
}

#[async_trait]
impl RetrievalService for StubKnowledgeBase {
    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<RetrievedPassage>> {
        self.retrieval_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_caps
            .lock()
            .unwrap()
            .push(request.max_results);

        if let Some(delay) = self.delays.get(&request.query) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&request.query) {
            return Err(Error::transport("connection reset by peer"));
        }
        Ok(self
            .passages
            .get(&request.query)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl GenerationService for StubKnowledgeBase {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAnswer> {
        let answer = self
            .answers
            .get(&request.query)
            .cloned()
            .unwrap_or_default();
        Ok(GeneratedAnswer {
            answer,
            citations: vec![Citation {
                source_id: "s3://kb-docs/documents/seller-guide-us.md".to_string(),
                content: String::new(),
            }],
        })
    }
}

/// Judge returning a fixed reply
struct ScriptedJudge(&'static str);

#[async_trait]
impl JudgeService for ScriptedJudge {
    async fn complete(&self, _request: JudgeRequest) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct UnreachableJudge;

#[async_trait]
impl JudgeService for UnreachableJudge {
    async fn complete(&self, _request: JudgeRequest) -> Result<String> {
        Err(Error::transport("judge timed out"))
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.knowledge_base.knowledge_base_id = Some("KB-TEST".to_string());
    config
}

fn evaluator(kb: Arc<StubKnowledgeBase>, judge: Arc<dyn JudgeService>) -> Arc<CaseEvaluator> {
    Arc::new(CaseEvaluator::new(&config(), kb.clone(), kb, judge).expect("evaluator"))
}

fn runner(kb: Arc<StubKnowledgeBase>) -> BatchRunner {
    BatchRunner::new(
        evaluator(kb, Arc::new(MockJudge::new(0.9))),
        &RunnerConfig::default(),
    )
}

fn us_fees_case() -> TestCase {
    TestCase::new(
        "fees-us",
        "fees",
        "US",
        "What is the Professional plan fee?",
    )
    .with_sources(&["seller-guide-us.md"])
    .with_evidence(&["$39.99/month"])
    .with_answer_terms(&["$39.99"])
}

#[tokio::test]
async fn test_single_relevant_passage_scores_perfectly() {
    let case = us_fees_case();
    let kb = Arc::new(StubKnowledgeBase::default().respond(
        &case.query,
        vec![RetrievedPassage::new(
            "The Professional selling plan costs $39.99/month regardless of volume.",
            0.82,
            "s3://kb-docs/documents/seller-guide-us.md",
        )],
        "The Professional plan is $39.99 per month.",
    ));

    let report = runner(kb).run(&[case]).await.unwrap();
    let result = &report.cases[0];
    let m = result.metrics.expect("metrics");

    assert_eq!(m.recall, 1.0);
    assert_eq!(m.precision, 1.0);
    assert_eq!(m.mrr, 1.0);
    assert_eq!(m.relevance, 1.0);
    assert!((m.faithfulness - 0.9).abs() < 0.001);
    assert!(result.passed);
    assert!(report.all_passed());
    assert_eq!(
        result.observed_sources,
        vec!["s3://kb-docs/documents/seller-guide-us.md"]
    );
    assert_eq!(
        result.cited_sources,
        vec!["s3://kb-docs/documents/seller-guide-us.md"]
    );
}

#[tokio::test]
async fn test_both_partition_with_one_source_is_precise_but_incomplete() {
    let case = TestCase::new(
        "comparison-fees",
        "comparison",
        PARTITION_BOTH,
        "Compare US and UK subscription fees",
    )
    .with_sources(&["seller-guide-us.md", "seller-guide-uk.md"])
    .with_evidence(&["$39.99/month", "£25 (excl. VAT) per month"]);

    let kb = Arc::new(StubKnowledgeBase::default().respond(
        &case.query,
        vec![
            RetrievedPassage::new(
                "Professional: $39.99/month",
                0.9,
                "s3://kb-docs/documents/seller-guide-us.md",
            ),
            RetrievedPassage::new(
                "Fees are billed monthly.",
                0.7,
                "s3://kb-docs/documents/seller-guide-us.md",
            ),
        ],
        "US sellers pay $39.99.",
    ));

    let report = runner(kb).run(&[case]).await.unwrap();
    let m = report.cases[0].metrics.expect("metrics");

    assert!(m.recall < 1.0);
    assert!((m.recall - 0.5).abs() < 0.001);
    assert_eq!(m.precision, 1.0);
    assert!((m.f1 - 2.0 / 3.0).abs() < 0.001);
    assert_eq!(report.by_partition[PARTITION_BOTH].size, 1);
}

#[tokio::test]
async fn test_transport_error_is_isolated_to_its_case() {
    let cases = vec![
        TestCase::new("a", "fees", "US", "first"),
        TestCase::new("b", "fees", "US", "broken"),
        TestCase::new("c", "returns", "UK", "third"),
    ];
    let kb = Arc::new(
        StubKnowledgeBase::default()
            .respond("first", vec![RetrievedPassage::new("x", 1.0, "doc")], "x")
            .respond("third", vec![RetrievedPassage::new("y", 1.0, "doc")], "y")
            .fail("broken"),
    );

    let report = runner(kb.clone()).run(&cases).await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(kb.retrieval_calls.load(Ordering::SeqCst), 3);

    let broken = &report.cases[1];
    assert!(broken.error.as_deref().unwrap().contains("connection reset"));
    assert!(broken.metrics.is_none());
    assert!(!broken.passed);

    assert!(report.cases[0].metrics.is_some());
    assert!(report.cases[2].metrics.is_some());
    assert_eq!(report.error_count, 1);
    assert!(report.summary().contains("Execution errors"));
}

#[tokio::test]
async fn test_all_cases_erroring_yields_absent_aggregates() {
    let cases = vec![TestCase::new("a", "fees", "US", "q1")];
    let kb = Arc::new(StubKnowledgeBase::default().fail("q1"));

    let report = runner(kb).run(&cases).await.unwrap();
    assert!(report.metrics.is_none());
    assert_eq!(report.failed, 1);
    assert_eq!(report.assertion_failures, 0);
}

#[tokio::test]
async fn test_output_order_matches_input_under_concurrency() {
    let cases: Vec<TestCase> = (0..8)
        .map(|i| TestCase::new(format!("case-{i}"), "fees", "US", format!("q{i}")))
        .collect();

    // Earlier cases finish last
    let mut kb = StubKnowledgeBase::default();
    for i in 0..8u64 {
        kb = kb.delay(&format!("q{i}"), Duration::from_millis((8 - i) * 15));
    }

    let report = BatchRunner::new(
        evaluator(Arc::new(kb), Arc::new(MockJudge::new(1.0))),
        &RunnerConfig {
            concurrency_limit: 4,
            ..Default::default()
        },
    )
    .run(&cases)
    .await
    .unwrap();

    let ids: Vec<&str> = report.cases.iter().map(|c| c.case_id.as_str()).collect();
    let expected: Vec<String> = (0..8).map(|i| format!("case-{i}")).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_run_timeout_records_unfinished_cases() {
    let cases = vec![
        TestCase::new("fast", "fees", "US", "fast"),
        TestCase::new("slow", "fees", "US", "slow"),
    ];
    let kb = Arc::new(
        StubKnowledgeBase::default()
            .respond("fast", vec![RetrievedPassage::new("x", 1.0, "doc")], "x")
            .delay("slow", Duration::from_secs(30)),
    );

    let report = runner(kb)
        .with_run_timeout(Some(Duration::from_millis(300)))
        .run(&cases)
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert!(report.cases[0].error.is_none());
    assert_eq!(report.cases[1].error.as_deref(), Some("timeout"));
    assert_eq!(report.error_count, 1);
}

#[tokio::test]
async fn test_empty_case_set_is_config_error() {
    let kb = Arc::new(StubKnowledgeBase::default());
    let err = runner(kb.clone()).run(&[]).await.unwrap_err();
    assert!(err.is_config());
    assert_eq!(kb.retrieval_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_knowledge_base_is_config_error() {
    let kb = Arc::new(StubKnowledgeBase::default());
    let result = CaseEvaluator::new(
        &Config::default(),
        kb.clone(),
        kb,
        Arc::new(MockJudge::default()),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn test_unparseable_judge_reply_zeroes_faithfulness_only() {
    let case = us_fees_case();
    let kb = Arc::new(StubKnowledgeBase::default().respond(
        &case.query,
        vec![RetrievedPassage::new(
            "$39.99/month",
            0.9,
            "s3://kb-docs/documents/seller-guide-us.md",
        )],
        "$39.99",
    ));

    let result = evaluator(kb, Arc::new(ScriptedJudge("Seems grounded to me.")))
        .evaluate(&case)
        .await;

    let m = result.metrics.expect("metrics");
    assert_eq!(m.faithfulness, 0.0);
    assert_eq!(m.precision, 1.0);
    assert_eq!(m.relevance, 1.0);
    assert!(!result.passed);
    assert_eq!(result.warnings.len(), 1);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_judge_reasoning_recorded() {
    let case = us_fees_case();
    let kb = Arc::new(StubKnowledgeBase::default());
    let result = evaluator(
        kb,
        Arc::new(ScriptedJudge(
            "```json\n{\"score\": 0.6, \"reasoning\": \"Partly supported.\"}\n```",
        )),
    )
    .evaluate(&case)
    .await;

    assert_eq!(result.faithfulness_reasoning.as_deref(), Some("Partly supported."));
    assert!((result.metrics.unwrap().faithfulness - 0.6).abs() < 0.001);
}

#[tokio::test]
async fn test_judge_failure_is_case_error() {
    let case = us_fees_case();
    let kb = Arc::new(StubKnowledgeBase::default());
    let result = evaluator(kb, Arc::new(UnreachableJudge))
        .evaluate(&case)
        .await;

    assert!(result.metrics.is_none());
    assert!(result.cited_sources.is_empty());
    assert!(result.error.as_deref().unwrap().contains("judge timed out"));
}

#[tokio::test]
async fn test_judge_reply_leading_with_count_zeroes_faithfulness() {
    let case = us_fees_case();
    let kb = Arc::new(StubKnowledgeBase::default().respond(
        &case.query,
        vec![RetrievedPassage::new(
            "$39.99/month",
            0.9,
            "s3://kb-docs/documents/seller-guide-us.md",
        )],
        "$39.99",
    ));

    let result = evaluator(
        kb,
        Arc::new(ScriptedJudge(
            "3 of the 4 claims in the answer are unsupported by the context.",
        )),
    )
    .evaluate(&case)
    .await;

    let m = result.metrics.expect("metrics");
    assert_eq!(m.faithfulness, 0.0);
    assert!(!result.passed);
    assert_eq!(result.warnings.len(), 1);
}

#[tokio::test]
async fn test_retrieval_cap_is_enforced() {
    let case = TestCase::new("a", "fees", "US", "many");
    let passages: Vec<RetrievedPassage> = (0..40)
        .map(|i| RetrievedPassage::new(format!("p{i}"), 0.5, "doc"))
        .collect();
    let kb = Arc::new(StubKnowledgeBase::default().respond("many", passages, ""));

    let mut config = config();
    config.knowledge_base.num_results = 100;
    let evaluator = CaseEvaluator::new(
        &config,
        kb.clone(),
        kb.clone(),
        Arc::new(MockJudge::default()),
    )
    .unwrap();

    let result = evaluator.evaluate(&case).await;
    assert_eq!(result.passages.len(), 25);
    assert_eq!(*kb.requested_caps.lock().unwrap(), vec![25]);
}

#[tokio::test]
async fn test_builtin_corpus_runs_and_snapshots() {
    let store = GroundTruthStore::builtin();
    let cases: Vec<TestCase> = store
        .filter(Some("fees"), None)
        .into_iter()
        .cloned()
        .collect();
    assert!(!cases.is_empty());

    let kb = Arc::new(StubKnowledgeBase::default());
    let report = runner(kb).run(&cases).await.unwrap();
    assert_eq!(report.total, cases.len());
    assert_eq!(report.backend, "KB-TEST");

    let dir = tempfile::tempdir().unwrap();
    let path = report.save(dir.path()).unwrap();
    let loaded = Report::load(&path).unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.total, report.total);
    assert_eq!(loaded.by_category.keys().collect::<Vec<_>>(), vec!["fees"]);
    assert!(loaded
        .cases
        .iter()
        .all(|c| c.cited_sources == vec!["s3://kb-docs/documents/seller-guide-us.md"]));
}
