//! Single-case evaluation

use crate::eval_metrics::score_case;
use crate::faithfulness::FaithfulnessGrader;
use crate::ground_truth::TestCase;
use crate::report::CaseResult;
use kbeval_core::config::{Config, ThresholdsConfig, MAX_RETRIEVAL_RESULTS};
use kbeval_core::error::Result;
use kbeval_core::{
    GeneratedAnswer, GenerationRequest, GenerationService, JudgeService, RetrievalRequest,
    RetrievalService, RetrievedPassage,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runs one test case against the retrieval and generation services and
/// scores the outcome
pub struct CaseEvaluator {
    retrieval: Arc<dyn RetrievalService>,
    generation: Arc<dyn GenerationService>,
    grader: FaithfulnessGrader,
    knowledge_base_id: String,
    num_results: usize,
    thresholds: ThresholdsConfig,
}

impl CaseEvaluator {
    /// Create an evaluator from configuration.
    ///
    /// Fails when no knowledge base reference is configured.
    pub fn new(
        config: &Config,
        retrieval: Arc<dyn RetrievalService>,
        generation: Arc<dyn GenerationService>,
        judge: Arc<dyn JudgeService>,
    ) -> Result<Self> {
        let knowledge_base_id = config.knowledge_base.require_knowledge_base_id()?.to_string();

        Ok(Self {
            retrieval,
            generation,
            grader: FaithfulnessGrader::new(judge, &config.judge),
            knowledge_base_id,
            num_results: config.knowledge_base.num_results,
            thresholds: config.thresholds,
        })
    }

    pub fn knowledge_base_id(&self) -> &str {
        &self.knowledge_base_id
    }

    pub fn thresholds(&self) -> &ThresholdsConfig {
        &self.thresholds
    }

    /// Evaluate one case. Service failures are folded into the result.
    pub async fn evaluate(&self, case: &TestCase) -> CaseResult {
        let start = Instant::now();

        let (passages, answer) = match self.retrieve_and_generate(case).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                warn!(
                    case_id = %case.id,
                    transport = e.is_transport(),
                    "Case failed: {e}"
                );
                return CaseResult::errored(case, e.to_string(), latency_ms);
            }
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        let grade = match self
            .grader
            .grade(&case.query, &passages, &answer.answer)
            .await
        {
            Ok(grade) => grade,
            Err(e) => {
                warn!(case_id = %case.id, "Judge call failed: {e}");
                return CaseResult::errored(case, format!("faithfulness judge: {e}"), latency_ms);
            }
        };

        let metrics = score_case(case, &passages, &answer.answer, grade.score);
        let passage_count = passages.len();
        let cited_sources = answer
            .cited_sources()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut result = CaseResult::scored(
            case,
            passages,
            answer.answer,
            latency_ms,
            metrics,
            &self.thresholds,
        );
        result.cited_sources = cited_sources;
        result.faithfulness_reasoning = grade.reasoning;
        result.warnings.extend(grade.warning);

        info!(
            target: "kbeval::eval",
            case_id = %case.id,
            partition = %case.partition,
            category = %case.category,
            passages = passage_count,
            precision = metrics.precision,
            recall = metrics.recall,
            f1 = metrics.f1,
            mrr = metrics.mrr,
            faithfulness = metrics.faithfulness,
            relevance = metrics.relevance,
            latency_ms,
            passed = result.passed,
            "case evaluated"
        );

        result
    }

    async fn retrieve_and_generate(
        &self,
        case: &TestCase,
    ) -> Result<(Vec<RetrievedPassage>, GeneratedAnswer)> {
        let max_results = self.num_results.min(MAX_RETRIEVAL_RESULTS);
        let mut passages = self
            .retrieval
            .retrieve(RetrievalRequest {
                query: case.query.clone(),
                knowledge_base_id: self.knowledge_base_id.clone(),
                max_results,
                filter: None,
            })
            .await?;
        passages.truncate(max_results);

        let answer = self
            .generation
            .generate(GenerationRequest {
                query: case.query.clone(),
                knowledge_base_id: self.knowledge_base_id.clone(),
            })
            .await?;

        Ok((passages, answer))
    }
}
