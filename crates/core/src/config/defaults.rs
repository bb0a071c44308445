//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_JUDGE_PROVIDER: &str = "anthropic";
pub(crate) const DEFAULT_JUDGE_MODEL: &str = "claude-haiku-4-5";
pub(crate) const DEFAULT_JUDGE_API_BASE_URL: &str = "http://localhost:8000/v1";
pub(crate) const DEFAULT_OUTPUT_DIR: &str = "eval-results";

/// Hard cap the knowledge-base proxy applies to `max_results`
pub const MAX_RETRIEVAL_RESULTS: usize = 25;

/// Hard cap the knowledge-base proxy applies to generation `max_tokens`
pub const MAX_GENERATION_TOKENS: u32 = 4096;

pub(crate) fn default_num_results() -> usize {
    5
}

pub(crate) fn default_generation_max_tokens() -> u32 {
    2048
}

pub(crate) fn default_generation_temperature() -> f32 {
    0.7
}

pub(crate) fn default_kb_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_judge_provider() -> String {
    DEFAULT_JUDGE_PROVIDER.to_string()
}

pub(crate) fn default_judge_model() -> String {
    DEFAULT_JUDGE_MODEL.to_string()
}

pub(crate) fn default_judge_api_base_url() -> Option<String> {
    Some(DEFAULT_JUDGE_API_BASE_URL.to_string())
}

pub(crate) fn default_judge_max_tokens() -> u32 {
    512
}

pub(crate) fn default_context_passages() -> usize {
    3
}

pub(crate) fn default_passage_char_budget() -> usize {
    500
}

pub(crate) fn default_judge_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_min_f1() -> f64 {
    0.70
}

pub(crate) fn default_min_faithfulness() -> f64 {
    0.80
}

pub(crate) fn default_min_relevance() -> f64 {
    0.70
}

pub(crate) fn default_concurrency_limit() -> usize {
    4
}

pub(crate) fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}
