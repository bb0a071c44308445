//! LLM-as-judge faithfulness grading

use kbeval_core::config::JudgeConfig;
use kbeval_core::error::{Error, Result};
use kbeval_core::{JudgeRequest, JudgeService, RetrievedPassage};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

const RUBRIC: &str = "\
You are grading whether an answer is supported by retrieved context.

Score the answer on this scale:
- 1.0: every claim in the answer is directly supported by the context
- 0.7-0.9: the answer is mostly supported; minor details are missing from the context
- 0.4-0.6: the answer mixes supported claims with unsupported ones
- 0.1-0.3: the answer is largely unsupported by the context
- 0.0: the answer contradicts the context or has no basis in it

Respond with JSON only, in the form {\"score\": <float between 0 and 1>, \"reasoning\": \"<one or two sentences>\"}.";

/// Result of grading one answer
#[derive(Debug, Clone, PartialEq)]
pub struct FaithfulnessGrade {
    /// In [0, 1]; 0.0 when the judge reply could not be parsed
    pub score: f64,
    pub reasoning: Option<String>,
    /// Set when the judge reply was unusable
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Builds judge prompts and interprets the replies
pub struct FaithfulnessGrader {
    judge: Arc<dyn JudgeService>,
    max_tokens: u32,
    context_passages: usize,
    passage_char_budget: usize,
}

impl FaithfulnessGrader {
    pub fn new(judge: Arc<dyn JudgeService>, config: &JudgeConfig) -> Self {
        Self {
            judge,
            max_tokens: config.max_tokens,
            context_passages: config.context_passages,
            passage_char_budget: config.passage_char_budget,
        }
    }

    /// Grade `answer` against the top-ranked passages.
    ///
    /// Judge call failures propagate; unparseable replies do not.
    pub async fn grade(
        &self,
        query: &str,
        passages: &[RetrievedPassage],
        answer: &str,
    ) -> Result<FaithfulnessGrade> {
        let prompt = build_prompt(
            query,
            passages,
            answer,
            self.context_passages,
            self.passage_char_budget,
        );

        let reply = self
            .judge
            .complete(JudgeRequest {
                prompt,
                max_tokens: self.max_tokens,
            })
            .await?;

        match parse_judge_reply(&reply) {
            Ok(verdict) => {
                debug!("Judge score {:.2}", verdict.score);
                Ok(FaithfulnessGrade {
                    score: verdict.score,
                    reasoning: verdict.reasoning,
                    warning: None,
                })
            }
            Err(e) => {
                warn!("Unparseable judge reply, scoring faithfulness 0.0: {e}");
                Ok(FaithfulnessGrade {
                    score: 0.0,
                    reasoning: None,
                    warning: Some(format!("judge reply not parseable: {e}")),
                })
            }
        }
    }
}

/// Render the grading prompt
pub fn build_prompt(
    query: &str,
    passages: &[RetrievedPassage],
    answer: &str,
    context_passages: usize,
    passage_char_budget: usize,
) -> String {
    let context = if passages.is_empty() {
        "(no passages retrieved)".to_string()
    } else {
        passages
            .iter()
            .take(context_passages)
            .enumerate()
            .map(|(i, p)| {
                format!(
                    "[{}] {}",
                    i + 1,
                    truncate_chars(&p.content, passage_char_budget)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!("{RUBRIC}\n\nQuestion:\n{query}\n\nContext:\n{context}\n\nAnswer:\n{answer}\n")
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extract a `{score, reasoning}` verdict from a judge reply.
///
/// Accepts fenced or bare JSON, JSON embedded in surrounding prose, or a
/// reply that is a bare number with at most trailing punctuation. A score
/// outside [0, 1] is a parse error.
pub fn parse_judge_reply(reply: &str) -> Result<JudgeVerdict> {
    let verdict = find_verdict(reply)
        .or_else(|| {
            bare_number(reply).map(|score| RawVerdict {
                score,
                reasoning: None,
            })
        })
        .ok_or_else(|| Error::parse(format!("no score in judge reply: {}", preview(reply))))?;

    if !(0.0..=1.0).contains(&verdict.score) {
        return Err(Error::parse(format!(
            "score {} outside [0, 1] in judge reply: {}",
            verdict.score,
            preview(reply)
        )));
    }

    Ok(JudgeVerdict {
        score: verdict.score,
        reasoning: verdict.reasoning.filter(|r| !r.trim().is_empty()),
    })
}

/// Parsed judge verdict
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    pub score: f64,
    pub reasoning: Option<String>,
}

fn find_verdict(reply: &str) -> Option<RawVerdict> {
    let content = strip_markdown_fences(reply);

    for (pos, _) in content.match_indices('{') {
        if let Some(candidate) = extract_balanced_at(content, pos) {
            if let Ok(verdict) = serde_json::from_str::<RawVerdict>(candidate) {
                return Some(verdict);
            }
        }
    }

    None
}

fn strip_markdown_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (```json) up to the first newline
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.strip_prefix("json").unwrap_or(rest),
    };

    match body.rfind("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Balanced `{...}` starting at byte offset `start`, respecting JSON strings
fn extract_balanced_at(content: &str, start: usize) -> Option<&str> {
    let tail = content.get(start..)?;
    if !tail.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in tail.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&tail[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// A reply that is just a number, optionally followed by punctuation
fn bare_number(reply: &str) -> Option<f64> {
    let trimmed = strip_markdown_fences(reply);
    let end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && c == '-')))
        .map_or(trimmed.len(), |(i, _)| i);

    let rest = &trimmed[end..];
    if !rest
        .chars()
        .all(|c| c.is_whitespace() || c.is_ascii_punctuation())
    {
        return None;
    }

    trimmed[..end].trim_end_matches('.').parse::<f64>().ok()
}

fn preview(text: &str) -> String {
    let head = truncate_chars(text.trim(), 120);
    if head.len() < text.trim().len() {
        format!("{head}...")
    } else {
        head.to_string()
    }
}
