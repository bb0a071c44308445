//! Judge factory tests

use kbeval_core::config::JudgeConfig;
use kbeval_core::JudgeRequest;
use kbeval_judge::create_judge;

fn judge_config(provider: &str) -> JudgeConfig {
    JudgeConfig {
        provider: provider.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_mock_provider_grades_without_network() {
    let judge = create_judge(&judge_config("mock")).expect("Failed to create judge");

    let reply = judge
        .complete(JudgeRequest {
            prompt: "Rate this answer".to_string(),
            max_tokens: 64,
        })
        .await
        .expect("mock judge failed");

    assert!(reply.contains("\"score\""));
}

#[test]
fn test_unknown_provider_is_config_error() {
    let err = create_judge(&judge_config("openai-ish"))
        .err()
        .expect("unknown provider should be rejected");
    assert!(err.is_config());
    assert!(err.to_string().contains("openai-ish"));
}

#[test]
fn test_anthropic_with_explicit_key() {
    let config = JudgeConfig {
        api_key: Some("sk-ant-test".to_string()),
        ..judge_config("anthropic")
    };
    assert!(create_judge(&config).is_ok());
}

#[test]
fn test_anthropic_without_key_is_config_error() {
    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        eprintln!("ANTHROPIC_API_KEY set, skipping");
        return;
    }
    let err = create_judge(&judge_config("anthropic"))
        .err()
        .expect("missing key should be rejected");
    assert!(err.is_config());
}

#[test]
fn test_localapi_needs_no_key() {
    let config = JudgeConfig {
        api_base_url: Some("http://localhost:8000/v1".to_string()),
        ..judge_config("localapi")
    };
    assert!(create_judge(&config).is_ok());
}

/// Local API judge against a running server
///
/// Requires an OpenAI-compatible server on localhost:8000 and is ignored by default.
/// Run with: cargo test --package kbeval-judge -- --ignored test_localapi_live
#[tokio::test]
#[ignore]
async fn test_localapi_live_completion() {
    let judge = create_judge(&judge_config("localapi")).expect("Failed to create judge");
    let reply = judge
        .complete(JudgeRequest {
            prompt: "Reply with the JSON {\"score\": 1.0}".to_string(),
            max_tokens: 32,
        })
        .await
        .expect("completion failed");
    assert!(!reply.is_empty());
}
