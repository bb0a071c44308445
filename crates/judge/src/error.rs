//! Error types for judge providers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Judge API key not configured for provider '{0}'")]
    MissingApiKey(String),

    /// The completion request did not reach the model or timed out
    #[error("Judge request failed: {0}")]
    Request(String),

    /// The provider answered with an error
    #[error("Judge API error: {0}")]
    Api(String),

    #[error("Claudius SDK error: {0}")]
    Claudius(String),
}

impl From<JudgeError> for kbeval_core::error::Error {
    fn from(err: JudgeError) -> Self {
        use kbeval_core::error::Error;
        match err {
            JudgeError::Config(_) | JudgeError::MissingApiKey(_) => Error::config(err.to_string()),
            JudgeError::Request(_) => Error::transport(err.to_string()),
            JudgeError::Api(_) | JudgeError::Claudius(_) => Error::backend(err.to_string()),
        }
    }
}
