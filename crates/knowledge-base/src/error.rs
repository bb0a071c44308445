//! Error types for the knowledge-base client

use std::fmt;

/// Errors that can occur while talking to the knowledge-base proxy
#[derive(Debug)]
pub enum KnowledgeBaseError {
    /// The request did not complete (timeout, connection, throttling)
    TransportError(String),

    /// The proxy answered with `success: false` or a non-2xx status
    BackendError(String),

    /// The proxy answered with a body we could not decode
    ResponseFormatError(String),

    /// Configuration error
    ConfigError(String),
}

impl fmt::Display for KnowledgeBaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportError(msg) => write!(f, "Knowledge base request failed: {msg}"),
            Self::BackendError(msg) => write!(f, "Knowledge base returned an error: {msg}"),
            Self::ResponseFormatError(msg) => {
                write!(f, "Unexpected knowledge base response: {msg}")
            }
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for KnowledgeBaseError {}

impl From<KnowledgeBaseError> for kbeval_core::error::Error {
    fn from(err: KnowledgeBaseError) -> Self {
        use kbeval_core::error::Error;
        match err {
            KnowledgeBaseError::TransportError(_) => Error::transport(err.to_string()),
            // An undecodable body still means the backend gave us no usable result
            KnowledgeBaseError::BackendError(_) | KnowledgeBaseError::ResponseFormatError(_) => {
                Error::backend(err.to_string())
            }
            KnowledgeBaseError::ConfigError(msg) => Error::config(msg),
        }
    }
}
