//! Error types for the ragchat pipeline.
//!
//! This module defines a unified error enum covering all error categories
//! in the workspace: configuration, I/O, completion backend, search backend,
//! token accounting, and tool-call parsing.

use thiserror::Error;

/// Unified error type for the ragchat pipeline.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated. Backend
/// failures (quota, timeouts) are carried through unmodified; no retry or
/// backoff happens at this layer.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Completion backend errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Search backend errors
    #[error("Search error: {0}")]
    Search(String),

    /// The token counter cannot encode a message's content shape
    #[error("Could not encode unsupported message content: {0}")]
    UnsupportedContent(String),

    /// A tool-call argument payload was not parseable
    #[error("Malformed function arguments: {0}")]
    MalformedFunctionArguments(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_content_message() {
        let err = AppError::UnsupportedContent("message has no content".to_string());
        assert!(err.to_string().contains("unsupported message content"));
    }

    #[test]
    fn test_malformed_arguments_message() {
        let err = AppError::MalformedFunctionArguments("expected value at line 1".to_string());
        assert!(err.to_string().starts_with("Malformed function arguments"));
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AppError = parse_err.into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
