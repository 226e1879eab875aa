//! Error types for the docfields CLI.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application, including configuration, I/O, LLM, prompt, history,
//! and extraction errors.

use thiserror::Error;

/// Unified error type for the docfields CLI.
///
/// All functions in the application return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (bad provider, unknown tokenizer model,
    /// broken template). Fatal at startup, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Prompt rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// History store errors
    #[error("History error: {0}")]
    History(String),

    /// Extraction pipeline errors
    #[error("Extraction error: {0}")]
    Extraction(String),

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
