//! Structured errors for the extraction pipeline.

use crate::fieldspec::FieldSpec;
use docfields_core::AppError;
use thiserror::Error;

/// Errors raised by the extraction orchestrator.
///
/// Failures that occur mid-run carry the index of the failing chunk and the
/// accumulator as of the last successful chunk, so the caller may decide to
/// resume. A failure never yields a partial result presented as success.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// No field spec was supplied or resolved; extraction cannot proceed
    #[error("no extraction fields were supplied or resolved")]
    MissingFieldSpec,

    /// The completion service failed for a chunk after exhausting retries
    #[error("completion call for chunk {chunk_index} failed: {message}")]
    Service {
        chunk_index: usize,
        message: String,
        partial: FieldSpec,
    },

    /// The completion service returned text that is not a usable field spec
    #[error("completion output for chunk {chunk_index} is not a usable field spec: {message}")]
    MalformedOutput {
        chunk_index: usize,
        message: String,
        partial: FieldSpec,
    },

    /// The run was cancelled between chunk iterations
    #[error("extraction cancelled before chunk {chunk_index}")]
    Cancelled {
        chunk_index: usize,
        partial: FieldSpec,
    },

    /// Configuration or infrastructure failure (tokenizer, template)
    #[error(transparent)]
    App(#[from] AppError),
}

impl ExtractError {
    /// The accumulator as of the last successful chunk, if the run got that
    /// far.
    pub fn partial_fields(&self) -> Option<&FieldSpec> {
        match self {
            ExtractError::Service { partial, .. }
            | ExtractError::MalformedOutput { partial, .. }
            | ExtractError::Cancelled { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// The index of the chunk at which the run stopped, if any.
    pub fn failed_chunk(&self) -> Option<usize> {
        match self {
            ExtractError::Service { chunk_index, .. }
            | ExtractError::MalformedOutput { chunk_index, .. }
            | ExtractError::Cancelled { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_fields_accessor() {
        let partial = FieldSpec::from_names(["date"]);
        let err = ExtractError::Service {
            chunk_index: 1,
            message: "timeout".to_string(),
            partial: partial.clone(),
        };

        assert_eq!(err.partial_fields(), Some(&partial));
        assert_eq!(err.failed_chunk(), Some(1));
    }

    #[test]
    fn test_missing_field_spec_has_no_partial() {
        let err = ExtractError::MissingFieldSpec;
        assert!(err.partial_fields().is_none());
        assert!(err.failed_chunk().is_none());
    }
}
