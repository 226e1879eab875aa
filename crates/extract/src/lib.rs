//! Extraction core for docfields.
//!
//! This crate implements the token-budgeted chunking algorithm and the
//! sequential carry-forward loop that threads one evolving field spec
//! through successive completion-service calls:
//!
//! 1. The [`Tokenizer`] adapter measures text in model-vocabulary token
//!    units.
//! 2. The [`Chunker`] partitions the document into budget-sized windows of
//!    its token sequence.
//! 3. The [`Extractor`] folds the chunk sequence through the completion
//!    service, carrying the output of call *i* forward as the field-spec
//!    input of call *i+1*.
//!
//! The loop is strictly sequential; each call's input depends on the
//! previous call's output.

pub mod chunker;
pub mod error;
pub mod extractor;
pub mod fieldspec;
pub mod tokenizer;
pub mod types;

// Re-export main types
pub use chunker::Chunker;
pub use error::ExtractError;
pub use extractor::Extractor;
pub use fieldspec::{FieldSpec, FieldValue, NOT_FOUND_MARKER};
pub use tokenizer::{CharTokenizer, TiktokenTokenizer, Tokenizer};
pub use types::{CancelFlag, ExtractionOutcome, ExtractionRequest, ExtractorConfig};
