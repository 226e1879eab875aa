//! Token-budget chunking for large documents.

use crate::tokenizer::Tokenizer;
use docfields_core::{AppError, AppResult};

/// Partitions a document into budget-sized windows of its token sequence.
///
/// The window *count* is derived from the document plus the prompt overhead
/// (guideline and current field spec), so that every window leaves room for
/// the overhead within the model's input limit. The windows themselves are
/// sliced from the document's own token sequence. Because the combined
/// sequence is never shorter than the document's, no document token is ever
/// dropped; a large overhead can only over-count, producing empty trailing
/// chunks.
pub struct Chunker<'a> {
    tokenizer: &'a dyn Tokenizer,
    budget: usize,
}

impl<'a> Chunker<'a> {
    /// Create a chunker with the given token budget per chunk.
    pub fn new(tokenizer: &'a dyn Tokenizer, budget: usize) -> Self {
        Self { tokenizer, budget }
    }

    /// Split the document into the ordered chunk sequence.
    ///
    /// The result is deterministic for a fixed (document, overhead, budget,
    /// tokenizer). Concatenating the chunks in order reconstructs a
    /// token-equivalent of the document.
    ///
    /// An empty document with empty overhead yields a single empty chunk.
    pub fn chunk(&self, document: &str, overhead: &str) -> AppResult<Vec<String>> {
        if self.budget == 0 {
            return Err(AppError::Config(
                "Token budget must be greater than zero".to_string(),
            ));
        }

        let doc_tokens = self.tokenizer.encode(document);
        let combined = format!("{}{}", document, overhead);
        let all_tokens = self.tokenizer.encode(&combined);

        // Overhead inflates the window count only; the windows are sliced
        // from the document's own token sequence.
        let windows = all_tokens.len().div_ceil(self.budget);
        if windows == 0 {
            return Ok(vec![String::new()]);
        }

        let mut chunks = Vec::with_capacity(windows);
        for i in 0..windows {
            let start = (i * self.budget).min(doc_tokens.len());
            let end = ((i + 1) * self.budget).min(doc_tokens.len());
            chunks.push(self.tokenizer.decode(&doc_tokens[start..end])?);
        }

        tracing::debug!(
            "Chunked document into {} chunks ({} document tokens, {} combined tokens, budget {})",
            chunks.len(),
            doc_tokens.len(),
            all_tokens.len(),
            self.budget
        );

        Ok(chunks)
    }
}
