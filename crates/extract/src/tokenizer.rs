//! Tokenizer adapter for model-vocabulary token accounting.
//!
//! Chunk sizing must use the vocabulary of the target completion model so
//! that token-unit counts are a faithful proxy for the model's real input
//! limit.

use docfields_core::{AppError, AppResult};
use tiktoken_rs::{get_bpe_from_model, CoreBPE};

/// Converts text to a sequence of model-vocabulary token units and back.
///
/// The trait seam lets tests substitute a deterministic tokenizer for the
/// BPE-backed production one.
pub trait Tokenizer: Send + Sync {
    /// Encode text into token units.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode token units back into text.
    fn decode(&self, tokens: &[u32]) -> AppResult<String>;
}

/// Production tokenizer backed by the tiktoken BPE vocabularies.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
    model: String,
}

impl TiktokenTokenizer {
    /// Create a tokenizer for the given model identifier.
    ///
    /// An unknown model is a configuration error, fatal at startup and
    /// never retried.
    pub fn for_model(model: &str) -> AppResult<Self> {
        let bpe = get_bpe_from_model(model).map_err(|e| {
            AppError::Config(format!("No tokenizer vocabulary for model '{}': {}", model, e))
        })?;

        tracing::debug!("Loaded tokenizer vocabulary for model '{}'", model);

        Ok(Self {
            bpe,
            model: model.to_string(),
        })
    }

    /// The model identifier this tokenizer was built for.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> AppResult<String> {
        self.bpe
            .decode(tokens.to_vec())
            .map_err(|e| AppError::Config(format!("Failed to decode token sequence: {}", e)))
    }
}

/// Deterministic tokenizer that treats every Unicode scalar as one token
/// unit.
///
/// Not a faithful proxy for any real model's input limit; useful for tests
/// and offline dry runs, where exact token counts must be predictable.
#[derive(Debug, Clone, Default)]
pub struct CharTokenizer;

impl CharTokenizer {
    /// Create a new character tokenizer.
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for CharTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.chars().map(|c| c as u32).collect()
    }

    fn decode(&self, tokens: &[u32]) -> AppResult<String> {
        tokens
            .iter()
            .map(|&t| {
                char::from_u32(t)
                    .ok_or_else(|| AppError::Config(format!("Invalid token unit: {}", t)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_tokenizer_round_trip() {
        let tokenizer = CharTokenizer::new();
        let text = "Invoice No 42, dated 12/02/2024, café";

        let tokens = tokenizer.encode(text);
        assert_eq!(tokens.len(), text.chars().count());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn test_char_tokenizer_empty() {
        let tokenizer = CharTokenizer::new();
        assert!(tokenizer.encode("").is_empty());
        assert_eq!(tokenizer.decode(&[]).unwrap(), "");
    }

    #[test]
    fn test_char_tokenizer_slices_concatenate() {
        let tokenizer = CharTokenizer::new();
        let text = "abcdefghij";
        let tokens = tokenizer.encode(text);

        let first = tokenizer.decode(&tokens[..4]).unwrap();
        let second = tokenizer.decode(&tokens[4..]).unwrap();
        assert_eq!(format!("{}{}", first, second), text);
    }

    #[test]
    fn test_tiktoken_round_trip() {
        let tokenizer = TiktokenTokenizer::for_model("gpt-4o").unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";

        let tokens = tokenizer.encode(text);
        assert!(!tokens.is_empty());
        assert_eq!(tokenizer.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn test_tiktoken_unknown_model() {
        let result = TiktokenTokenizer::for_model("not-a-real-model");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
