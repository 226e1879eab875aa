//! Request, outcome, and configuration types for the extraction pipeline.

use crate::fieldspec::FieldSpec;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One extraction run over a single document.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Document type fed into the instruction template (e.g., "invoice")
    pub doc_type: String,

    /// The full document text
    pub document: String,

    /// Free-text extraction guidelines; empty means none
    pub guideline: String,

    /// Initial field spec; must contain at least one field name
    pub fields: FieldSpec,
}

/// The consolidated result of an extraction run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    /// Final field spec after the last chunk
    pub fields: FieldSpec,

    /// Number of chunks processed (= completion-service calls made)
    pub chunk_count: usize,

    /// Model that produced the result
    pub model: String,

    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
}

/// Tuning knobs for the extraction orchestrator.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Model identifier used for completion calls
    pub model: String,

    /// Token budget for a single document chunk
    pub token_budget: usize,

    /// Per-call timeout for the completion service
    pub call_timeout: Duration,

    /// Retries for transient completion-service failures
    pub max_retries: u32,

    /// Initial backoff delay; doubled after each retry
    pub retry_base_delay: Duration,

    /// Sampling temperature; low for stable extraction output
    pub temperature: f32,

    /// Maximum tokens the service may generate per call
    pub max_output_tokens: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            token_budget: 3500,
            call_timeout: Duration::from_secs(120),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
            temperature: 0.1,
            max_output_tokens: 4056,
        }
    }
}

/// Cooperative cancellation flag, checked between chunk iterations.
///
/// Clones share the same flag, so one handle can be tripped from a signal
/// handler while the orchestrator polls another.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create a new, untripped flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
