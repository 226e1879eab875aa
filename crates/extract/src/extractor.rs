//! The extraction orchestrator.
//!
//! Folds the chunk sequence through repeated completion-service calls,
//! carrying the output of call *i* forward as the field-spec input of call
//! *i+1*. The loop is strictly sequential: each invocation depends on the
//! previous one's output, so chunks are never processed concurrently.

use crate::chunker::Chunker;
use crate::error::ExtractError;
use crate::fieldspec::FieldSpec;
use crate::tokenizer::Tokenizer;
use crate::types::{CancelFlag, ExtractionOutcome, ExtractionRequest, ExtractorConfig};
use docfields_llm::{LlmClient, LlmRequest};
use docfields_prompt::{PromptBuilder, PromptVars};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Runs the sequential carry-forward extraction over one document.
///
/// The client handle and tokenizer are constructed once per process and
/// passed in explicitly; the orchestrator holds no ambient global state.
pub struct Extractor {
    client: Arc<dyn LlmClient>,
    tokenizer: Arc<dyn Tokenizer>,
    prompts: PromptBuilder,
    config: ExtractorConfig,
}

impl Extractor {
    /// Create a new extractor.
    ///
    /// Compiles the instruction template; failure is a configuration error,
    /// fatal at startup.
    pub fn new(
        client: Arc<dyn LlmClient>,
        tokenizer: Arc<dyn Tokenizer>,
        config: ExtractorConfig,
    ) -> docfields_core::AppResult<Self> {
        Ok(Self {
            client,
            tokenizer,
            prompts: PromptBuilder::new()?,
            config,
        })
    }

    /// Extract fields from a document.
    ///
    /// Chunks the document once up front, then performs one completion call
    /// per chunk, strictly in document order, replacing the accumulator
    /// with each call's parsed output. The final accumulator is the
    /// consolidated result.
    ///
    /// Cancellation is checked between chunk iterations; a long document
    /// may span many sequential network calls.
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
        cancel: &CancelFlag,
    ) -> Result<ExtractionOutcome, ExtractError> {
        if request.fields.is_empty() {
            return Err(ExtractError::MissingFieldSpec);
        }

        let start = Instant::now();
        let mut accumulator = request.fields.clone();

        // The guideline and the initial field spec ride along in every
        // prompt, so they count against the partition arithmetic.
        let overhead = format!("{}{}", request.guideline, accumulator.to_json());
        let chunker = Chunker::new(self.tokenizer.as_ref(), self.config.token_budget);
        let chunks = chunker.chunk(&request.document, &overhead)?;

        info!(
            "Starting extraction: doc_type '{}', {} fields, {} chunks, model '{}'",
            request.doc_type,
            accumulator.len(),
            chunks.len(),
            self.config.model
        );

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Extraction cancelled before chunk {}", chunk_index);
                return Err(ExtractError::Cancelled {
                    chunk_index,
                    partial: accumulator,
                });
            }

            debug!("Processing chunk {}/{}", chunk_index + 1, chunks.len());

            let prompt = self.prompts.render(&PromptVars {
                doc_type: request.doc_type.clone(),
                context: chunk.clone(),
                extraction_fields: accumulator.to_json(),
                guidelines: request.guideline.clone(),
            })?;

            let content = match self.call_with_retry(&prompt).await {
                Ok(content) => content,
                Err(message) => {
                    return Err(ExtractError::Service {
                        chunk_index,
                        message,
                        partial: accumulator,
                    });
                }
            };

            // Full overwrite: the response is a revised, consistency-aware
            // field spec, not a delta. Malformed output is surfaced here
            // instead of corrupting every subsequent chunk.
            accumulator = match FieldSpec::from_json_object(&content) {
                Ok(fields) => fields,
                Err(message) => {
                    return Err(ExtractError::MalformedOutput {
                        chunk_index,
                        message,
                        partial: accumulator,
                    });
                }
            };
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extraction complete: {} fields ({} found) across {} chunks in {} ms",
            accumulator.len(),
            accumulator.iter().filter(|(_, v)| v.is_found()).count(),
            chunks.len(),
            elapsed_ms
        );

        Ok(ExtractionOutcome {
            fields: accumulator,
            chunk_count: chunks.len(),
            model: self.config.model.clone(),
            elapsed_ms,
        })
    }

    /// One completion call with timeout and bounded retry.
    ///
    /// Transient failures (network, rate limit, timeout) are retried with
    /// exponential backoff up to `max_retries` times; the final failure
    /// message is returned for the caller to attach chunk context.
    async fn call_with_retry(&self, prompt: &str) -> Result<String, String> {
        let request = LlmRequest::new(prompt, &self.config.model)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_output_tokens);

        let mut delay = self.config.retry_base_delay;
        let mut attempt: u32 = 0;

        loop {
            let message = match timeout(self.config.call_timeout, self.client.complete(&request))
                .await
            {
                Ok(Ok(response)) => return Ok(response.content),
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("timed out after {:?}", self.config.call_timeout),
            };

            if attempt >= self.config.max_retries {
                return Err(message);
            }

            attempt += 1;
            warn!(
                "Completion call failed (attempt {}/{}): {}; retrying in {:?}",
                attempt,
                self.config.max_retries + 1,
                message,
                delay
            );
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldspec::FieldValue;
    use crate::tokenizer::CharTokenizer;
    use docfields_llm::MockClient;
    use std::time::Duration;

    fn test_config(token_budget: usize) -> ExtractorConfig {
        ExtractorConfig {
            model: "mock-model".to_string(),
            token_budget,
            call_timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_base_delay: Duration::from_millis(1),
            ..ExtractorConfig::default()
        }
    }

    fn extractor(client: &MockClient, config: ExtractorConfig) -> Extractor {
        Extractor::new(
            Arc::new(client.clone()),
            Arc::new(CharTokenizer::new()),
            config,
        )
        .unwrap()
    }

    fn request(document: &str, fields: &[&str]) -> ExtractionRequest {
        ExtractionRequest {
            doc_type: "invoice".to_string(),
            document: document.to_string(),
            guideline: String::new(),
            fields: FieldSpec::from_names(fields.iter().copied()),
        }
    }

    // 70 document chars + 13 overhead chars ({"date":"NA"}), budget 30
    // -> 3 chunks of 30/30/10 token units under the char tokenizer.
    #[tokio::test]
    async fn test_multi_chunk_sequential_threading() {
        let client = MockClient::new("{}");
        client.push_response(r#"{"date":"01/01/2024"}"#);
        client.push_response(r#"{"date":"12/02/2024"}"#);
        client.push_response(r#"{"date":"12/02/2024","amount":"100.00"}"#);

        let document = "abcdefghij".repeat(7);
        let extractor = extractor(&client, test_config(30));

        let outcome = extractor
            .extract(&request(&document, &["date"]), &CancelFlag::new())
            .await
            .unwrap();

        // Exactly one sequential call per chunk
        assert_eq!(outcome.chunk_count, 3);
        assert_eq!(client.call_count(), 3);

        // The final accumulator is the third call's parsed output
        assert_eq!(
            outcome.fields,
            FieldSpec::from_json_object(r#"{"date":"12/02/2024","amount":"100.00"}"#).unwrap()
        );

        // Call i receives the accumulator produced by call i-1
        let prompts = client.prompts();
        assert!(prompts[0].contains(r#"{"date":"NA"}"#));
        assert!(prompts[1].contains(r#"{"date":"01/01/2024"}"#));
        assert!(prompts[2].contains(r#"{"date":"12/02/2024"}"#));

        // Chunk text appears in the matching prompt
        assert!(prompts[0].contains(&document[..30]));
    }

    // 8 document chars + 10 overhead chars ({"x":"NA"}), budget 20
    // -> a single chunk equal to the whole document.
    #[tokio::test]
    async fn test_single_chunk_document() {
        let client = MockClient::new("{}");
        client.push_response(r#"{"x":"found"}"#);

        let extractor = extractor(&client, test_config(20));
        let outcome = extractor
            .extract(&request("document", &["x"]), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome.chunk_count, 1);
        assert_eq!(client.call_count(), 1);
        assert_eq!(
            outcome.fields.get("x"),
            Some(&FieldValue::Found("found".to_string()))
        );
        assert!(client.prompts()[0].contains("document"));
    }

    #[tokio::test]
    async fn test_service_failure_reports_chunk_and_partial() {
        let client = MockClient::new("{}");
        client.push_response(r#"{"date":"01/01/2024"}"#);
        client.push_error("service unavailable");

        let document = "abcdefghij".repeat(7);
        let extractor = extractor(&client, test_config(30));

        let err = extractor
            .extract(&request(&document, &["date"]), &CancelFlag::new())
            .await
            .unwrap_err();

        // Failed on chunk 1 of 3; the partial result is the chunk-0 output,
        // not a partially-applied chunk-1 result
        match err {
            ExtractError::Service {
                chunk_index,
                ref partial,
                ..
            } => {
                assert_eq!(chunk_index, 1);
                assert_eq!(
                    *partial,
                    FieldSpec::from_json_object(r#"{"date":"01/01/2024"}"#).unwrap()
                );
            }
            other => panic!("Expected Service error, got {:?}", other),
        }
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let client = MockClient::new("{}");
        client.push_error("rate limited");
        client.push_response(r#"{"x":"found"}"#);

        let config = ExtractorConfig {
            max_retries: 1,
            ..test_config(20)
        };
        let extractor = extractor(&client, config);

        let outcome = extractor
            .extract(&request("document", &["x"]), &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(client.call_count(), 2);
        assert_eq!(outcome.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_malformed_output_is_not_carried_forward() {
        let client = MockClient::new("I could not find any fields.");

        let extractor = extractor(&client, test_config(20));
        let err = extractor
            .extract(&request("document", &["x"]), &CancelFlag::new())
            .await
            .unwrap_err();

        match err {
            ExtractError::MalformedOutput {
                chunk_index,
                ref partial,
                ..
            } => {
                assert_eq!(chunk_index, 0);
                // The accumulator is still the initial spec
                assert_eq!(*partial, FieldSpec::from_names(["x"]));
            }
            other => panic!("Expected MalformedOutput error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_field_spec_rejected_before_any_call() {
        let client = MockClient::new("{}");
        let extractor = extractor(&client, test_config(20));

        let mut req = request("document", &[]);
        req.fields = FieldSpec::default();

        let err = extractor
            .extract(&req, &CancelFlag::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::MissingFieldSpec));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_between_iterations() {
        let client = MockClient::new("{}");
        let extractor = extractor(&client, test_config(20));

        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = extractor
            .extract(&request("document", &["x"]), &cancel)
            .await
            .unwrap_err();

        match err {
            ExtractError::Cancelled { chunk_index, .. } => assert_eq!(chunk_index, 0),
            other => panic!("Expected Cancelled error, got {:?}", other),
        }
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_guideline_is_tolerated() {
        let client = MockClient::new(r#"{"x":"NA"}"#);
        let extractor = extractor(&client, test_config(20));

        // Guideline is empty in the fixture request; the run must succeed
        let outcome = extractor
            .extract(&request("document", &["x"]), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(outcome.fields.get("x"), Some(&FieldValue::NotFound));
    }

    #[tokio::test]
    async fn test_guideline_reaches_prompt() {
        let client = MockClient::new(r#"{"x":"NA"}"#);
        let extractor = extractor(&client, test_config(50));

        let mut req = request("document", &["x"]);
        req.guideline = "Dates in DD/MM/YYYY".to_string();

        extractor.extract(&req, &CancelFlag::new()).await.unwrap();
        assert!(client.prompts()[0].contains("Dates in DD/MM/YYYY"));
    }
}
