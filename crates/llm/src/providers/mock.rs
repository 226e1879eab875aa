//! Scripted mock client for deterministic testing.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docfields_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A scripted response step for the mock client.
#[derive(Debug, Clone)]
enum Step {
    Respond(String),
    Fail(String),
}

/// Mock LLM client that returns pre-scripted responses in order.
///
/// Each call to `complete` pops the next scripted step; the prompts it
/// receives are recorded so tests can assert ordering and accumulator
/// threading. Once the script is exhausted the default response is returned.
///
/// # Examples
///
/// ```
/// use docfields_llm::{LlmClient, LlmRequest, MockClient};
///
/// # async fn example() {
/// let client = MockClient::new(r#"{"date": "NA"}"#);
/// client.push_response(r#"{"date": "12/02/2024"}"#);
///
/// let response = client
///     .complete(&LlmRequest::new("prompt", "mock-model"))
///     .await
///     .unwrap();
/// assert_eq!(response.content, r#"{"date": "12/02/2024"}"#);
/// assert_eq!(client.call_count(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockClient {
    default_response: String,
    script: Arc<Mutex<VecDeque<Step>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockClient {
    /// Create a new mock client with a default response for all prompts.
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            default_response: default_response.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response.
    pub fn push_response(&self, response: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Step::Respond(response.into()));
    }

    /// Queue a failed call.
    pub fn push_error(&self, message: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Step::Fail(message.into()));
    }

    /// Number of completed calls (successful or failed).
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// The prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Fail(message)) => Err(AppError::Llm(message)),
            Some(Step::Respond(content)) => Ok(LlmResponse {
                content,
                model: request.model.clone(),
                usage: LlmUsage::default(),
            }),
            None => Ok(LlmResponse {
                content: self.default_response.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let client = MockClient::new("default");
        client.push_response("first");
        client.push_response("second");

        let request = LlmRequest::new("p1", "mock-model");
        assert_eq!(client.complete(&request).await.unwrap().content, "first");
        assert_eq!(client.complete(&request).await.unwrap().content, "second");
        assert_eq!(client.complete(&request).await.unwrap().content, "default");
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_error() {
        let client = MockClient::new("default");
        client.push_error("rate limited");

        let request = LlmRequest::new("p1", "mock-model");
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_prompts_recorded() {
        let client = MockClient::new("ok");
        client
            .complete(&LlmRequest::new("alpha", "mock-model"))
            .await
            .unwrap();
        client
            .complete(&LlmRequest::new("beta", "mock-model"))
            .await
            .unwrap();

        assert_eq!(client.prompts(), vec!["alpha", "beta"]);
    }
}
