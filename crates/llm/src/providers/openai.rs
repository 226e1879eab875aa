//! OpenAI chat-completions provider implementation.
//!
//! API reference: https://platform.openai.com/docs/api-reference/chat

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use docfields_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

/// OpenAI chat-completions request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI chat-completions response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// OpenAI LLM client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new OpenAI client against the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_ENDPOINT, api_key)
    }

    /// Create a new OpenAI client with a custom base URL (proxies,
    /// compatible gateways).
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert LlmRequest to the chat-completions format.
    fn to_chat_request(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::new();

        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to OpenAI");
        tracing::debug!("Request model: {}", request.model);

        let chat_request = self.to_chat_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to OpenAI: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse OpenAI response: {}", e)))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Llm("OpenAI response contained no choices".to_string()))?;

        let usage = chat_response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        tracing::info!("Received completion from OpenAI");

        Ok(LlmResponse {
            content,
            model: chat_response.model,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAiClient::new("sk-test");
        assert_eq!(client.provider_name(), "openai");
        assert_eq!(client.base_url, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_chat_request_conversion() {
        let client = OpenAiClient::new("sk-test");
        let request = LlmRequest::new("Extract fields", "gpt-4o")
            .with_temperature(0.1)
            .with_system("You are an analyst");

        let chat_req = client.to_chat_request(&request);
        assert_eq!(chat_req.model, "gpt-4o");
        assert_eq!(chat_req.messages.len(), 2);
        assert_eq!(chat_req.messages[0].role, "system");
        assert_eq!(chat_req.messages[1].role, "user");
        assert_eq!(chat_req.messages[1].content, "Extract fields");
    }

    #[test]
    fn test_chat_request_without_system() {
        let client = OpenAiClient::new("sk-test");
        let request = LlmRequest::new("Extract fields", "gpt-4o");

        let chat_req = client.to_chat_request(&request);
        assert_eq!(chat_req.messages.len(), 1);
        assert_eq!(chat_req.messages[0].role, "user");
    }
}
