//! LLM provider factory.
//!
//! This module provides a factory for creating LLM clients based on
//! application configuration. It handles provider resolution and secret
//! injection. The client is constructed once per process and passed by
//! reference into the extraction orchestrator; there is no ambient global
//! client.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use docfields_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("openai", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (for providers that require it)
///
/// # Returns
/// A shared trait object implementing `LlmClient`
///
/// # Errors
/// Returns a configuration error if the provider is unknown or a required
/// API key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let base_url = endpoint.unwrap_or("http://localhost:11434");
            let client = OllamaClient::with_base_url(base_url);
            Ok(Arc::new(client))
        }
        "openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("OpenAI provider requires API key".to_string())
            })?;
            let client = match endpoint {
                Some(endpoint) => OpenAiClient::with_base_url(endpoint, api_key),
                None => OpenAiClient::new(api_key),
            };
            Ok(Arc::new(client))
        }
        _ => Err(AppError::Config(format!("Unknown provider: {}", provider))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_create_openai_client() {
        let client = create_client("openai", None, Some("sk-test"));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().provider_name(), "openai");
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client("openai", None, None) {
            Err(err) => assert!(err.to_string().contains("requires API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
