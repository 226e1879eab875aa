//! LLM integration crate for docfields.
//!
//! This crate provides a provider-agnostic abstraction for the completion
//! service invoked once per document chunk. It supports multiple providers
//! through a unified trait-based interface.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI**: Hosted chat-completions API
//! - **Mock**: Scripted client for tests
//!
//! # Example
//! ```no_run
//! use docfields_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{MockClient, OllamaClient, OpenAiClient};
