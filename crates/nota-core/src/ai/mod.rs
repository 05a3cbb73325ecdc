//! Model backend abstraction
//!
//! This module provides a backend-agnostic interface for the two model calls
//! the pipeline makes: structured receipt extraction and price advisory.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all AI operations
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Usage
//!
//! ```rust,ignore
//! let ai = AIClient::from_config(&config.ai)?;
//! let receipt = ai.extract_receipt(&html).await?;
//! println!("Merchant: {}", receipt.merchant_id);
//! ```
//!
//! # Configuration
//!
//! - `AI_BACKEND`: `openai_compatible` (default) or `mock`
//! - everything else comes from `[ai]` in the config (see `config`)

mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::config::AiConfig;
use crate::error::Result;
use crate::models::ExtractedReceipt;
use crate::prompts::PromptLibrary;

/// Environment variable selecting the backend
pub const AI_BACKEND_ENV: &str = "AI_BACKEND";

/// Trait defining the interface for all AI backends
///
/// Backends should be Send + Sync to allow use across async tasks.
#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Turn receipt HTML into a validated receipt
    ///
    /// Fails with `MalformedResponse`/`EmptyResponse` when the answer breaks
    /// the JSON contract, and with a transport error when the call fails.
    async fn extract_receipt(&self, html: &str) -> Result<ExtractedReceipt>;

    /// Comparative price analysis over an itemized summary
    async fn price_advisory(&self, summary: &str) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the model name
    fn model(&self) -> &str;

    /// Get the host URL
    fn host(&self) -> &str;
}

/// Concrete AI client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum AIClient {
    /// OpenAI-compatible chat completions endpoint
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from configuration
    ///
    /// `AI_BACKEND=mock` selects the mock backend; anything else uses the
    /// configured endpoint with the default prompt library.
    pub fn from_config(config: &AiConfig) -> Result<Self> {
        let backend = std::env::var(AI_BACKEND_ENV).unwrap_or_default();
        Self::select(&backend, config, PromptLibrary::new())
    }

    fn select(backend: &str, config: &AiConfig, prompts: PromptLibrary) -> Result<Self> {
        match backend.to_lowercase().as_str() {
            "mock" => Ok(AIClient::Mock(MockBackend::new())),
            "" | "openai" | "openai_compatible" => Ok(AIClient::OpenAICompatible(
                OpenAICompatibleBackend::from_config(config, prompts)?,
            )),
            other => {
                tracing::warn!(backend = %other, "Unknown AI_BACKEND, using openai_compatible");
                Ok(AIClient::OpenAICompatible(
                    OpenAICompatibleBackend::from_config(config, prompts)?,
                ))
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }
}

impl From<MockBackend> for AIClient {
    fn from(backend: MockBackend) -> Self {
        AIClient::Mock(backend)
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn extract_receipt(&self, html: &str) -> Result<ExtractedReceipt> {
        match self {
            AIClient::OpenAICompatible(b) => b.extract_receipt(html).await,
            AIClient::Mock(b) => b.extract_receipt(html).await,
        }
    }

    async fn price_advisory(&self, summary: &str) -> Result<String> {
        match self {
            AIClient::OpenAICompatible(b) => b.price_advisory(summary).await,
            AIClient::Mock(b) => b.price_advisory(summary).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_ai_client_mock() {
        let client = AIClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
        assert_eq!(client.backend_name(), "mock");
    }

    #[test]
    fn test_select_backend() {
        let config = Config::default().ai;
        let mock = AIClient::select("MOCK", &config, PromptLibrary::embedded_only()).unwrap();
        assert_eq!(mock.backend_name(), "mock");

        let real = AIClient::select("", &config, PromptLibrary::embedded_only()).unwrap();
        assert_eq!(real.backend_name(), "openai_compatible");
        assert_eq!(real.model(), "gpt-4");
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let client = AIClient::mock();
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_mock_extract_receipt() {
        let client = AIClient::mock();
        let receipt = client.extract_receipt("<html></html>").await.unwrap();
        assert_eq!(receipt.merchant_id, "11.111.111/0001-11");
        assert_eq!(receipt.items.len(), 2);
    }
}
