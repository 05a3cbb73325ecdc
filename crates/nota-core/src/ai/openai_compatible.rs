//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! - OpenAI itself (https://api.openai.com)
//! - vLLM, LocalAI, llama-server, Docker Model Runner
//!
//! # Configuration
//!
//! From `[ai]` in the config file, or environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4)
//! - `OPENAI_COMPATIBLE_API_KEY` / `OPENAI_API_KEY`: API key if required

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiConfig;
use crate::error::{Error, Result};
use crate::models::ExtractedReceipt;
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::{parse_advisory, parse_extraction, preview};
use super::AIBackend;

/// OpenAI-compatible backend
///
/// Every call samples at temperature zero.
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    /// Create from resolved configuration
    pub fn from_config(config: &AiConfig, prompts: PromptLibrary) -> Result<Self> {
        Self::build(
            &config.host,
            &config.model,
            config.api_key.clone(),
            config.timeout,
            prompts,
        )
    }

    fn build(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
        prompts: PromptLibrary,
    ) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout,
            prompts: Arc::new(RwLock::new(prompts)),
        })
    }

    /// Render a prompt into (system, user) message texts
    fn render(&self, id: PromptId, vars: &HashMap<&str, &str>) -> Result<(Option<String>, String)> {
        let mut prompts = self
            .prompts
            .write()
            .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
        let template = prompts.get(id)?;
        let system = template.system_section().map(str::to_string);
        Ok((system, template.render_user(vars)))
    }

    /// Make a chat completion request
    ///
    /// Transport problems come back as `Http`, `ModelApi` or `Timeout`; a
    /// success without content as `EmptyResponse`.
    async fn chat_completion(
        &self,
        operation: &str,
        system: Option<String>,
        user: String,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user,
        });

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.0),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ModelApi(format!("{}: {}", status, preview(&body))));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(Error::EmptyResponse)
    }

    fn transport_error(&self, operation: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                operation: operation.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            Error::Http(e)
        }
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

/// Content is null when the model refuses or only calls tools
#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn extract_receipt(&self, html: &str) -> Result<ExtractedReceipt> {
        let (system, user) = {
            let mut vars = HashMap::new();
            vars.insert("html", html);
            self.render(PromptId::ExtractReceipt, &vars)?
        };

        let response = self
            .chat_completion("receipt extraction", system, user)
            .await?;
        debug!(model = %self.model, raw = %preview(&response), "Extraction response");

        parse_extraction(&response)
    }

    async fn price_advisory(&self, summary: &str) -> Result<String> {
        let (system, user) = {
            let mut vars = HashMap::new();
            vars.insert("items", summary);
            self.render(PromptId::PriceAdvisory, &vars)?
        };

        let response = self.chat_completion("price advisory", system, user).await?;
        debug!(model = %self.model, chars = response.len(), "Advisory response");

        parse_advisory(&response)
    }

    async fn health_check(&self) -> bool {
        let mut req = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        matches!(req.send().await, Ok(resp) if resp.status().is_success())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> OpenAICompatibleBackend {
        OpenAICompatibleBackend::build(
            url,
            "gpt-4",
            None,
            Duration::from_secs(5),
            PromptLibrary::embedded_only(),
        )
        .unwrap()
    }

    #[test]
    fn test_backend_new() {
        let backend = backend("http://localhost:12434");
        assert_eq!(backend.model(), "gpt-4");
        assert_eq!(backend.host(), "http://localhost:12434");
    }

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = backend("http://localhost:12434/");
        assert_eq!(backend.host(), "http://localhost:12434");
    }

    #[test]
    fn test_from_config() {
        let config = AiConfig {
            host: "http://example.test/".into(),
            model: "m".into(),
            api_key: Some("k".into()),
            timeout: Duration::from_secs(9),
        };
        let backend =
            OpenAICompatibleBackend::from_config(&config, PromptLibrary::embedded_only()).unwrap();
        assert_eq!(backend.host(), "http://example.test");
        assert_eq!(backend.timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_render_uses_sections() {
        let backend = backend("http://localhost");
        let mut vars = HashMap::new();
        vars.insert("html", "<table>nota</table>");
        let (system, user) = backend.render(PromptId::ExtractReceipt, &vars).unwrap();
        assert!(system.unwrap().contains("JSON"));
        assert!(user.contains("<table>nota</table>"));
        assert!(!user.contains("{{html}}"));
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = backend("http://127.0.0.1:1");
        assert!(!backend.health_check().await);
    }

    #[test]
    fn test_chat_completion_request_serialization() {
        let request = ChatCompletionRequest {
            model: "gpt-4".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "Hello".to_string(),
            }],
            temperature: Some(0.0),
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert_eq!(json["temperature"].as_f64(), Some(0.0));
    }

    #[test]
    fn test_response_with_null_content() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
