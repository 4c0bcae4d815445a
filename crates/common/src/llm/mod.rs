//! Text understanding capability
//!
//! A single-turn "system instruction + user prompt in, text out" contract.
//! The pipeline never depends on a provider; it holds an
//! `Arc<dyn TextUnderstanding>` handed to it at construction.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics::record_collaborator_call;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for the language understanding capability
#[async_trait]
pub trait TextUnderstanding: Send + Sync {
    /// Submit one system instruction and one user prompt, return the reply text
    async fn understand(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI-compatible chat completions client
pub struct OpenAIChatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    endpoint: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

impl OpenAIChatClient {
    /// Create a client for `model` using the connection settings in `config`
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "llm.api_key is required for the openai provider".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let base = config
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            temperature: config.temperature,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            retry: RetryPolicy::exponential(
                config.max_retries,
                Duration::from_millis(200),
                Duration::from_secs(5),
            ),
        })
    }

    async fn make_request(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Capability {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            AppError::Capability {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Capability {
                message: "Empty response from model".to_string(),
            })
    }
}

#[async_trait]
impl TextUnderstanding for OpenAIChatClient {
    async fn understand(&self, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let result = self
            .retry
            .run_when(
                "llm_chat",
                |_| self.make_request(system, prompt),
                |_| true,
                AppError::is_transient,
            )
            .await;

        record_collaborator_call("llm", start.elapsed().as_secs_f64(), result.is_ok());

        result.map(|r| r.value).map_err(|e| {
            e.into_error().unwrap_or_else(|| AppError::Capability {
                message: "No response after retries".to_string(),
            })
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Create an understanding client for `model` based on configuration
pub fn create_understanding(
    config: &LlmConfig,
    model: &str,
) -> Result<Arc<dyn TextUnderstanding>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChatClient::new(config, model)?)),
        other => Err(AppError::Configuration {
            message: format!("Unknown llm provider: {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = LlmConfig::default();
        let err = OpenAIChatClient::new(&config, "gpt-4o-mini").err().unwrap();
        assert_eq!(err.code(), crate::errors::ErrorCode::ConfigurationError);
    }

    #[test]
    fn test_endpoint_from_base() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_base: Some("http://localhost:8000/v1/".to_string()),
            ..LlmConfig::default()
        };
        let client = OpenAIChatClient::new(&config, "local-model").unwrap();
        assert_eq!(client.endpoint, "http://localhost:8000/v1/chat/completions");
        assert_eq!(client.model_name(), "local-model");
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        assert!(create_understanding(&config, "x").is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "system",
                content: "be brief",
            }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["model"], "gpt-4o-mini");
    }
}
