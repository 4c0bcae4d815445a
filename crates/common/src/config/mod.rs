//! Configuration management for Truth Lens services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Understanding capability (LLM) configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Source lookup configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Content retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Pipeline sizing and limits
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry policies
    #[serde(default)]
    pub retry: RetryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Provider: openai (any OpenAI-compatible chat completions endpoint)
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the chat completions endpoint
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model used for claim and evidence extraction
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,

    /// Model used for the final verdict (falls back to the extraction model)
    pub reasoning_model: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Transport-level retries per request
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Provider: tavily
    #[serde(default = "default_search_provider")]
    pub provider: String,

    /// API key for the search endpoint
    pub api_key: Option<String>,

    /// Search endpoint
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// basic or advanced
    #[serde(default = "default_search_depth")]
    pub search_depth: String,

    /// Top results requested per claim
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Extract endpoint
    #[serde(default = "default_extract_endpoint")]
    pub endpoint: String,

    /// API key for the extract endpoint (falls back to search.api_key)
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_retrieval_timeout")]
    pub timeout_secs: u64,

    /// Fetch the page directly when the extract endpoint fails
    #[serde(default = "default_enabled")]
    pub html_fallback: bool,

    /// User agent for direct fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningPolicy {
    /// Weigh evidence, favour the core truth of the content
    Standard,
    /// Numeric claims must match within tolerance, ambiguity resolves to false
    Strict,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Token budget for a single chunk
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: usize,

    /// Concurrent claim extraction calls
    #[serde(default = "default_extraction_concurrency")]
    pub extraction_concurrency: usize,

    /// Concurrent source lookups
    #[serde(default = "default_discovery_concurrency")]
    pub discovery_concurrency: usize,

    /// Concurrent page retrievals
    #[serde(default = "default_evidence_concurrency")]
    pub evidence_concurrency: usize,

    /// Characters of retrieved content handed to the capability
    #[serde(default = "default_evidence_char_limit")]
    pub evidence_char_limit: usize,

    /// Verdict policy
    #[serde(default = "default_reasoning_policy")]
    pub reasoning_policy: ReasoningPolicy,

    /// Caller-level deadline for one verification in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempts of the whole extraction stage in monitored mode
    #[serde(default = "default_extraction_attempts")]
    pub extraction_attempts: u32,

    /// Fixed delay between extraction attempts in milliseconds
    #[serde(default = "default_extraction_delay")]
    pub extraction_delay_ms: u64,

    /// Attempts per fan-out task (malformed capability output)
    #[serde(default = "default_task_attempts")]
    pub task_attempts: u32,

    /// Delay between task attempts in milliseconds
    #[serde(default = "default_task_delay")]
    pub task_delay_ms: u64,

    /// Attempts of the reasoning call while the verdict is unknown
    #[serde(default = "default_reasoning_attempts")]
    pub reasoning_attempts: u32,

    /// Delay between reasoning attempts in milliseconds
    #[serde(default = "default_reasoning_delay")]
    pub reasoning_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_llm_provider() -> String { "openai".to_string() }
fn default_extraction_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f32 { 0.0 }
fn default_llm_timeout() -> u64 { 60 }
fn default_llm_retries() -> u32 { 3 }
fn default_search_provider() -> String { "tavily".to_string() }
fn default_search_endpoint() -> String { "https://api.tavily.com/search".to_string() }
fn default_search_depth() -> String { "advanced".to_string() }
fn default_max_results() -> usize { 3 }
fn default_search_timeout() -> u64 { 20 }
fn default_extract_endpoint() -> String { "https://api.tavily.com/extract".to_string() }
fn default_retrieval_timeout() -> u64 { 30 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}
fn default_max_tokens_per_chunk() -> usize { 15_000 }
fn default_extraction_concurrency() -> usize { 10 }
fn default_discovery_concurrency() -> usize { 10 }
fn default_evidence_concurrency() -> usize { 5 }
fn default_evidence_char_limit() -> usize { 15_000 }
fn default_reasoning_policy() -> ReasoningPolicy { ReasoningPolicy::Standard }
fn default_request_timeout() -> u64 { 300 }
fn default_extraction_attempts() -> u32 { 3 }
fn default_extraction_delay() -> u64 { 2_000 }
fn default_task_attempts() -> u32 { 2 }
fn default_task_delay() -> u64 { 250 }
fn default_reasoning_attempts() -> u32 { 2 }
fn default_reasoning_delay() -> u64 { 500 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "truthlens".to_string() }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__PIPELINE__MAX_TOKENS_PER_CHUNK=8000
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Caller-level deadline for one verification
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.request_timeout_secs)
    }

    /// Model used for the verdict call
    pub fn reasoning_model(&self) -> &str {
        self.llm
            .reasoning_model
            .as_deref()
            .unwrap_or(&self.llm.extraction_model)
    }

    /// API key for the extract endpoint (falls back to the search key)
    pub fn retrieval_api_key(&self) -> Option<&str> {
        self.retrieval
            .api_key
            .as_deref()
            .or(self.search.api_key.as_deref())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            extraction_model: default_extraction_model(),
            reasoning_model: None,
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            endpoint: default_search_endpoint(),
            search_depth: default_search_depth(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: default_extract_endpoint(),
            api_key: None,
            timeout_secs: default_retrieval_timeout(),
            html_fallback: default_enabled(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            extraction_concurrency: default_extraction_concurrency(),
            discovery_concurrency: default_discovery_concurrency(),
            evidence_concurrency: default_evidence_concurrency(),
            evidence_char_limit: default_evidence_char_limit(),
            reasoning_policy: default_reasoning_policy(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            extraction_attempts: default_extraction_attempts(),
            extraction_delay_ms: default_extraction_delay(),
            task_attempts: default_task_attempts(),
            task_delay_ms: default_task_delay(),
            reasoning_attempts: default_reasoning_attempts(),
            reasoning_delay_ms: default_reasoning_delay(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.max_tokens_per_chunk, 15_000);
        assert_eq!(config.pipeline.extraction_concurrency, 10);
        assert_eq!(config.pipeline.discovery_concurrency, 10);
        assert_eq!(config.pipeline.evidence_concurrency, 5);
        assert_eq!(config.pipeline.evidence_char_limit, 15_000);
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.retry.extraction_attempts, 3);
        assert_eq!(config.observability.service_name, "truthlens");
    }

    #[test]
    fn test_reasoning_model_fallback() {
        let mut config = AppConfig::default();
        assert_eq!(config.reasoning_model(), "gpt-4o-mini");

        config.llm.reasoning_model = Some("gpt-4o".to_string());
        assert_eq!(config.reasoning_model(), "gpt-4o");
    }

    #[test]
    fn test_retrieval_key_fallback() {
        let mut config = AppConfig::default();
        assert_eq!(config.retrieval_api_key(), None);

        config.search.api_key = Some("tvly-search".to_string());
        assert_eq!(config.retrieval_api_key(), Some("tvly-search"));

        config.retrieval.api_key = Some("tvly-extract".to_string());
        assert_eq!(config.retrieval_api_key(), Some("tvly-extract"));
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("pipeline.max_tokens_per_chunk", 2000)
            .and_then(|b| b.set_override("pipeline.reasoning_policy", "strict"))
            .and_then(|b| b.build())
            .and_then(|c| c.try_deserialize())
            .unwrap();

        assert_eq!(config.pipeline.max_tokens_per_chunk, 2000);
        assert_eq!(config.pipeline.reasoning_policy, ReasoningPolicy::Strict);
        assert_eq!(config.pipeline.evidence_concurrency, 5);
        assert_eq!(config.llm.provider, "openai");
    }
}
