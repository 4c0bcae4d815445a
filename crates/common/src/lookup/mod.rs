//! Relevance-ranked source lookup
//!
//! Given a claim, return the URLs of the top results for it.

use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use crate::metrics::record_collaborator_call;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for source lookup
#[async_trait]
pub trait SourceLookup: Send + Sync {
    /// Return up to `max_results` URLs ranked by relevance to `query`
    async fn lookup(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
}

/// Tavily search client
pub struct TavilySearchClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    search_depth: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_domains: [&'a str; 0],
    exclude_domains: [&'a str; 0],
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    url: String,
}

impl TavilySearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "search.api_key is required for the tavily provider".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key,
            endpoint: config.endpoint.clone(),
            search_depth: config.search_depth.clone(),
        })
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: &self.search_depth,
            max_results,
            include_domains: [],
            exclude_domains: [],
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Lookup {
                message: format!("API error {}: {}", status, body),
            });
        }

        let data: SearchResponse = response.json().await.map_err(|e| AppError::Lookup {
            message: format!("Failed to parse response: {}", e),
        })?;

        Ok(data
            .results
            .into_iter()
            .map(|r| r.url)
            .take(max_results)
            .collect())
    }
}

#[async_trait]
impl SourceLookup for TavilySearchClient {
    async fn lookup(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let start = Instant::now();
        let result = self.search(query, max_results).await;
        record_collaborator_call("lookup", start.elapsed().as_secs_f64(), result.is_ok());
        result
    }
}

/// Create a source lookup based on configuration
pub fn create_lookup(config: &SearchConfig) -> Result<Arc<dyn SourceLookup>> {
    match config.provider.as_str() {
        "tavily" => Ok(Arc::new(TavilySearchClient::new(config)?)),
        other => Err(AppError::Configuration {
            message: format!("Unknown search provider: {}", other),
        }),
    }
}
