//! SearxNG metasearch client.
//!
//! Talks to a self-hosted instance with the JSON output format enabled.

use crate::client::{finalize_results, WebResult, WebSearchClient};
use crate::config::SearchConfig;
use prosearch_core::{AppError, AppResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// SearxNG client.
pub struct SearxngClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl SearxngClient {
    pub fn new(config: &SearchConfig) -> AppResult<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            AppError::Config("SearxNG backend requires search.endpoint".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Search(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    fn parse(response: SearxngResponse, max_results: usize) -> Vec<WebResult> {
        let results = response
            .results
            .into_iter()
            .map(|r| WebResult {
                url: r.url,
                title: r.title,
                snippet: r.content,
            })
            .collect();

        finalize_results(results, max_results)
    }
}

#[async_trait::async_trait]
impl WebSearchClient for SearxngClient {
    fn name(&self) -> &str {
        "searxng"
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> AppResult<Vec<WebResult>> {
        let url = format!(
            "{}/search?q={}&format=json",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("SearxNG request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Search(format!(
                "SearxNG API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: SearxngResponse = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse SearxNG response: {}", e)))?;

        let results = Self::parse(parsed, self.max_results);
        tracing::debug!("SearxNG returned {} results", results.len());
        Ok(results)
    }
}
