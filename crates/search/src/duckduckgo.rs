//! DuckDuckGo instant-answer search.
//!
//! Uses `https://api.duckduckgo.com/?format=json`, which needs no API key.
//! Results come from the abstract, the `Results` array and the (possibly
//! nested) `RelatedTopics`.

use crate::client::{finalize_results, WebResult, WebSearchClient};
use crate::config::SearchConfig;
use prosearch_core::{AppError, AppResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "FirstURL")]
    first_url: String,
    /// Present on category groups instead of `Text`/`FirstURL`
    #[serde(default)]
    topics: Vec<Topic>,
}

/// DuckDuckGo instant-answer client.
pub struct DuckDuckGoClient {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl DuckDuckGoClient {
    pub fn new(config: &SearchConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("prosearch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Search(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config
                .endpoint
                .as_deref()
                .unwrap_or(DEFAULT_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            max_results: config.max_results,
        })
    }

    fn parse(answer: InstantAnswer, max_results: usize) -> Vec<WebResult> {
        let mut results = Vec::new();

        if !answer.abstract_text.is_empty() {
            results.push(WebResult {
                url: answer.abstract_url,
                title: answer.heading,
                snippet: answer.abstract_text,
            });
        }

        for topic in answer.results {
            push_topic(topic, &mut results);
        }
        for topic in answer.related_topics {
            push_topic(topic, &mut results);
        }

        finalize_results(results, max_results)
    }
}

fn push_topic(topic: Topic, results: &mut Vec<WebResult>) {
    if !topic.topics.is_empty() {
        for nested in topic.topics {
            push_topic(nested, results);
        }
        return;
    }

    if topic.text.is_empty() {
        return;
    }

    // Topic text reads "Title - description"
    let title = topic
        .text
        .split(" - ")
        .next()
        .unwrap_or(&topic.text)
        .to_string();

    results.push(WebResult {
        url: topic.first_url,
        title,
        snippet: topic.text,
    });
}

#[async_trait::async_trait]
impl WebSearchClient for DuckDuckGoClient {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> AppResult<Vec<WebResult>> {
        let url = format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("DuckDuckGo request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Search(format!(
                "DuckDuckGo API error ({}): {}",
                status, error_text
            )));
        }

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| AppError::Search(format!("Failed to parse DuckDuckGo response: {}", e)))?;

        let results = Self::parse(answer, self.max_results);
        tracing::debug!("DuckDuckGo returned {} results", results.len());
        Ok(results)
    }
}
