//! Web search client trait.

use prosearch_core::AppResult;
use serde::{Deserialize, Serialize};

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    /// Result URL, also its de-duplication key
    pub url: String,

    /// Page or site title
    pub title: String,

    /// Text snippet shown by the engine
    pub snippet: String,
}

/// Trait for web search backends.
#[async_trait::async_trait]
pub trait WebSearchClient: Send + Sync {
    /// Backend name for logs ("duckduckgo", "searxng").
    fn name(&self) -> &str;

    /// Search for `query`.
    ///
    /// Results are ranked best-first, carry a non-empty URL, and are capped
    /// at the configured maximum.
    async fn search(&self, query: &str) -> AppResult<Vec<WebResult>>;
}

/// Drop empty URLs and repeated URLs, then cap at `max_results`.
pub(crate) fn finalize_results(results: Vec<WebResult>, max_results: usize) -> Vec<WebResult> {
    let mut seen = std::collections::HashSet::new();
    results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .filter(|r| seen.insert(r.url.clone()))
        .take(max_results)
        .collect()
}
