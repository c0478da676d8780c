//! Search client factory.

use crate::client::WebSearchClient;
use crate::config::{SearchBackend, SearchConfig};
use crate::duckduckgo::DuckDuckGoClient;
use crate::searxng::SearxngClient;
use prosearch_core::AppResult;
use std::sync::Arc;

/// Create the configured web search client.
pub fn create_search_client(config: &SearchConfig) -> AppResult<Arc<dyn WebSearchClient>> {
    let backend = SearchBackend::parse(&config.backend)?;
    tracing::debug!(backend = backend.as_str(), "Creating web search client");

    match backend {
        SearchBackend::DuckDuckGo => Ok(Arc::new(DuckDuckGoClient::new(config)?)),
        SearchBackend::Searxng => Ok(Arc::new(SearxngClient::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_default_client() {
        let client = create_search_client(&SearchConfig::default()).unwrap();
        assert_eq!(client.name(), "duckduckgo");
    }

    #[test]
    fn test_create_searxng_client() {
        let config = SearchConfig {
            backend: "searxng".to_string(),
            endpoint: Some("http://localhost:8888/".to_string()),
            ..Default::default()
        };
        assert_eq!(create_search_client(&config).unwrap().name(), "searxng");
    }

    #[test]
    fn test_unknown_backend() {
        let config = SearchConfig {
            backend: "altavista".to_string(),
            ..Default::default()
        };
        assert!(create_search_client(&config).is_err());
    }
}
