//! Search client configuration.

use prosearch_core::config::SearchSettings;
use prosearch_core::{AppError, AppResult};

/// Hard cap on results per query.
pub const MAX_RESULTS_LIMIT: usize = 10;

/// Supported search backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    DuckDuckGo,
    Searxng,
}

impl SearchBackend {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "searxng" | "searx" => Ok(Self::Searxng),
            _ => Err(AppError::Config(format!(
                "Unknown search backend: '{}'. Supported backends: duckduckgo, searxng",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Searxng => "searxng",
        }
    }
}

/// Resolved settings for one search client.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub backend: String,
    pub endpoint: Option<String>,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from(&SearchSettings::default())
    }
}

impl From<&SearchSettings> for SearchConfig {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            backend: settings.backend.clone(),
            endpoint: settings.endpoint.clone(),
            max_results: settings.max_results.clamp(1, MAX_RESULTS_LIMIT),
            timeout_secs: settings.timeout_secs.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!(SearchBackend::parse("DuckDuckGo").unwrap(), SearchBackend::DuckDuckGo);
        assert_eq!(SearchBackend::parse("searxng").unwrap(), SearchBackend::Searxng);
        assert!(SearchBackend::parse("bing").is_err());
    }

    #[test]
    fn test_max_results_capped() {
        let settings = SearchSettings {
            max_results: 50,
            ..Default::default()
        };
        assert_eq!(SearchConfig::from(&settings).max_results, MAX_RESULTS_LIMIT);

        let defaults = SearchConfig::default();
        assert_eq!(defaults.max_results, 5);
        assert_eq!(defaults.backend, "duckduckgo");
    }
}
