//! Configuration management for prosearch.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config files (.prosearch/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with most state stored in `.prosearch/`.
//! Only the CLI edge reads the environment; library crates receive plain values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .prosearch/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Default LLM provider ("ollama" or "openai")
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Web search settings
    pub search: SearchSettings,

    /// Knowledge base settings
    pub knowledge: KnowledgeSettings,

    /// Research loop settings
    pub research: ResearchSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

/// Web search backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSettings {
    /// Backend name: "duckduckgo" or "searxng"
    pub backend: String,

    /// Base URL of a self-hosted backend (required for searxng)
    pub endpoint: Option<String>,

    /// Maximum results per query
    pub max_results: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backend: "duckduckgo".to_string(),
            endpoint: None,
            max_results: 5,
            timeout_secs: 10,
        }
    }
}

/// Knowledge base and embedding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeSettings {
    /// Knowledge base queried when `ask` is not given one
    pub default_base: Option<String>,

    /// Embedding provider: "hashing" or "ollama"
    pub embedding_provider: String,

    /// Embedding model identifier
    pub embedding_model: String,

    /// Embedding dimensions
    pub dimensions: usize,

    /// Target chunk size in characters for ingestion
    pub chunk_size: usize,

    /// Ollama endpoint for embeddings
    pub ollama_endpoint: Option<String>,

    /// Remote Pinecone index (replaces the local SQLite index when set)
    pub pinecone: Option<PineconeSettings>,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            default_base: None,
            embedding_provider: "hashing".to_string(),
            embedding_model: "hashing-v1".to_string(),
            dimensions: 384,
            chunk_size: 1000,
            ollama_endpoint: None,
            pinecone: None,
        }
    }
}

/// Pinecone index connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PineconeSettings {
    /// Index host, e.g. "my-index-abc123.svc.us-east-1.pinecone.io"
    pub host: String,

    /// Environment variable holding the API key
    #[serde(default = "default_pinecone_key_env")]
    pub api_key_env: String,

    /// Optional namespace
    pub namespace: Option<String>,
}

fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

/// Research loop settings as written in config.yaml.
///
/// Every field is optional; the research crate fills the gaps from the
/// effort tier and its own defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResearchSettings {
    /// Effort tier: "low", "medium", "high"
    pub effort: Option<String>,
    pub initial_query_count: Option<usize>,
    pub max_loops: Option<u32>,
    pub reranking_enabled: Option<bool>,
    /// "pure" or "hybrid"
    pub reranking_strategy: Option<String>,
    /// "lexical" or "llm"
    pub reranking_model: Option<String>,
    pub reranking_top_k: Option<usize>,
    pub vector_top_k: Option<usize>,
    pub vector_score_threshold: Option<f32>,
    pub hybrid_weights: Option<HybridWeightSettings>,
}

/// Hybrid reranking weights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridWeightSettings {
    pub similarity: f32,
    pub model: f32,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    search: Option<SearchSettings>,
    knowledge: Option<KnowledgeSettings>,
    research: Option<ResearchSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            search: SearchSettings::default(),
            knowledge: KnowledgeSettings::default(),
            research: ResearchSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.yaml and environment variables.
    ///
    /// Environment variables:
    /// - `PROSEARCH_WORKSPACE`: Override workspace path
    /// - `PROSEARCH_CONFIG`: Path to config file
    /// - `PROSEARCH_PROVIDER`: LLM provider
    /// - `PROSEARCH_MODEL`: Model identifier
    /// - `PROSEARCH_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use prosearch_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("PROSEARCH_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("PROSEARCH_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.workspace.join(".prosearch/config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("PROSEARCH_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("PROSEARCH_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("PROSEARCH_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = match provider_config {
                    ProviderConfig::OpenAI { model, .. } => model.clone(),
                    ProviderConfig::Ollama { model, .. } => model.clone(),
                };
            }

            result.llm = Some(llm);
        }

        if let Some(search) = config_file.search {
            result.search = search;
        }

        if let Some(knowledge) = config_file.knowledge {
            result.knowledge = knowledge;
        }

        if let Some(research) = config_file.research {
            result.research = research;
        }

        tracing::debug!("Merged configuration from {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and YAML.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .prosearch directory.
    pub fn prosearch_dir(&self) -> PathBuf {
        self.workspace.join(".prosearch")
    }

    /// Ensure the .prosearch directory exists.
    pub fn ensure_prosearch_dir(&self) -> AppResult<()> {
        let dir = self.prosearch_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .prosearch directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get a provider configuration by name.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Resolve the endpoint configured for a provider, if any.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        match self.get_provider_config(provider)? {
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint),
            ProviderConfig::OpenAI { endpoint, .. } => endpoint,
        }
    }

    /// Resolve API key from `PROSEARCH_API_KEY` or the provider's `apiKeyEnv`.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider)? {
            ProviderConfig::OpenAI { api_key_env, .. } => std::env::var(&api_key_env).ok(),
            ProviderConfig::Ollama { .. } => None,
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let known_providers = ["openai", "ollama"];

        if !known_providers.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                known_providers.join(", ")
            )));
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) =
            self.get_provider_config(&self.provider)
        {
            if self.api_key.is_none() && std::env::var(&api_key_env).is_err() {
                return Err(AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    api_key_env
                )));
            }
        }

        if self.search.backend == "searxng" && self.search.endpoint.is_none() {
            return Err(AppError::Config(
                "search.endpoint is required for the searxng backend".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.search.backend, "duckduckgo");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.knowledge.embedding_provider, "hashing");
        assert!(config.research.max_loops.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn test_prosearch_dir() {
        let config = AppConfig::default();
        assert!(config.prosearch_dir().ends_with(".prosearch"));
    }

    #[test]
    fn test_with_overrides() {
        let overridden = AppConfig::default().with_overrides(
            None,
            None,
            Some("openai".to_string()),
            Some("gpt-4o-mini".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.model, "gpt-4o-mini");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
llm:
  activeProvider: ollama
  providers:
    ollama:
      endpoint: http://localhost:11434
      model: qwen2.5:7b
search:
  backend: searxng
  endpoint: http://localhost:8888
  maxResults: 8
research:
  effort: high
  rerankingStrategy: pure
  vectorScoreThreshold: 0.25
logging:
  level: debug
  color: false
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.model, "qwen2.5:7b");
        assert_eq!(merged.search.backend, "searxng");
        assert_eq!(merged.search.max_results, 8);
        assert_eq!(merged.search.timeout_secs, 10);
        assert_eq!(merged.research.effort.as_deref(), Some("high"));
        assert_eq!(merged.research.reranking_strategy.as_deref(), Some("pure"));
        assert_eq!(merged.research.vector_score_threshold, Some(0.25));
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
        assert!(merged.no_color);
        assert_eq!(
            merged.resolve_endpoint("ollama").as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_merge_yaml_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "research: [unclosed").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_searxng_requires_endpoint() {
        let mut config = AppConfig::default();
        config.search.backend = "searxng".to_string();
        assert!(config.validate().is_err());

        config.search.endpoint = Some("http://localhost:8888".to_string());
        assert!(config.validate().is_ok());
    }
}
