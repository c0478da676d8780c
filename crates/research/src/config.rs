//! Research session configuration.
//!
//! A [`ResearchConfig`] is built once per session from the workspace
//! settings and CLI flags, validated, and then never changes.

use prosearch_core::config::ResearchSettings;
use prosearch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Effort tier, trading answer depth for latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    #[default]
    Medium,
    High,
}

impl Effort {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(AppError::Config(format!(
                "Unknown effort '{}'. Expected low, medium or high",
                s
            ))),
        }
    }

    /// `(initial_query_count, max_loops)` for this tier.
    pub fn budget(&self) -> (usize, u32) {
        match self {
            Self::Low => (2, 1),
            Self::Medium => (3, 3),
            Self::High => (5, 10),
        }
    }
}

/// How reranked scores are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankStrategy {
    /// The relevance model's score alone
    Pure,
    /// Weighted blend of normalised raw score and model score
    #[default]
    Hybrid,
}

impl RerankStrategy {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "pure" => Ok(Self::Pure),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(AppError::Config(format!(
                "Unknown reranking strategy '{}'. Expected pure or hybrid",
                s
            ))),
        }
    }
}

/// Which relevance model scores query/passage pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceModelKind {
    /// Offline term-overlap scorer
    #[default]
    Lexical,
    /// One batched LLM call per rerank
    Llm,
}

impl RelevanceModelKind {
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "lexical" => Ok(Self::Lexical),
            "llm" => Ok(Self::Llm),
            _ => Err(AppError::Config(format!(
                "Unknown reranking model '{}'. Expected lexical or llm",
                s
            ))),
        }
    }
}

/// Weights of the hybrid score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub similarity: f32,
    pub model: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            similarity: 0.3,
            model: 0.7,
        }
    }
}

/// Immutable configuration of one research session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Model used for every LLM-driven step
    pub model: String,
    pub initial_query_count: usize,
    pub max_loops: u32,
    pub reranking_enabled: bool,
    pub reranking_strategy: RerankStrategy,
    pub relevance_model: RelevanceModelKind,
    pub reranking_top_k: usize,
    pub vector_top_k: usize,
    pub vector_score_threshold: f32,
    pub hybrid_weights: HybridWeights,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        let (initial_query_count, max_loops) = Effort::default().budget();
        Self {
            model: "llama3.2".to_string(),
            initial_query_count,
            max_loops,
            reranking_enabled: true,
            reranking_strategy: RerankStrategy::default(),
            relevance_model: RelevanceModelKind::default(),
            reranking_top_k: 5,
            vector_top_k: 10,
            vector_score_threshold: 0.3,
            hybrid_weights: HybridWeights::default(),
        }
    }
}

impl ResearchConfig {
    /// Resolve settings from config.yaml. Explicit counts override the tier.
    pub fn from_settings(settings: &ResearchSettings, model: impl Into<String>) -> AppResult<Self> {
        let effort = match settings.effort.as_deref() {
            Some(effort) => Effort::parse(effort)?,
            None => Effort::default(),
        };
        let (tier_queries, tier_loops) = effort.budget();
        let defaults = Self::default();

        let reranking_strategy = match settings.reranking_strategy.as_deref() {
            Some(s) => RerankStrategy::parse(s)?,
            None => defaults.reranking_strategy,
        };
        let relevance_model = match settings.reranking_model.as_deref() {
            Some(s) => RelevanceModelKind::parse(s)?,
            None => defaults.relevance_model,
        };

        Ok(Self {
            model: model.into(),
            initial_query_count: settings.initial_query_count.unwrap_or(tier_queries),
            max_loops: settings.max_loops.unwrap_or(tier_loops),
            reranking_enabled: settings.reranking_enabled.unwrap_or(defaults.reranking_enabled),
            reranking_strategy,
            relevance_model,
            reranking_top_k: settings.reranking_top_k.unwrap_or(defaults.reranking_top_k),
            vector_top_k: settings.vector_top_k.unwrap_or(defaults.vector_top_k),
            vector_score_threshold: settings
                .vector_score_threshold
                .unwrap_or(defaults.vector_score_threshold),
            hybrid_weights: settings
                .hybrid_weights
                .map(|w| HybridWeights {
                    similarity: w.similarity,
                    model: w.model,
                })
                .unwrap_or(defaults.hybrid_weights),
        })
    }

    /// Apply an effort tier, replacing both query count and loop budget.
    pub fn with_effort(mut self, effort: Effort) -> Self {
        let (queries, loops) = effort.budget();
        self.initial_query_count = queries;
        self.max_loops = loops;
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.model.trim().is_empty() {
            return Err(AppError::Config("Research model must not be empty".to_string()));
        }
        if self.max_loops == 0 {
            return Err(AppError::Config("maxLoops must be at least 1".to_string()));
        }
        if !(1..=5).contains(&self.initial_query_count) {
            return Err(AppError::Config(format!(
                "initialQueryCount must be between 1 and 5, got {}",
                self.initial_query_count
            )));
        }
        if self.reranking_top_k == 0 {
            return Err(AppError::Config("rerankingTopK must be at least 1".to_string()));
        }
        if self.vector_top_k == 0 {
            return Err(AppError::Config("vectorTopK must be at least 1".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.vector_score_threshold) {
            return Err(AppError::Config(format!(
                "vectorScoreThreshold must be within [-1, 1], got {}",
                self.vector_score_threshold
            )));
        }

        let weights = self.hybrid_weights;
        if weights.similarity < 0.0 || weights.model < 0.0 || weights.similarity + weights.model <= 0.0 {
            return Err(AppError::Config(format!(
                "Hybrid weights must be non-negative with a positive sum, got {} / {}",
                weights.similarity, weights.model
            )));
        }

        Ok(())
    }
}
