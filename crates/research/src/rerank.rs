//! Relevance reranking.
//!
//! Each iteration's de-duplicated batch is scored against the question and
//! only the best `top_k` items reach the evidence pool. Scores always land
//! in [0, 1]; equal scores keep their batch order.

use crate::config::{HybridWeights, RerankStrategy};
use crate::model::ModelCaller;
use crate::state::EvidenceItem;
use prosearch_core::AppResult;
use prosearch_knowledge::tokenize;
use prosearch_prompt::RELEVANCE;
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Scores query/passage pairs in [0, 1].
#[async_trait::async_trait]
pub trait RelevanceModel: Send + Sync {
    fn name(&self) -> &str;

    /// One score per passage, in order. `None` marks a passage the model
    /// could not score.
    async fn score(&self, question: &str, passages: &[String]) -> AppResult<Vec<Option<f32>>>;
}

/// Offline relevance from term overlap.
///
/// Blends how many distinct question terms a passage covers with a
/// saturating count of how often they occur.
#[derive(Debug, Default, Clone)]
pub struct LexicalRelevance;

impl LexicalRelevance {
    const COVERAGE_WEIGHT: f32 = 0.7;
    const SATURATION: f32 = 2.0;

    fn score_one(terms: &HashSet<String>, passage: &str) -> f32 {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in tokenize(passage) {
            if terms.contains(&token) {
                *counts.entry(token).or_insert(0) += 1;
            }
        }

        let coverage = counts.len() as f32 / terms.len() as f32;
        let occurrences = counts.values().sum::<usize>() as f32;
        let frequency = occurrences / (occurrences + Self::SATURATION);

        (Self::COVERAGE_WEIGHT * coverage + (1.0 - Self::COVERAGE_WEIGHT) * frequency).clamp(0.0, 1.0)
    }
}

#[async_trait::async_trait]
impl RelevanceModel for LexicalRelevance {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, question: &str, passages: &[String]) -> AppResult<Vec<Option<f32>>> {
        let terms: HashSet<String> = tokenize(question).collect();
        if terms.is_empty() {
            return Ok(vec![None; passages.len()]);
        }

        Ok(passages
            .iter()
            .map(|p| Some(Self::score_one(&terms, p)))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct RelevanceOutput {
    #[serde(default)]
    scores: Vec<f32>,
}

/// Relevance from one batched `research.relevance` prompt (0-10 scale).
pub struct LlmRelevance {
    caller: ModelCaller,
}

impl LlmRelevance {
    /// Passages are cut to this many characters in the prompt.
    const MAX_PASSAGE_CHARS: usize = 1200;

    pub fn new(caller: ModelCaller) -> Self {
        Self { caller }
    }
}

#[async_trait::async_trait]
impl RelevanceModel for LlmRelevance {
    fn name(&self) -> &str {
        "llm"
    }

    async fn score(&self, question: &str, passages: &[String]) -> AppResult<Vec<Option<f32>>> {
        let numbered: Vec<serde_json::Value> = passages
            .iter()
            .enumerate()
            .map(|(i, text)| {
                json!({
                    "index": i + 1,
                    "text": text.chars().take(Self::MAX_PASSAGE_CHARS).collect::<String>(),
                })
            })
            .collect();

        let output: RelevanceOutput = self
            .caller
            .json(
                RELEVANCE,
                json!({
                    "question": question,
                    "passages": numbered,
                    "count": passages.len(),
                }),
            )
            .await?;

        if output.scores.len() != passages.len() {
            tracing::warn!(
                "Relevance model returned {} scores for {} passages",
                output.scores.len(),
                passages.len()
            );
        }

        Ok((0..passages.len())
            .map(|i| {
                output
                    .scores
                    .get(i)
                    .filter(|s| s.is_finite())
                    .map(|s| (s / 10.0).clamp(0.0, 1.0))
            })
            .collect())
    }
}

/// Min-max normalisation; a constant input maps to 0.5.
pub fn normalize(values: &[f32]) -> Vec<f32> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if !range.is_finite() || range <= f32::EPSILON {
        return vec![0.5; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// Second-stage ranking of a retrieval batch.
#[derive(Clone)]
pub struct Reranker {
    enabled: bool,
    strategy: RerankStrategy,
    weights: HybridWeights,
    top_k: usize,
    model: Arc<dyn RelevanceModel>,
}

impl Reranker {
    pub fn new(
        enabled: bool,
        strategy: RerankStrategy,
        weights: HybridWeights,
        top_k: usize,
        model: Arc<dyn RelevanceModel>,
    ) -> Self {
        Self {
            enabled,
            strategy,
            weights,
            top_k,
            model,
        }
    }

    /// Score, order and cut `batch` to the top `top_k` items.
    pub async fn rerank(&self, question: &str, mut batch: Vec<EvidenceItem>) -> Vec<EvidenceItem> {
        if batch.is_empty() {
            return batch;
        }

        if !self.enabled {
            batch.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score));
            batch.truncate(self.top_k);
            return batch;
        }

        let passages: Vec<String> = batch.iter().map(|item| item.text.clone()).collect();
        let mut model_scores = match self.model.score(question, &passages).await {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(
                    model = self.model.name(),
                    "Relevance scoring failed, ranking by similarity: {}",
                    e
                );
                Vec::new()
            }
        };
        model_scores.resize(batch.len(), None);

        let raw: Vec<f32> = batch.iter().map(|item| item.raw_score).collect();
        let scores = self.combine(&normalize(&raw), &model_scores);

        for (item, score) in batch.iter_mut().zip(scores) {
            item.rerank_score = Some(score);
        }

        // sort_by is stable, so ties keep batch order
        batch.sort_by(|a, b| {
            b.rerank_score
                .unwrap_or_default()
                .total_cmp(&a.rerank_score.unwrap_or_default())
        });
        batch.truncate(self.top_k);

        tracing::debug!(
            strategy = ?self.strategy,
            model = self.model.name(),
            "Kept {} reranked items",
            batch.len()
        );
        batch
    }

    /// Final scores in [0, 1]. Items without a model score fall back to
    /// their normalised raw score.
    fn combine(&self, normalized_raw: &[f32], model_scores: &[Option<f32>]) -> Vec<f32> {
        match self.strategy {
            RerankStrategy::Pure => normalized_raw
                .iter()
                .zip(model_scores)
                .map(|(raw, model)| model.unwrap_or(*raw).clamp(0.0, 1.0))
                .collect(),
            RerankStrategy::Hybrid => {
                let defined: Vec<f32> = model_scores.iter().flatten().copied().collect();
                let mut normalized_model = normalize(&defined).into_iter();
                let total = self.weights.similarity + self.weights.model;

                normalized_raw
                    .iter()
                    .zip(model_scores)
                    .map(|(raw, model)| match model {
                        Some(_) => {
                            let m = normalized_model.next().unwrap_or(0.5);
                            ((self.weights.similarity * raw + self.weights.model * m) / total)
                                .clamp(0.0, 1.0)
                        }
                        None => *raw,
                    })
                    .collect()
            }
        }
    }
}
