//! Query generation.
//!
//! The generator proposes search queries; [`plan_queries`] cleans them,
//! drops anything already issued this session and falls back to the raw
//! question so a failing model never blocks the loop.

use crate::model::ModelCaller;
use crate::state::{query_key, ResearchState};
use prosearch_core::AppResult;
use prosearch_prompt::QUERY_WRITER;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

/// Queries requested after the first loop.
pub const FOLLOW_UP_QUERY_COUNT: usize = 3;

/// Input to one generation call.
#[derive(Debug, Clone)]
pub struct QueryRequest<'a> {
    pub topic: &'a str,
    pub count: usize,
    pub issued: &'a [String],
    pub knowledge_gap: Option<&'a str>,
}

/// Proposes search queries for a topic.
#[async_trait::async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, request: &QueryRequest<'_>) -> AppResult<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct QueryOutput {
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    query: Vec<String>,
}

/// Query generator backed by the `research.query_writer` prompt.
pub struct LlmQueryGenerator {
    caller: ModelCaller,
}

impl LlmQueryGenerator {
    pub fn new(caller: ModelCaller) -> Self {
        Self { caller }
    }
}

#[async_trait::async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(&self, request: &QueryRequest<'_>) -> AppResult<Vec<String>> {
        let output: QueryOutput = self
            .caller
            .json(
                QUERY_WRITER,
                json!({
                    "research_topic": request.topic,
                    "number_queries": request.count,
                    "issued_queries": request.issued,
                    "knowledge_gap": request.knowledge_gap,
                }),
            )
            .await?;

        tracing::debug!(rationale = %output.rationale, "Generated {} queries", output.query.len());
        Ok(output.query)
    }
}

/// Number of queries to request for the current loop.
pub fn query_budget(state: &ResearchState) -> usize {
    if state.loop_count == 0 {
        state.initial_query_count.clamp(2, 5)
    } else {
        FOLLOW_UP_QUERY_COUNT
    }
}

/// Trim, drop empties and anything already issued, de-duplicate, cap.
pub fn select_queries(candidates: Vec<String>, state: &ResearchState, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .filter(|q| !state.was_issued(q))
        .filter(|q| seen.insert(query_key(q)))
        .take(limit)
        .collect()
}

/// Ask the generator for queries and apply the session rules.
///
/// Never empty: with no usable query the raw question is returned.
pub async fn plan_queries(
    generator: &dyn QueryGenerator,
    state: &ResearchState,
    topic: &str,
) -> Vec<String> {
    let count = query_budget(state);
    let request = QueryRequest {
        topic,
        count,
        issued: &state.issued_queries,
        knowledge_gap: state.knowledge_gap.as_deref(),
    };

    let candidates = match generator.generate(&request).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::warn!("Query generation failed, using the question: {}", e);
            Vec::new()
        }
    };

    let queries = select_queries(candidates, state, count);
    if queries.is_empty() {
        tracing::info!("No usable generated queries; falling back to the question");
        return vec![state.question().to_string()];
    }
    queries
}
