//! Reflection: is the accumulated evidence enough?
//!
//! Sufficiency is a model judgment behind [`ReflectionEngine`], so tests can
//! swap in a deterministic double. [`assess`] wraps any engine with the
//! session rules: follow-ups never repeat an issued query, and a failed or
//! skipped reflection counts as insufficient.

use crate::model::ModelCaller;
use crate::query::select_queries;
use crate::state::{EvidenceItem, ResearchState};
use prosearch_core::AppResult;
use prosearch_prompt::REFLECTION;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Gap recorded when nothing better is known.
pub const INSUFFICIENT_EVIDENCE_GAP: &str = "Insufficient evidence retrieved to answer the question.";

/// Follow-up queries kept per reflection.
pub const MAX_FOLLOW_UPS: usize = 5;

/// Verdict on the evidence pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(default)]
    pub is_sufficient: bool,
    #[serde(default)]
    pub knowledge_gap: Option<String>,
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

impl Reflection {
    pub fn sufficient() -> Self {
        Self {
            is_sufficient: true,
            knowledge_gap: None,
            follow_up_queries: Vec::new(),
        }
    }

    pub fn insufficient(gap: impl Into<String>) -> Self {
        Self {
            is_sufficient: false,
            knowledge_gap: Some(gap.into()),
            follow_up_queries: Vec::new(),
        }
    }
}

/// Judges whether evidence answers the topic.
#[async_trait::async_trait]
pub trait ReflectionEngine: Send + Sync {
    async fn reflect(&self, topic: &str, evidence: &[EvidenceItem]) -> AppResult<Reflection>;
}

/// Reflection backed by the `research.reflection` prompt.
pub struct LlmReflection {
    caller: ModelCaller,
}

impl LlmReflection {
    const MAX_EVIDENCE_CHARS: usize = 800;

    pub fn new(caller: ModelCaller) -> Self {
        Self { caller }
    }
}

#[async_trait::async_trait]
impl ReflectionEngine for LlmReflection {
    async fn reflect(&self, topic: &str, evidence: &[EvidenceItem]) -> AppResult<Reflection> {
        let evidence: Vec<serde_json::Value> = evidence
            .iter()
            .enumerate()
            .map(|(i, item)| {
                json!({
                    "index": i + 1,
                    "source": item.source_label,
                    "text": item.text.chars().take(Self::MAX_EVIDENCE_CHARS).collect::<String>(),
                })
            })
            .collect();

        let mut reflection: Reflection = self
            .caller
            .json(
                REFLECTION,
                json!({
                    "research_topic": topic,
                    "evidence": evidence,
                }),
            )
            .await?;

        // Models answer "" for "no gap"
        reflection.knowledge_gap = reflection
            .knowledge_gap
            .map(|gap| gap.trim().to_string())
            .filter(|gap| !gap.is_empty());
        Ok(reflection)
    }
}

/// Reflect on the pool and apply the session rules.
///
/// `retrieval_failed` marks an iteration in which every retrieval call
/// failed; like an empty pool, it is insufficient without asking the model.
pub async fn assess(
    engine: &dyn ReflectionEngine,
    state: &ResearchState,
    topic: &str,
    retrieval_failed: bool,
) -> Reflection {
    let fallback_gap = || {
        state
            .knowledge_gap
            .clone()
            .unwrap_or_else(|| INSUFFICIENT_EVIDENCE_GAP.to_string())
    };

    if state.evidence_pool.is_empty() || retrieval_failed {
        tracing::info!(
            pool = state.evidence_pool.len(),
            retrieval_failed,
            "Skipping reflection: no usable evidence"
        );
        return Reflection::insufficient(fallback_gap());
    }

    let reflection = match engine.reflect(topic, &state.evidence_pool).await {
        Ok(reflection) => reflection,
        Err(e) => {
            tracing::warn!("Reflection failed, treating evidence as insufficient: {}", e);
            return Reflection::insufficient(fallback_gap());
        }
    };

    if reflection.is_sufficient {
        return Reflection::sufficient();
    }

    Reflection {
        is_sufficient: false,
        knowledge_gap: Some(reflection.knowledge_gap.unwrap_or_else(fallback_gap)),
        follow_up_queries: select_queries(reflection.follow_up_queries, state, MAX_FOLLOW_UPS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::state::{Message, SourceType};
    use prosearch_core::AppError;

    struct Scripted(Reflection);

    #[async_trait::async_trait]
    impl ReflectionEngine for Scripted {
        async fn reflect(&self, _t: &str, _e: &[EvidenceItem]) -> AppResult<Reflection> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl ReflectionEngine for Failing {
        async fn reflect(&self, _t: &str, _e: &[EvidenceItem]) -> AppResult<Reflection> {
            Err(AppError::Llm("bad json".to_string()))
        }
    }

    fn state_with_evidence() -> ResearchState {
        let mut state =
            ResearchState::new(vec![Message::user("q")], &ResearchConfig::default()).unwrap();
        state.admit(vec![EvidenceItem {
            source_type: SourceType::Web,
            id: "https://a".to_string(),
            text: "evidence".to_string(),
            raw_score: 1.0,
            rerank_score: None,
            source_label: "A".to_string(),
            citation_ref: None,
        }]);
        state
    }

    #[tokio::test]
    async fn test_empty_pool_skips_model() {
        let state =
            ResearchState::new(vec![Message::user("q")], &ResearchConfig::default()).unwrap();
        let reflection = assess(&Scripted(Reflection::sufficient()), &state, "q", false).await;
        assert!(!reflection.is_sufficient);
        assert_eq!(reflection.knowledge_gap.as_deref(), Some(INSUFFICIENT_EVIDENCE_GAP));
    }

    #[tokio::test]
    async fn test_total_retrieval_failure_is_insufficient() {
        let state = state_with_evidence();
        let reflection = assess(&Scripted(Reflection::sufficient()), &state, "q", true).await;
        assert!(!reflection.is_sufficient);
    }

    #[tokio::test]
    async fn test_failure_reuses_previous_gap() {
        let mut state = state_with_evidence();
        state.record_reflection(false, Some("need 2024 numbers".to_string()));
        let reflection = assess(&Failing, &state, "q", false).await;
        assert!(!reflection.is_sufficient);
        assert_eq!(reflection.knowledge_gap.as_deref(), Some("need 2024 numbers"));
    }

    #[tokio::test]
    async fn test_follow_ups_filtered_against_history() {
        let mut state = state_with_evidence();
        state.dispatch(vec!["solar 2024".to_string()]);

        let scripted = Scripted(Reflection {
            is_sufficient: false,
            knowledge_gap: Some("wind data".to_string()),
            follow_up_queries: vec![
                "Solar 2024".to_string(),
                "wind 2024".to_string(),
                "WIND 2024".to_string(),
                "".to_string(),
            ],
        });

        let reflection = assess(&scripted, &state, "q", false).await;
        assert_eq!(reflection.follow_up_queries, vec!["wind 2024"]);
        assert_eq!(reflection.knowledge_gap.as_deref(), Some("wind data"));
    }

    #[tokio::test]
    async fn test_sufficient_clears_follow_ups() {
        let state = state_with_evidence();
        let scripted = Scripted(Reflection {
            is_sufficient: true,
            knowledge_gap: Some("".to_string()),
            follow_up_queries: vec!["more".to_string()],
        });
        assert_eq!(assess(&scripted, &state, "q", false).await, Reflection::sufficient());
    }

    #[test]
    fn test_reflection_parses_model_output() {
        let reflection: Reflection = prosearch_llm::parse_json(
            r#"```json
{"is_sufficient": false, "knowledge_gap": "No 2024 figures", "follow_up_queries": ["IEA renewables 2024"]}
```"#,
        )
        .unwrap();
        assert!(!reflection.is_sufficient);
        assert_eq!(reflection.follow_up_queries.len(), 1);
    }
}
