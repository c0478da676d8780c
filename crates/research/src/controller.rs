//! Loop controller.
//!
//! Drives one session through
//! `GENERATING -> RETRIEVING -> REFLECTING -> (RETRIEVING | FINALIZING)`.
//! The controller owns the [`ResearchState`]; only the retrieval fan-out
//! runs concurrently, and its results are merged here after it resolves.
//! The loop budget guarantees termination whatever reflection decides.

use crate::config::{RelevanceModelKind, ResearchConfig};
use crate::events::{EventSink, ResearchEvent, Termination};
use crate::model::ModelCaller;
use crate::query::{plan_queries, LlmQueryGenerator, QueryGenerator};
use crate::reflection::{assess, LlmReflection, ReflectionEngine};
use crate::rerank::{LexicalRelevance, LlmRelevance, RelevanceModel, Reranker};
use crate::retrieval::{dedupe, Retriever};
use crate::state::{EvidenceItem, Message, Phase, ResearchState};
use crate::synthesis::{synthesize, AnswerSynthesizer, Citation, LlmAnswerSynthesizer};
use crate::topic::research_topic;
use prosearch_core::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Result of a research session, handed to the conversation store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub session_id: Uuid,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub termination: Termination,
    pub loop_count: u32,
    /// Every query issued, in order
    pub queries: Vec<String>,
    /// The full evidence pool in accumulation order
    pub evidence: Vec<EvidenceItem>,
    pub knowledge_gap: Option<String>,
}

/// The research agent: one configured pipeline, reusable across sessions.
pub struct ResearchAgent {
    config: ResearchConfig,
    query_generator: Arc<dyn QueryGenerator>,
    retriever: Retriever,
    reranker: Reranker,
    reflection: Arc<dyn ReflectionEngine>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
}

impl ResearchAgent {
    pub fn new(
        config: ResearchConfig,
        query_generator: Arc<dyn QueryGenerator>,
        retriever: Retriever,
        reranker: Reranker,
        reflection: Arc<dyn ReflectionEngine>,
        synthesizer: Arc<dyn AnswerSynthesizer>,
    ) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            query_generator,
            retriever,
            reranker,
            reflection,
            synthesizer,
        })
    }

    /// Agent whose generation, reflection, synthesis (and optionally
    /// relevance) steps all run on one model.
    pub fn with_llm(config: ResearchConfig, caller: ModelCaller, retriever: Retriever) -> AppResult<Self> {
        let relevance: Arc<dyn RelevanceModel> = match config.relevance_model {
            RelevanceModelKind::Lexical => Arc::new(LexicalRelevance),
            RelevanceModelKind::Llm => {
                Arc::new(LlmRelevance::new(caller.clone().with_temperature(0.0)))
            }
        };

        let reranker = Reranker::new(
            config.reranking_enabled,
            config.reranking_strategy,
            config.hybrid_weights,
            config.reranking_top_k,
            relevance,
        );

        Self::new(
            config,
            Arc::new(LlmQueryGenerator::new(caller.clone().with_temperature(0.7))),
            retriever,
            reranker,
            Arc::new(LlmReflection::new(caller.clone().with_temperature(0.0))),
            Arc::new(LlmAnswerSynthesizer::new(caller.with_temperature(0.3))),
        )
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Research the last user message of `conversation` and answer it.
    ///
    /// Cancelling `cancel` stops the loop at the next phase boundary; the
    /// answer is still written from the evidence gathered so far. Only a
    /// synthesis failure is returned as an error.
    pub async fn run(
        &self,
        conversation: Vec<Message>,
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> AppResult<ResearchOutcome> {
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("research", session = %session_id);
        self.run_session(session_id, conversation, cancel, events)
            .instrument(span)
            .await
    }

    async fn run_session(
        &self,
        session_id: Uuid,
        conversation: Vec<Message>,
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> AppResult<ResearchOutcome> {
        let mut state = ResearchState::new(conversation, &self.config)?;
        let topic = research_topic(&state.conversation);
        let question = state.question().to_string();

        tracing::info!(
            max_loops = state.max_loops,
            initial_queries = state.initial_query_count,
            "Starting research"
        );
        if !self.retriever.has_sources() {
            tracing::warn!("No retrieval sources configured; the answer will be unsupported");
        }

        let termination = loop {
            if state.phase == Phase::Generating {
                let queries = plan_queries(self.query_generator.as_ref(), &state, &topic).await;
                state.dispatch(queries);
                events.emit(ResearchEvent::QueriesGenerated {
                    loop_index: state.loop_count,
                    queries: state.active_queries.clone(),
                });

                if cancel.is_cancelled() {
                    break Termination::Cancelled;
                }
                state.transition(Phase::Retrieving)?;
            }

            let batch = self.retriever.fan_out(&state.active_queries).await;
            let retrieval_failed = batch.all_failed();
            let failures = batch.failures;
            let candidates = dedupe(batch.items, &state);
            let survivors = self.reranker.rerank(&question, candidates).await;
            let new_items = state.admit(survivors);

            events.emit(ResearchEvent::RetrievalCompleted {
                loop_index: state.loop_count,
                new_items,
                failures,
            });

            if cancel.is_cancelled() {
                break Termination::Cancelled;
            }
            state.transition(Phase::Reflecting)?;

            // The budget check comes first: never reflect past the last loop
            if state.budget_exhausted() {
                state.complete_iteration();
                break Termination::BudgetExhausted;
            }

            let reflection = assess(self.reflection.as_ref(), &state, &topic, retrieval_failed).await;
            state.record_reflection(reflection.is_sufficient, reflection.knowledge_gap.clone());
            events.emit(ResearchEvent::Reflected {
                loop_index: state.loop_count,
                sufficient: reflection.is_sufficient,
                gap: reflection.knowledge_gap.clone(),
            });
            state.complete_iteration();

            if reflection.is_sufficient {
                break Termination::Sufficient;
            }
            if cancel.is_cancelled() {
                break Termination::Cancelled;
            }

            if reflection.follow_up_queries.is_empty() {
                tracing::debug!("No usable follow-up queries; regenerating from the gap");
                state.transition(Phase::Generating)?;
            } else {
                state.dispatch(reflection.follow_up_queries);
                events.emit(ResearchEvent::QueriesGenerated {
                    loop_index: state.loop_count,
                    queries: state.active_queries.clone(),
                });
                state.transition(Phase::Retrieving)?;
            }
        };

        state.transition(Phase::Finalizing)?;
        tracing::info!(
            termination = termination.as_str(),
            loops = state.loop_count,
            evidence = state.evidence_pool.len(),
            "Research loop finished"
        );
        events.emit(ResearchEvent::Finalizing {
            termination,
            evidence: state.evidence_pool.len(),
        });

        let answer = synthesize(self.synthesizer.as_ref(), &topic, &state.evidence_pool).await?;

        Ok(ResearchOutcome {
            session_id,
            answer: answer.text,
            citations: answer.citations,
            termination,
            loop_count: state.loop_count,
            queries: state.issued_queries,
            evidence: state.evidence_pool,
            knowledge_gap: state.knowledge_gap,
        })
    }
}
