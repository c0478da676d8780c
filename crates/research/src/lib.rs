//! Iterative research agent.
//!
//! Answers a question by looping over query generation, concurrent web and
//! document retrieval, relevance reranking and reflection until the evidence
//! is judged sufficient or the loop budget runs out, then writes a cited
//! answer from the pooled evidence.
//!
//! [`ResearchAgent`] owns the loop. Each step sits behind a trait
//! ([`QueryGenerator`], [`RelevanceModel`], [`ReflectionEngine`],
//! [`AnswerSynthesizer`]) with an LLM-backed default, so any of them can be
//! replaced by a deterministic implementation.

pub mod config;
pub mod controller;
pub mod conversation;
pub mod events;
pub mod model;
pub mod query;
pub mod reflection;
pub mod rerank;
pub mod retrieval;
pub mod state;
pub mod synthesis;
pub mod topic;

#[cfg(test)]
mod tests;

pub use config::{Effort, HybridWeights, RelevanceModelKind, RerankStrategy, ResearchConfig};
pub use controller::{ResearchAgent, ResearchOutcome};
pub use conversation::{ConversationRecord, ConversationStore, JsonlConversationStore};
pub use events::{EventCallback, EventSink, ResearchEvent, Termination};
pub use model::ModelCaller;
pub use query::{LlmQueryGenerator, QueryGenerator, QueryRequest};
pub use reflection::{LlmReflection, Reflection, ReflectionEngine};
pub use rerank::{LexicalRelevance, LlmRelevance, RelevanceModel, Reranker};
pub use retrieval::{RetrievalBatch, Retriever, VectorSource};
pub use state::{EvidenceItem, Message, Phase, ResearchState, Role, SourceType};
pub use synthesis::{Answer, AnswerSynthesizer, Citation, LlmAnswerSynthesizer};
pub use topic::research_topic;
