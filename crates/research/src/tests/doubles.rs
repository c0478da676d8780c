//! Deterministic stand-ins for the model-driven steps and retrieval backends.

use crate::config::ResearchConfig;
use crate::controller::ResearchAgent;
use crate::events::{EventSink, ResearchEvent};
use crate::query::{QueryGenerator, QueryRequest};
use crate::reflection::{Reflection, ReflectionEngine};
use crate::rerank::{LexicalRelevance, Reranker};
use crate::retrieval::{Retriever, VectorSource};
use crate::state::EvidenceItem;
use crate::synthesis::AnswerSynthesizer;
use prosearch_core::{AppError, AppResult};
use prosearch_knowledge::embeddings::providers::HashingProvider;
use prosearch_knowledge::{ChunkMetadata, DocumentChunk, EmbeddingProvider, SqliteIndex, VectorIndex};
use prosearch_llm::{LlmClient, LlmRequest, LlmResponse};
use prosearch_search::{WebResult, WebSearchClient};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the query generator was asked for.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub count: usize,
    pub knowledge_gap: Option<String>,
}

/// Returns scripted query sets in order, then nothing.
#[derive(Default)]
pub struct ScriptedQueries {
    script: Mutex<VecDeque<Vec<String>>>,
    pub requests: Mutex<Vec<SeenRequest>>,
}

impl ScriptedQueries {
    pub fn new(script: Vec<Vec<&str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|set| set.into_iter().map(String::from).collect())
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl QueryGenerator for ScriptedQueries {
    async fn generate(&self, request: &QueryRequest<'_>) -> AppResult<Vec<String>> {
        self.requests.lock().unwrap().push(SeenRequest {
            count: request.count,
            knowledge_gap: request.knowledge_gap.map(String::from),
        });
        Ok(self.script.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Returns scripted verdicts in order, then "insufficient" without follow-ups.
#[derive(Default)]
pub struct ScriptedReflection {
    script: Mutex<VecDeque<Reflection>>,
    calls: AtomicUsize,
}

impl ScriptedReflection {
    pub fn new(script: Vec<Reflection>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Never satisfied; every verdict asks a fresh follow-up query.
    pub fn endless(rounds: usize) -> Self {
        Self::new(
            (0..rounds)
                .map(|i| Reflection {
                    is_sufficient: false,
                    knowledge_gap: Some(format!("gap {}", i)),
                    follow_up_queries: vec![format!("follow up {}", i)],
                })
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReflectionEngine for ScriptedReflection {
    async fn reflect(&self, _topic: &str, _evidence: &[EvidenceItem]) -> AppResult<Reflection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reflection::insufficient("still missing")))
    }
}

/// Writes a fixed answer and remembers how much evidence it saw.
pub struct FixedAnswer {
    text: String,
    pub seen_evidence: AtomicUsize,
}

impl FixedAnswer {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            seen_evidence: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl AnswerSynthesizer for FixedAnswer {
    async fn compose(&self, _topic: &str, evidence: &[EvidenceItem]) -> AppResult<String> {
        self.seen_evidence.store(evidence.len(), Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

pub struct FailingAnswer;

#[async_trait::async_trait]
impl AnswerSynthesizer for FailingAnswer {
    async fn compose(&self, _topic: &str, _evidence: &[EvidenceItem]) -> AppResult<String> {
        Err(AppError::Llm("model unavailable".to_string()))
    }
}

/// Three results per query, with URLs derived from the query unless
/// `shared` is set.
pub struct FixedWeb {
    shared: bool,
    calls: AtomicUsize,
}

impl FixedWeb {
    pub fn per_query() -> Self {
        Self {
            shared: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every query returns the same three pages.
    pub fn shared() -> Self {
        Self {
            shared: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WebSearchClient for FixedWeb {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, query: &str) -> AppResult<Vec<WebResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let slug = if self.shared {
            "shared".to_string()
        } else {
            query.to_lowercase().replace(' ', "-")
        };

        Ok((0..3)
            .map(|i| WebResult {
                url: format!("https://example.org/{}/{}", slug, i),
                title: format!("{} result {}", query, i),
                snippet: format!("Source {} covers the wider energy transition", i),
            })
            .collect())
    }
}

pub struct FailingWeb;

#[async_trait::async_trait]
impl WebSearchClient for FailingWeb {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _query: &str) -> AppResult<Vec<WebResult>> {
        Err(AppError::Search("HTTP 503 Service Unavailable".to_string()))
    }
}

/// Scripted chat model keyed on the system prompt of each research step.
pub struct ScriptedLlm {
    pub queries: String,
    pub reflection: String,
    pub relevance: String,
    pub answer: String,
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let system = request.system.as_deref().unwrap_or_default();

        let content = if system.contains("search queries") {
            &self.queries
        } else if system.contains("review gathered evidence") {
            &self.reflection
        } else if system.contains("grade how well passages") {
            &self.relevance
        } else if system.contains("well-sourced answers") {
            &self.answer
        } else {
            return Err(AppError::Llm(format!("Unexpected prompt: {}", system)));
        };

        Ok(LlmResponse::text(content.clone(), request.model.clone()))
    }
}

/// In-memory document index filled with hashed embeddings.
pub async fn vector_source(documents: &[(&str, &str)]) -> VectorSource {
    let index = SqliteIndex::open_in_memory().unwrap();
    let embedder = HashingProvider::new(64);

    for (position, (filename, text)) in documents.iter().enumerate() {
        let embedding = embedder.embed(text).await.unwrap();
        index
            .upsert(&DocumentChunk {
                chunk_id: format!("chunk-{}", position),
                text: text.to_string(),
                embedding,
                metadata: ChunkMetadata {
                    filename: filename.to_string(),
                    position: 0,
                },
            })
            .await
            .unwrap();
    }

    VectorSource {
        index: Arc::new(index),
        embedder: Arc::new(embedder),
    }
}

pub fn config(initial_query_count: usize, max_loops: u32) -> ResearchConfig {
    ResearchConfig {
        initial_query_count,
        max_loops,
        vector_score_threshold: 0.0,
        ..Default::default()
    }
}

pub fn agent(
    config: ResearchConfig,
    queries: Arc<ScriptedQueries>,
    retriever: Retriever,
    reflection: Arc<ScriptedReflection>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
) -> ResearchAgent {
    let reranker = Reranker::new(
        config.reranking_enabled,
        config.reranking_strategy,
        config.hybrid_weights,
        config.reranking_top_k,
        Arc::new(LexicalRelevance),
    );
    ResearchAgent::new(config, queries, retriever, reranker, reflection, synthesizer).unwrap()
}

/// Sink that records every event it receives.
pub fn recording_sink() -> (EventSink, Arc<Mutex<Vec<ResearchEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink = EventSink::new(Arc::new(move |event: &ResearchEvent| {
        captured.lock().unwrap().push(event.clone());
    }));
    (sink, events)
}
