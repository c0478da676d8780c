//! Retrieval fan-out.
//!
//! Every active query hits the web search client and the vector index at
//! the same time, and all queries run concurrently. A failed call is logged
//! and skipped; the iteration waits for every call before merging.

use crate::state::{EvidenceItem, ResearchState, SourceType};
use futures::future::join_all;
use prosearch_core::AppResult;
use prosearch_knowledge::{EmbeddingProvider, VectorIndex, VectorMatch};
use prosearch_search::{WebResult, WebSearchClient};
use std::collections::HashSet;
use std::sync::Arc;

/// Document side of retrieval: embed the query, then search the index.
#[derive(Clone)]
pub struct VectorSource {
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default)]
pub struct RetrievalBatch {
    /// Merged results in query order, web before documents per query
    pub items: Vec<EvidenceItem>,
    /// Retrieval calls dispatched
    pub attempted: usize,
    /// Retrieval calls that failed
    pub failures: usize,
}

impl RetrievalBatch {
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures == self.attempted
    }
}

/// Runs web and vector retrieval for a set of queries.
#[derive(Clone)]
pub struct Retriever {
    web: Option<Arc<dyn WebSearchClient>>,
    vector: Option<VectorSource>,
    vector_top_k: usize,
    score_threshold: f32,
}

impl Retriever {
    pub fn new(vector_top_k: usize, score_threshold: f32) -> Self {
        Self {
            web: None,
            vector: None,
            vector_top_k,
            score_threshold,
        }
    }

    pub fn with_web(mut self, client: Arc<dyn WebSearchClient>) -> Self {
        self.web = Some(client);
        self
    }

    pub fn with_vector(mut self, source: VectorSource) -> Self {
        self.vector = Some(source);
        self
    }

    pub fn has_sources(&self) -> bool {
        self.web.is_some() || self.vector.is_some()
    }

    /// Retrieve for every query and merge the results.
    pub async fn fan_out(&self, queries: &[String]) -> RetrievalBatch {
        let per_query = join_all(queries.iter().map(|query| self.retrieve_one(query))).await;

        let mut batch = RetrievalBatch::default();
        for outcomes in per_query {
            for outcome in outcomes.into_iter().flatten() {
                batch.attempted += 1;
                match outcome {
                    Ok(items) => batch.items.extend(items),
                    Err(_) => batch.failures += 1,
                }
            }
        }

        tracing::info!(
            "Retrieved {} candidates from {} calls ({} failed)",
            batch.items.len(),
            batch.attempted,
            batch.failures
        );
        batch
    }

    async fn retrieve_one(&self, query: &str) -> [Option<AppResult<Vec<EvidenceItem>>>; 2] {
        let (web, vector) = tokio::join!(self.search_web(query), self.search_vector(query));
        [web, vector]
    }

    async fn search_web(&self, query: &str) -> Option<AppResult<Vec<EvidenceItem>>> {
        let client = self.web.as_ref()?;
        let result = client.search(query).await.map(web_evidence);
        if let Err(ref e) = result {
            tracing::warn!(query, backend = client.name(), "Web search failed: {}", e);
        }
        Some(result)
    }

    async fn search_vector(&self, query: &str) -> Option<AppResult<Vec<EvidenceItem>>> {
        let source = self.vector.as_ref()?;
        let result: AppResult<Vec<EvidenceItem>> = async {
            let vector = source.embedder.embed(query).await?;
            let matches = source
                .index
                .query(&vector, self.vector_top_k, self.score_threshold)
                .await?;
            Ok(matches.into_iter().map(document_evidence).collect())
        }
        .await;

        if let Err(ref e) = result {
            tracing::warn!(query, index = source.index.name(), "Vector search failed: {}", e);
        }
        Some(result)
    }
}

/// Rank-derived raw scores: 1 / (1 + rank).
fn web_evidence(results: Vec<WebResult>) -> Vec<EvidenceItem> {
    results
        .into_iter()
        .enumerate()
        .map(|(rank, result)| {
            let source_label = if result.title.trim().is_empty() {
                result.url.clone()
            } else {
                result.title.trim().to_string()
            };
            let text = if result.snippet.trim().is_empty() {
                source_label.clone()
            } else {
                result.snippet
            };

            EvidenceItem {
                source_type: SourceType::Web,
                id: result.url,
                text,
                raw_score: 1.0 / (1.0 + rank as f32),
                rerank_score: None,
                source_label,
                citation_ref: None,
            }
        })
        .collect()
}

fn document_evidence(m: VectorMatch) -> EvidenceItem {
    EvidenceItem {
        source_type: SourceType::Document,
        source_label: format!("{} (chunk {})", m.metadata.filename, m.metadata.position),
        id: m.chunk_id,
        text: m.text,
        raw_score: m.score,
        rerank_score: None,
        citation_ref: None,
    }
}

/// Drop items repeated within the batch or already in the pool.
/// The first occurrence wins and keeps its position.
pub fn dedupe(items: Vec<EvidenceItem>, state: &ResearchState) -> Vec<EvidenceItem> {
    let mut seen: HashSet<(SourceType, String)> = HashSet::new();
    items
        .into_iter()
        .filter(|item| !state.contains(item.source_type, &item.id))
        .filter(|item| seen.insert((item.source_type, item.id.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::state::Message;
    use prosearch_core::AppError;
    use prosearch_knowledge::embeddings::providers::HashingProvider;
    use prosearch_knowledge::{ChunkMetadata, DocumentChunk, IndexStats, SqliteIndex};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct StaticWeb;

    #[async_trait::async_trait]
    impl WebSearchClient for StaticWeb {
        fn name(&self) -> &str {
            "static"
        }

        async fn search(&self, query: &str) -> AppResult<Vec<WebResult>> {
            if query.contains("fail") {
                return Err(AppError::Search("boom".to_string()));
            }
            Ok(vec![
                WebResult {
                    url: "https://iea.org/renewables".to_string(),
                    title: "Renewables 2024".to_string(),
                    snippet: "Capacity additions grew 50%".to_string(),
                },
                WebResult {
                    url: format!("https://example.com/{}", query.replace(' ', "-")),
                    title: String::new(),
                    snippet: String::new(),
                },
            ])
        }
    }

    async fn vector_source() -> VectorSource {
        let embedder = Arc::new(HashingProvider::new(64));
        let index = Arc::new(SqliteIndex::open_in_memory().unwrap());
        let text = "Solar capacity additions in 2024";
        index
            .upsert(&DocumentChunk {
                chunk_id: "chunk-1".to_string(),
                text: text.to_string(),
                embedding: embedder.embed(text).await.unwrap(),
                metadata: ChunkMetadata {
                    filename: "report.md".to_string(),
                    position: 0,
                },
            })
            .await
            .unwrap();
        VectorSource { index, embedder }
    }

    /// Web client that answers after a short delay and records when.
    struct DelayedWeb {
        start: Instant,
        finished: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl WebSearchClient for DelayedWeb {
        fn name(&self) -> &str {
            "delayed"
        }

        async fn search(&self, query: &str) -> AppResult<Vec<WebResult>> {
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.finished.lock().unwrap().push(self.start.elapsed());
            Ok(vec![WebResult {
                url: format!("https://example.com/{}", query.replace(' ', "-")),
                title: query.to_string(),
                snippet: "snippet".to_string(),
            }])
        }
    }

    /// Records when each query against the wrapped index returns.
    struct TimedIndex {
        inner: SqliteIndex,
        start: Instant,
        finished: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl VectorIndex for TimedIndex {
        fn name(&self) -> &str {
            "timed"
        }

        async fn query(&self, vector: &[f32], k: usize, threshold: f32) -> AppResult<Vec<VectorMatch>> {
            let matches = self.inner.query(vector, k, threshold).await;
            self.finished.lock().unwrap().push(self.start.elapsed());
            matches
        }

        async fn upsert(&self, chunk: &DocumentChunk) -> AppResult<()> {
            self.inner.upsert(chunk).await
        }

        async fn upsert_batch(&self, chunks: &[DocumentChunk]) -> AppResult<()> {
            self.inner.upsert_batch(chunks).await
        }

        async fn stats(&self) -> AppResult<IndexStats> {
            self.inner.stats().await
        }

        async fn reset(&self) -> AppResult<()> {
            self.inner.reset().await
        }
    }

    #[test]
    fn test_web_scores_follow_rank() {
        let items = web_evidence(vec![
            WebResult {
                url: "u0".to_string(),
                title: "t".to_string(),
                snippet: "s".to_string(),
            },
            WebResult {
                url: "u1".to_string(),
                title: String::new(),
                snippet: String::new(),
            },
        ]);
        assert_eq!(items[0].raw_score, 1.0);
        assert_eq!(items[1].raw_score, 0.5);
        assert_eq!(items[1].source_label, "u1");
        assert_eq!(items[1].text, "u1");
    }

    #[tokio::test]
    async fn test_fan_out_merges_both_sources() {
        let retriever = Retriever::new(10, 0.1)
            .with_web(Arc::new(StaticWeb))
            .with_vector(vector_source().await);

        let batch = retriever
            .fan_out(&["solar capacity 2024".to_string(), "solar additions".to_string()])
            .await;

        assert_eq!(batch.attempted, 4);
        assert_eq!(batch.failures, 0);
        assert!(batch.items.iter().any(|i| i.source_type == SourceType::Document));
        assert!(batch.items.iter().any(|i| i.source_type == SourceType::Web));
    }

    #[tokio::test]
    async fn test_web_results_arrive_while_index_scans() {
        let inner = SqliteIndex::open_in_memory().unwrap();
        let chunks: Vec<DocumentChunk> = (0..20_000)
            .map(|i| DocumentChunk {
                chunk_id: format!("chunk-{}", i),
                text: format!("passage {}", i),
                embedding: vec![1.0; 64],
                metadata: ChunkMetadata {
                    filename: "large.md".to_string(),
                    position: i,
                },
            })
            .collect();
        inner.upsert_batch(&chunks).await.unwrap();

        let start = Instant::now();
        let index = Arc::new(TimedIndex {
            inner,
            start,
            finished: Mutex::new(Vec::new()),
        });
        let web = Arc::new(DelayedWeb {
            start,
            finished: Mutex::new(Vec::new()),
        });
        let retriever = Retriever::new(5, -1.0)
            .with_web(web.clone())
            .with_vector(VectorSource {
                index: index.clone(),
                embedder: Arc::new(HashingProvider::new(64)),
            });

        let batch = retriever
            .fan_out(&["solar output".to_string(), "wind output".to_string()])
            .await;
        assert_eq!(batch.failures, 0);

        let web_done = web.finished.lock().unwrap().clone();
        let index_done = index.finished.lock().unwrap().clone();
        assert_eq!(web_done.len(), 2);
        assert_eq!(index_done.len(), 2);

        let last_web = web_done.iter().max().unwrap();
        let first_index = index_done.iter().min().unwrap();
        assert!(
            last_web < first_index,
            "web finished at {:?}, index at {:?}",
            web_done,
            index_done
        );
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let retriever = Retriever::new(10, 0.1).with_web(Arc::new(StaticWeb));
        let batch = retriever
            .fan_out(&["fail please".to_string(), "works".to_string()])
            .await;

        assert_eq!(batch.attempted, 2);
        assert_eq!(batch.failures, 1);
        assert_eq!(batch.items.len(), 2);
        assert!(!batch.all_failed());
    }

    #[tokio::test]
    async fn test_dedupe_against_batch_and_pool() {
        let retriever = Retriever::new(10, 0.1).with_web(Arc::new(StaticWeb));
        let batch = retriever.fan_out(&["a".to_string(), "b".to_string()]).await;
        assert_eq!(batch.items.len(), 4);

        let mut state =
            ResearchState::new(vec![Message::user("q")], &ResearchConfig::default()).unwrap();
        let unique = dedupe(batch.items.clone(), &state);
        assert_eq!(unique.len(), 3);

        state.admit(unique);
        assert!(dedupe(batch.items, &state).is_empty());
    }

    #[tokio::test]
    async fn test_no_sources_attempts_nothing() {
        let batch = Retriever::new(10, 0.3).fan_out(&["q".to_string()]).await;
        assert_eq!(batch.attempted, 0);
        assert!(!batch.all_failed());
    }
}
