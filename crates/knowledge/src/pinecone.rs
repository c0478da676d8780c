//! Pinecone vector index over its data-plane REST API.
//!
//! Chunk text and provenance travel as vector metadata (`text`, `filename`,
//! `position`), the layout the ingestion pipeline writes.

use crate::types::{ChunkMetadata, DocumentChunk, IndexStats, VectorMatch};
use crate::vector_index::VectorIndex;
use prosearch_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Remote Pinecone index.
pub struct PineconeIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<PineconeMetadata>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PineconeMetadata {
    #[serde(default)]
    text: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    position: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeStatsResponse {
    #[serde(default)]
    total_vector_count: u64,
}

impl PineconeIndex {
    /// `host` is the index host shown in the Pinecone console, with or
    /// without the `https://` scheme.
    pub fn new(host: &str, api_key: impl Into<String>, namespace: Option<String>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client: {}", e)))?;

        let host = host.trim_end_matches('/');
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            namespace,
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> AppResult<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Pinecone request to {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Knowledge(format!(
                "Pinecone API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    fn with_namespace(&self, mut body: serde_json::Value) -> serde_json::Value {
        if let Some(ref namespace) = self.namespace {
            body["namespace"] = json!(namespace);
        }
        body
    }

    fn into_matches(response: QueryResponse, score_threshold: f32) -> Vec<VectorMatch> {
        let mut matches: Vec<VectorMatch> = response
            .matches
            .into_iter()
            .filter(|m| m.score >= score_threshold)
            .map(|m| {
                let metadata = m.metadata.unwrap_or_default();
                VectorMatch {
                    chunk_id: m.id,
                    score: m.score,
                    text: metadata.text,
                    metadata: ChunkMetadata {
                        filename: metadata.filename,
                        position: metadata.position.max(0.0) as u32,
                    },
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }
}

#[async_trait::async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    #[instrument(skip(self, vector))]
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> AppResult<Vec<VectorMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let body = self.with_namespace(json!({
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
        }));

        let response: QueryResponse = self
            .post("/query", body)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse Pinecone response: {}", e)))?;

        let mut matches = Self::into_matches(response, score_threshold);
        matches.truncate(k);
        Ok(matches)
    }

    async fn upsert(&self, chunk: &DocumentChunk) -> AppResult<()> {
        self.upsert_batch(std::slice::from_ref(chunk)).await
    }

    async fn upsert_batch(&self, chunks: &[DocumentChunk]) -> AppResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let vectors: Vec<serde_json::Value> = chunks
            .iter()
            .map(|chunk| {
                json!({
                    "id": chunk.chunk_id,
                    "values": chunk.embedding,
                    "metadata": PineconeMetadata {
                        text: chunk.text.clone(),
                        filename: chunk.metadata.filename.clone(),
                        position: chunk.metadata.position as f64,
                    },
                })
            })
            .collect();

        self.post("/vectors/upsert", self.with_namespace(json!({ "vectors": vectors })))
            .await?;
        Ok(())
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let stats: DescribeStatsResponse = self
            .post("/describe_index_stats", json!({}))
            .await?
            .json()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to parse Pinecone stats: {}", e)))?;

        Ok(IndexStats {
            // Pinecone does not expose distinct source counts
            sources_count: 0,
            chunks_count: stats.total_vector_count as u32,
        })
    }

    async fn reset(&self) -> AppResult<()> {
        self.post("/vectors/delete", self.with_namespace(json!({ "deleteAll": true })))
            .await?;
        tracing::info!("Deleted all vectors from Pinecone index");
        Ok(())
    }
}
