//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::embeddings::EmbeddingConfig;

/// Configuration persisted per knowledge base.
///
/// Written on the first `learn` so later queries embed with the same
/// provider, model and dimensions as the stored chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    pub name: String,

    /// Embedding settings used for both ingestion and querying
    pub embedding: EmbeddingConfig,

    /// Chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    1000
}

impl KnowledgeBaseConfig {
    pub fn new(name: impl Into<String>, embedding: EmbeddingConfig) -> Self {
        Self {
            name: name.into(),
            embedding,
            chunk_size: default_chunk_size(),
        }
    }
}

/// A chunk stored in a vector index.
///
/// Produced by ingestion; immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier, also the de-duplication key for documents
    pub chunk_id: String,

    /// Text content
    pub text: String,

    /// Embedding vector
    pub embedding: Vec<f32>,

    /// Where the chunk came from
    pub metadata: ChunkMetadata,
}

/// Provenance of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source filename (relative to the learned path where possible)
    pub filename: String,

    /// Position of the chunk within its source, 0-based
    pub position: u32,
}

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub chunk_id: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Counts reported by an index backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Distinct source files
    pub sources_count: u32,

    /// Stored chunks
    pub chunks_count: u32,
}

/// Represents a source document in the knowledge base (sources.jsonl tracking).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    /// Unique source identifier
    pub source_id: String,

    /// Source path
    pub path: String,

    /// Source type, currently always "file"
    pub source_type: String,

    /// When this source was indexed
    pub indexed_at: DateTime<Utc>,

    /// Number of chunks created from this source
    pub chunk_count: u32,

    /// Source size in bytes
    pub byte_count: u64,
}

/// Options for the learn operation.
#[derive(Debug, Clone)]
pub struct LearnOptions {
    /// Local paths to learn from (files or directories)
    pub paths: Vec<PathBuf>,

    /// Substring patterns a path must contain (any)
    pub include: Vec<String>,

    /// Substring patterns that exclude a path
    pub exclude: Vec<String>,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Reset the base before learning
    pub reset: bool,
}

impl Default for LearnOptions {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            chunk_size: default_chunk_size(),
            reset: false,
        }
    }
}

/// Statistics from a learn operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnStats {
    /// Number of sources indexed
    pub sources_count: u32,

    /// Number of chunks created
    pub chunks_count: u32,

    /// Files skipped (unreadable or not UTF-8)
    pub skipped_count: u32,

    /// Total bytes processed
    pub bytes_processed: u64,

    /// Duration in seconds
    pub duration_secs: f64,
}

/// Statistics for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    /// Base name
    pub base_name: String,

    /// Index backend name
    pub backend: String,

    /// Number of sources
    pub sources_count: u32,

    /// Number of chunks
    pub chunks_count: u32,

    /// Database size in bytes (0 for remote backends)
    pub db_size_bytes: u64,

    /// Last learn timestamp
    pub last_learn_at: Option<DateTime<Utc>>,
}
