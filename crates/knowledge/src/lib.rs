//! Knowledge base management.
//!
//! Provides the document side of research: an [`EmbeddingProvider`] to turn
//! text into vectors, a [`VectorIndex`] to answer nearest-neighbour queries
//! (local SQLite or remote Pinecone), and the ingestion pipeline that fills
//! the index from local text files.

pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod pinecone;
pub mod progress;
pub mod sources;
pub mod sqlite_index;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

pub use embeddings::providers::hashing::tokenize;
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use pinecone::PineconeIndex;
pub use progress::{LearnPhase, ProgressCallback, ProgressEvent, ProgressReporter};
pub use sources::SourceTracker;
pub use sqlite_index::SqliteIndex;
pub use types::{
    BaseStats, ChunkMetadata, DocumentChunk, IndexStats, KnowledgeBaseConfig, KnowledgeSource,
    LearnOptions, LearnStats, VectorMatch,
};
pub use vector_index::{cosine_similarity, VectorIndex};

use prosearch_core::config::KnowledgeSettings;
use prosearch_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Embedding settings for a base: the persisted ones once it has been
/// learned, otherwise the workspace defaults.
pub fn resolve_embedding(
    workspace: &Path,
    base_name: &str,
    settings: &KnowledgeSettings,
) -> AppResult<EmbeddingConfig> {
    match config::load_config(workspace, base_name)? {
        Some(base) => Ok(base.embedding),
        None => Ok(EmbeddingConfig::from(settings)),
    }
}

/// Open the vector index backing a base.
///
/// With Pinecone configured the remote index is used. Otherwise the local
/// SQLite file must already exist unless `create` is set.
pub fn open_index(
    workspace: &Path,
    base_name: &str,
    settings: &KnowledgeSettings,
    create: bool,
) -> AppResult<Arc<dyn VectorIndex>> {
    if let Some(ref pinecone) = settings.pinecone {
        let api_key = std::env::var(&pinecone.api_key_env).map_err(|_| {
            AppError::Config(format!(
                "Pinecone API key not found. Set the {} environment variable",
                pinecone.api_key_env
            ))
        })?;
        let namespace = pinecone
            .namespace
            .clone()
            .or_else(|| Some(base_name.to_string()));
        return Ok(Arc::new(PineconeIndex::new(
            &pinecone.host,
            api_key,
            namespace,
        )?));
    }

    let index_path = config::get_index_path(workspace, base_name);
    if !create && !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' has no index. Run 'prosearch knowledge learn {}' first.",
            base_name, base_name
        )));
    }

    Ok(Arc::new(SqliteIndex::open(&index_path)?))
}

/// Learn local files into a base, creating it on first use.
pub async fn learn(
    workspace: &Path,
    base_name: &str,
    settings: &KnowledgeSettings,
    options: LearnOptions,
    reporter: &ProgressReporter,
) -> AppResult<LearnStats> {
    tracing::info!("Starting learn operation for base '{}'", base_name);

    let requested = EmbeddingConfig::from(settings);
    let base_config = match config::load_config(workspace, base_name)? {
        Some(existing) if !options.reset => {
            existing.embedding.validate_consistency(&requested).map_err(|e| {
                AppError::Knowledge(format!(
                    "Base '{}' was learned with different embeddings ({}). Use --reset to rebuild it.",
                    base_name, e
                ))
            })?;
            existing
        }
        _ => {
            let mut fresh = KnowledgeBaseConfig::new(base_name, requested);
            fresh.chunk_size = options.chunk_size;
            fresh
        }
    };

    let embedder = create_provider(&base_config.embedding)?;
    let index = open_index(workspace, base_name, settings, true)?;
    let tracker = SourceTracker::new(workspace, base_name);

    let stats = ingest::learn(
        index.as_ref(),
        embedder.as_ref(),
        &tracker,
        &options,
        base_config.embedding.batch_size,
        reporter,
    )
    .await?;

    config::save_config(workspace, &base_config)?;
    Ok(stats)
}

/// Statistics for a base.
pub async fn stats(
    workspace: &Path,
    base_name: &str,
    settings: &KnowledgeSettings,
) -> AppResult<BaseStats> {
    let index = open_index(workspace, base_name, settings, false)?;
    let index_stats = index.stats().await?;
    let tracker = SourceTracker::new(workspace, base_name);

    let index_path = config::get_index_path(workspace, base_name);
    let db_size_bytes = if settings.pinecone.is_some() {
        0
    } else {
        std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0)
    };

    let sources_count = if index_stats.sources_count > 0 {
        index_stats.sources_count
    } else {
        tracker.list()?.len() as u32
    };

    Ok(BaseStats {
        base_name: base_name.to_string(),
        backend: index.name().to_string(),
        sources_count,
        chunks_count: index_stats.chunks_count,
        db_size_bytes,
        last_learn_at: tracker.last_indexed_at()?,
    })
}

/// Remove every chunk and tracked source from a base.
pub async fn clean(
    workspace: &Path,
    base_name: &str,
    settings: &KnowledgeSettings,
) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    let index = open_index(workspace, base_name, settings, false)?;
    index.reset().await?;
    SourceTracker::new(workspace, base_name).clear()?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}
