//! Vector index abstraction for knowledge chunks.
//!
//! The research loop only calls [`VectorIndex::query`]; ingestion uses the
//! write side.

use crate::types::{DocumentChunk, IndexStats, VectorMatch};
use prosearch_core::AppResult;

/// Trait for vector index backends.
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs ("sqlite", "pinecone").
    fn name(&self) -> &str;

    /// Top-`k` chunks by cosine similarity to `vector`.
    ///
    /// Results are ordered by descending score, every score is
    /// `>= score_threshold`, and an empty index yields an empty list.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> AppResult<Vec<VectorMatch>>;

    /// Insert or replace a chunk.
    async fn upsert(&self, chunk: &DocumentChunk) -> AppResult<()>;

    /// Insert or replace many chunks.
    async fn upsert_batch(&self, chunks: &[DocumentChunk]) -> AppResult<()> {
        for chunk in chunks {
            self.upsert(chunk).await?;
        }
        Ok(())
    }

    /// Counts of stored sources and chunks.
    async fn stats(&self) -> AppResult<IndexStats>;

    /// Remove every chunk.
    async fn reset(&self) -> AppResult<()>;
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
