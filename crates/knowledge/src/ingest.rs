//! Ingestion: turn local text files into indexed `DocumentChunk`s.
//!
//! Only UTF-8 text is learned. Anything else is skipped with a warning;
//! document formats such as PDF are not decoded.

use crate::embeddings::EmbeddingProvider;
use crate::progress::{LearnPhase, ProgressReporter};
use crate::sources::SourceTracker;
use crate::types::{ChunkMetadata, DocumentChunk, KnowledgeSource, LearnOptions, LearnStats};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use prosearch_core::{AppError, AppResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;
use text_splitter::TextSplitter;
use walkdir::WalkDir;

/// A file selected for learning, with the name stored in chunk metadata.
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    filename: String,
}

/// Learn every matching file under `options.paths` into `index`.
pub async fn learn(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    tracker: &SourceTracker,
    options: &LearnOptions,
    batch_size: usize,
    reporter: &ProgressReporter,
) -> AppResult<LearnStats> {
    let start = Instant::now();

    if options.chunk_size == 0 {
        return Err(AppError::Knowledge(
            "Chunk size must be greater than zero".to_string(),
        ));
    }

    if options.reset {
        tracing::info!("Resetting {} index before learning", index.name());
        index.reset().await?;
        tracker.clear()?;
    }

    let candidates = collect_candidates(options)?;
    let total = candidates.len() as u64;
    reporter.emit(
        LearnPhase::Scan,
        total,
        Some(total),
        format!("Found {} files", total),
    );

    let splitter = TextSplitter::new(options.chunk_size);
    let batch_size = batch_size.max(1);
    let mut stats = LearnStats::default();

    for (i, candidate) in candidates.iter().enumerate() {
        let current = i as u64 + 1;
        reporter.emit(LearnPhase::Read, current, Some(total), &candidate.filename);

        let bytes = match std::fs::read(&candidate.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping {:?}: {}", candidate.path, e);
                stats.skipped_count += 1;
                continue;
            }
        };

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!("Skipping {:?}: not UTF-8 text", candidate.path);
                stats.skipped_count += 1;
                continue;
            }
        };

        let chunks: Vec<(u32, String)> = splitter
            .chunks(&text)
            .filter(|c| !c.trim().is_empty())
            .enumerate()
            .map(|(position, c)| (position as u32, c.to_string()))
            .collect();

        if chunks.is_empty() {
            tracing::debug!("No text in {:?}", candidate.path);
            stats.skipped_count += 1;
            continue;
        }

        reporter.emit(LearnPhase::Embed, current, Some(total), &candidate.filename);

        let mut document_chunks = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(AppError::Knowledge(format!(
                    "Embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }

            for ((position, text), embedding) in batch.iter().zip(embeddings) {
                document_chunks.push(DocumentChunk {
                    chunk_id: chunk_id(&candidate.filename, *position, text),
                    text: text.clone(),
                    embedding,
                    metadata: ChunkMetadata {
                        filename: candidate.filename.clone(),
                        position: *position,
                    },
                });
            }
        }

        reporter.emit(LearnPhase::Index, current, Some(total), &candidate.filename);
        index.upsert_batch(&document_chunks).await?;

        let byte_count = text.len() as u64;
        tracker.track(&KnowledgeSource {
            source_id: uuid::Uuid::new_v4().to_string(),
            path: candidate.filename.clone(),
            source_type: "file".to_string(),
            indexed_at: Utc::now(),
            chunk_count: document_chunks.len() as u32,
            byte_count,
        })?;

        tracing::debug!(
            "Learned {:?}: {} chunks, {} bytes",
            candidate.path,
            document_chunks.len(),
            byte_count
        );

        stats.sources_count += 1;
        stats.chunks_count += document_chunks.len() as u32;
        stats.bytes_processed += byte_count;
    }

    stats.duration_secs = start.elapsed().as_secs_f64();

    tracing::info!(
        "Learn completed: {} sources, {} chunks, {} skipped, {} bytes in {:.2}s",
        stats.sources_count,
        stats.chunks_count,
        stats.skipped_count,
        stats.bytes_processed,
        stats.duration_secs
    );

    Ok(stats)
}

/// Stable chunk identifier: first 16 hex chars of sha256("filename:position:text").
pub fn chunk_id(filename: &str, position: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", filename, position, text).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn collect_candidates(options: &LearnOptions) -> AppResult<Vec<Candidate>> {
    let mut candidates = Vec::new();

    for root in &options.paths {
        if root.is_file() {
            if should_include(root, options) {
                candidates.push(Candidate {
                    path: root.clone(),
                    filename: display_name(root, root.parent()),
                });
            }
        } else if root.is_dir() {
            for entry in WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path();
                if entry.file_type().is_file() && should_include(path, options) {
                    candidates.push(Candidate {
                        path: path.to_path_buf(),
                        filename: display_name(path, Some(root)),
                    });
                }
            }
        } else {
            return Err(AppError::Knowledge(format!(
                "Path does not exist: {:?}",
                root
            )));
        }
    }

    Ok(candidates)
}

fn display_name(path: &Path, root: Option<&Path>) -> String {
    root.and_then(|r| path.strip_prefix(r).ok())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Excludes win; with includes given, a path must contain at least one.
fn should_include(path: &Path, options: &LearnOptions) -> bool {
    let path_str = path.to_string_lossy();

    if options.exclude.iter().any(|p| path_str.contains(p.as_str())) {
        return false;
    }

    options.include.is_empty() || options.include.iter().any(|p| path_str.contains(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::HashingProvider;
    use crate::sqlite_index::SqliteIndex;
    use std::fs;
    use tempfile::TempDir;

    fn options(paths: Vec<PathBuf>) -> LearnOptions {
        LearnOptions {
            paths,
            chunk_size: 200,
            ..Default::default()
        }
    }

    #[test]
    fn test_chunk_id_is_stable() {
        let a = chunk_id("notes.md", 0, "hello");
        assert_eq!(a.len(), 16);
        assert_eq!(a, chunk_id("notes.md", 0, "hello"));
        assert_ne!(a, chunk_id("notes.md", 1, "hello"));
    }

    #[test]
    fn test_should_include_patterns() {
        let opts = LearnOptions {
            include: vec![".md".to_string()],
            exclude: vec!["drafts".to_string()],
            ..Default::default()
        };
        assert!(should_include(Path::new("docs/a.md"), &opts));
        assert!(!should_include(Path::new("docs/a.txt"), &opts));
        assert!(!should_include(Path::new("drafts/a.md"), &opts));
    }

    #[tokio::test]
    async fn test_learn_directory() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        fs::create_dir_all(docs.join("nested")).unwrap();
        fs::write(
            docs.join("solar.md"),
            "Solar capacity grew sharply in 2024. Panels were installed across Asia.",
        )
        .unwrap();
        fs::write(docs.join("nested/wind.txt"), "Offshore wind farms expanded.").unwrap();
        fs::write(docs.join("image.bin"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();

        let index = SqliteIndex::open_in_memory().unwrap();
        let embedder = HashingProvider::new(64);
        let tracker = SourceTracker::new(temp.path(), "energy");

        let stats = learn(
            &index,
            &embedder,
            &tracker,
            &options(vec![docs.clone()]),
            8,
            &ProgressReporter::noop(),
        )
        .await
        .unwrap();

        assert_eq!(stats.sources_count, 2);
        assert_eq!(stats.skipped_count, 1);
        assert!(stats.chunks_count >= 2);

        let tracked: Vec<String> = tracker.list().unwrap().into_iter().map(|s| s.path).collect();
        assert_eq!(tracked, vec!["nested/wind.txt", "solar.md"]);

        let index_stats = index.stats().await.unwrap();
        assert_eq!(index_stats.sources_count, 2);
    }

    #[tokio::test]
    async fn test_relearn_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.md");
        fs::write(&file, "Battery storage doubled year over year.").unwrap();

        let index = SqliteIndex::open_in_memory().unwrap();
        let embedder = HashingProvider::new(32);
        let tracker = SourceTracker::new(temp.path(), "kb");
        let opts = options(vec![file]);

        learn(&index, &embedder, &tracker, &opts, 4, &ProgressReporter::noop())
            .await
            .unwrap();
        learn(&index, &embedder, &tracker, &opts, 4, &ProgressReporter::noop())
            .await
            .unwrap();

        assert_eq!(index.stats().await.unwrap().chunks_count, 1);
    }

    #[tokio::test]
    async fn test_missing_path_is_error() {
        let temp = TempDir::new().unwrap();
        let index = SqliteIndex::open_in_memory().unwrap();
        let embedder = HashingProvider::new(32);
        let tracker = SourceTracker::new(temp.path(), "kb");

        let result = learn(
            &index,
            &embedder,
            &tracker,
            &options(vec![temp.path().join("nope")]),
            4,
            &ProgressReporter::noop(),
        )
        .await;

        assert!(result.is_err());
    }
}
