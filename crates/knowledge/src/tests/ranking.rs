//! Retrieval quality over learned bases, end to end.

use crate::embeddings::providers::HashingProvider;
use crate::{
    learn, open_index, resolve_embedding, stats, EmbeddingProvider, LearnOptions,
    ProgressReporter, SqliteIndex, VectorIndex,
};
use prosearch_core::config::KnowledgeSettings;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("solar.md"),
        "Solar photovoltaic capacity additions reached record levels in 2024, \
         led by utility-scale solar farms in China and India.",
    )
    .unwrap();
    fs::write(
        dir.join("pasta.md"),
        "Boil the pasta in salted water, then toss it with garlic, olive oil and parmesan.",
    )
    .unwrap();
    fs::write(
        dir.join("rust.md"),
        "Rust is a systems programming language focused on memory safety and ownership.",
    )
    .unwrap();
}

async fn learned_workspace() -> (TempDir, KnowledgeSettings) {
    let temp = TempDir::new().unwrap();
    let docs = temp.path().join("docs");
    write_corpus(&docs);

    let settings = KnowledgeSettings::default();
    let options = LearnOptions {
        paths: vec![docs],
        ..Default::default()
    };
    learn(temp.path(), "kb", &settings, options, &ProgressReporter::noop())
        .await
        .unwrap();

    (temp, settings)
}

#[tokio::test]
async fn test_relevant_document_ranks_first() {
    let (temp, settings) = learned_workspace().await;
    let index = open_index(temp.path(), "kb", &settings, false).unwrap();
    let embedder = HashingProvider::new(
        resolve_embedding(temp.path(), "kb", &settings)
            .unwrap()
            .dimensions,
    );

    let query = embedder.embed("solar capacity growth 2024").await.unwrap();
    let results = index.query(&query, 10, -1.0).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].metadata.filename, "solar.md");
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores must descend");
    }
}

#[tokio::test]
async fn test_threshold_drops_unrelated_chunks() {
    let (temp, settings) = learned_workspace().await;
    let index = open_index(temp.path(), "kb", &settings, false).unwrap();
    let embedder = HashingProvider::new(settings.dimensions);

    let query = embedder.embed("memory safety in Rust programming").await.unwrap();
    let results = index.query(&query, 10, 0.3).await.unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|m| m.metadata.filename == "rust.md"));
}

#[tokio::test]
async fn test_base_stats_after_learn() {
    let (temp, settings) = learned_workspace().await;
    let base = stats(temp.path(), "kb", &settings).await.unwrap();

    assert_eq!(base.backend, "sqlite");
    assert_eq!(base.sources_count, 3);
    assert_eq!(base.chunks_count, 3);
    assert!(base.db_size_bytes > 0);
    assert!(base.last_learn_at.is_some());
}

#[tokio::test]
async fn test_unlearned_base_has_no_index() {
    let temp = TempDir::new().unwrap();
    let err = open_index(temp.path(), "missing", &KnowledgeSettings::default(), false)
        .err()
        .unwrap();
    assert!(err.to_string().contains("knowledge learn"));
}

#[tokio::test]
async fn test_embedding_mismatch_requires_reset() {
    let (temp, mut settings) = learned_workspace().await;
    settings.dimensions = 128;

    let options = LearnOptions {
        paths: vec![temp.path().join("docs")],
        ..Default::default()
    };
    let err = learn(temp.path(), "kb", &settings, options.clone(), &ProgressReporter::noop())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("--reset"));

    let reset = LearnOptions {
        reset: true,
        ..options
    };
    learn(temp.path(), "kb", &settings, reset, &ProgressReporter::noop())
        .await
        .unwrap();
    assert_eq!(
        resolve_embedding(temp.path(), "kb", &settings).unwrap().dimensions,
        128
    );
}

#[tokio::test]
async fn test_empty_index_returns_nothing() {
    let index = SqliteIndex::open_in_memory().unwrap();
    let embedder = HashingProvider::new(64);
    let query = embedder.embed("anything at all").await.unwrap();
    assert!(index.query(&query, 10, 0.3).await.unwrap().is_empty());
}
