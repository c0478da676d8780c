//! SQLite-backed vector index.
//!
//! Embeddings are stored as little-endian f32 blobs and scored by brute-force
//! cosine similarity, which is fine for the tens of thousands of chunks a
//! local knowledge base holds.

use crate::types::{ChunkMetadata, DocumentChunk, IndexStats, VectorMatch};
use crate::vector_index::{cosine_similarity, VectorIndex};
use prosearch_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS chunks (
        chunk_id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        position INTEGER NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(filename);
"#;

/// Vector index in a single SQLite file.
///
/// Every statement runs on tokio's blocking pool, so a long scan never
/// stalls other retrieval futures on the runtime.
pub struct SqliteIndex {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIndex {
    /// Open (creating if needed) the index at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Self::with_connection(conn)
    }

    /// In-memory index, used by tests and one-off sessions.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::Knowledge("SQLite index lock poisoned".to_string()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("SQLite index task failed: {}", e)))?
    }

    fn insert(conn: &Connection, chunk: &DocumentChunk) -> AppResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO chunks (chunk_id, filename, position, text, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chunk.chunk_id,
                chunk.metadata.filename,
                chunk.metadata.position as i64,
                chunk.text,
                embedding_to_bytes(&chunk.embedding),
            ],
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to insert chunk: {}", e)))?;

        Ok(())
    }

    fn scan(conn: &Connection, vector: &[f32], score_threshold: f32) -> AppResult<Vec<VectorMatch>> {
        let mut stmt = conn
            .prepare("SELECT chunk_id, filename, position, text, embedding FROM chunks ORDER BY rowid")
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                ))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to query chunks: {}", e)))?;

        let mut matches = Vec::new();
        for row in rows {
            let (chunk_id, filename, position, text, blob) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read chunk row: {}", e)))?;

            let embedding = bytes_to_embedding(&blob)?;
            let score = cosine_similarity(vector, &embedding);
            if score < score_threshold {
                continue;
            }

            matches.push(VectorMatch {
                chunk_id,
                score,
                text,
                metadata: ChunkMetadata {
                    filename,
                    position: position as u32,
                },
            });
        }

        Ok(matches)
    }
}

#[async_trait::async_trait]
impl VectorIndex for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> AppResult<Vec<VectorMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = vector.to_vec();
        let mut matches = self
            .blocking(move |conn| Self::scan(conn, &vector, score_threshold))
            .await?;

        // Stable: equal scores keep insertion order
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);

        tracing::debug!(
            "Retrieved {} chunks (requested top-{}, threshold {:.2})",
            matches.len(),
            k,
            score_threshold
        );

        Ok(matches)
    }

    async fn upsert(&self, chunk: &DocumentChunk) -> AppResult<()> {
        let chunk = chunk.clone();
        self.blocking(move |conn| Self::insert(conn, &chunk)).await
    }

    async fn upsert_batch(&self, chunks: &[DocumentChunk]) -> AppResult<()> {
        let chunks = chunks.to_vec();
        self.blocking(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

            for chunk in &chunks {
                Self::insert(&tx, chunk)?;
            }

            tx.commit()
                .map_err(|e| AppError::Knowledge(format!("Failed to commit chunks: {}", e)))
        })
        .await
    }

    async fn stats(&self) -> AppResult<IndexStats> {
        let (sources_count, chunks_count) = self
            .blocking(|conn| {
                conn.query_row(
                    "SELECT COUNT(DISTINCT filename), COUNT(*) FROM chunks",
                    [],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
                )
                .map_err(|e| AppError::Knowledge(format!("Failed to count chunks: {}", e)))
            })
            .await?;

        Ok(IndexStats {
            sources_count: sources_count as u32,
            chunks_count: chunks_count as u32,
        })
    }

    async fn reset(&self) -> AppResult<()> {
        self.blocking(|conn| {
            conn.execute("DELETE FROM chunks", [])
                .map_err(|e| AppError::Knowledge(format!("Failed to delete chunks: {}", e)))
        })
        .await?;

        tracing::info!("Reset knowledge base index");
        Ok(())
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
