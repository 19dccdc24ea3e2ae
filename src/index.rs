//! Persistent cosine-similarity vector collection over SQLite.
//!
//! A [`VectorIndex`] is one named collection: the set of all chunks
//! currently embedded and searchable for one technology corpus. It owns
//! the embedding provider (fixed at construction) and the SQLite pool.
//!
//! The collection lifecycle is replace-only: [`VectorIndex::rebuild`] drops
//! everything and re-adds from scratch, so no chunk from a previous run can
//! survive a source-corpus change. Rebuild holds the write side of an
//! internal `RwLock` for its whole duration, while `add`/`query`/`count`
//! hold the read side, so a query can never observe a partially-dropped
//! collection.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::models::{Chunk, ChunkMetadata, ContextRecord, SourceKind};

#[derive(Debug, Error)]
pub enum IndexError {
    /// The vector store cannot be opened or recreated at all. The one
    /// condition allowed to propagate to callers as a hard failure.
    #[error("vector store unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("metadata encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub struct VectorIndex {
    pool: SqlitePool,
    provider: Arc<dyn EmbeddingProvider>,
    rebuild_lock: RwLock<()>,
}

impl VectorIndex {
    /// Open (creating if missing) the collection at `path` with the given
    /// embedding provider.
    pub async fn open(
        path: &Path,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, IndexError> {
        let unavailable = |reason: String| IndexError::Unavailable {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| unavailable(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        init_schema(&pool)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        Ok(Self {
            pool,
            provider,
            rebuild_lock: RwLock::new(()),
        })
    }

    /// Embed and store `chunks` in fixed-size batches. A batch never splits
    /// a chunk. A failed batch is logged and dropped; chunks committed in
    /// prior batches stay indexed (at-least-once within a run). Returns the
    /// number of chunks actually stored.
    pub async fn add(&self, chunks: &[Chunk], batch_size: usize) -> Result<usize, IndexError> {
        let _guard = self.rebuild_lock.read().await;
        self.add_unlocked(chunks, batch_size).await
    }

    async fn add_unlocked(&self, chunks: &[Chunk], batch_size: usize) -> Result<usize, IndexError> {
        let mut stored = 0usize;
        for batch in chunks.chunks(batch_size.max(1)) {
            match self.add_batch(batch).await {
                Ok(count) => stored += count,
                Err(e) => {
                    error!(error = %e, batch_len = batch.len(), "batch failed, continuing with next batch");
                }
            }
        }
        Ok(stored)
    }

    async fn add_batch(&self, batch: &[Chunk]) -> Result<usize, IndexError> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .provider
            .embed(&texts)
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;
        if vectors.len() != batch.len() {
            return Err(IndexError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            )));
        }

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in batch.iter().zip(&vectors) {
            let metadata_json = serde_json::to_string(&chunk.metadata)?;
            sqlx::query(
                "INSERT OR REPLACE INTO chunks (id, document_id, chunk_index, source_kind, text, metadata_json) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.index as i64)
            .bind(chunk.metadata.source_kind.as_str())
            .bind(&chunk.text)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT OR REPLACE INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(batch.len())
    }

    /// Drop the whole collection and start empty, keeping the same
    /// similarity configuration. Exclusive against readers and writers.
    pub async fn clear_and_recreate(&self) -> Result<(), IndexError> {
        let _guard = self.rebuild_lock.write().await;
        self.clear_unlocked().await
    }

    async fn clear_unlocked(&self) -> Result<(), IndexError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM collection_meta")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Full collection replacement: clear, then add every `(chunks,
    /// batch_size)` group. Holds the rebuild lock exclusively for the whole
    /// sequence, so concurrent queries see either the old collection or the
    /// finished new one, never a partially-dropped state.
    pub async fn rebuild(&self, groups: &[(Vec<Chunk>, usize)]) -> Result<usize, IndexError> {
        let _guard = self.rebuild_lock.write().await;
        self.clear_unlocked().await?;

        let mut total = 0usize;
        for (chunks, batch_size) in groups {
            total += self.add_unlocked(chunks, *batch_size).await?;
        }

        self.record_rebuild(total).await?;
        info!(chunks = total, "collection rebuilt");
        Ok(total)
    }

    async fn record_rebuild(&self, total: usize) -> Result<(), IndexError> {
        let entries = [
            ("embedding_model", self.provider.model_name().to_string()),
            ("embedding_dims", self.provider.dims().to_string()),
            ("chunk_total", total.to_string()),
            ("rebuilt_at", chrono::Utc::now().to_rfc3339()),
        ];
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO collection_meta (key, value) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Number of stored chunks. Liveness signal for the caller.
    pub async fn count(&self) -> Result<i64, IndexError> {
        let _guard = self.rebuild_lock.read().await;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All stored chunk ids, sorted. Diagnostics surface.
    pub async fn chunk_ids(&self) -> Result<Vec<String>, IndexError> {
        let _guard = self.rebuild_lock.read().await;
        let rows = sqlx::query("SELECT id FROM chunks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// Read one collection metadata value (e.g. `rebuilt_at`).
    pub async fn meta_value(&self, key: &str) -> Result<Option<String>, IndexError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM collection_meta WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    /// Up to `k` nearest chunks by cosine similarity to `text`, optionally
    /// restricted to one source kind. Ascending distance (`1 − cosine`).
    ///
    /// An empty collection or a transient embedding failure yields an empty
    /// result set, not an error: "no answer available" is a normal outcome
    /// on the query path.
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<SourceKind>,
    ) -> Result<Vec<ContextRecord>, IndexError> {
        let _guard = self.rebuild_lock.read().await;

        let query_vec = match self.provider.embed(&[text.to_string()]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                warn!(error = %e, "query embedding failed, returning no results");
                return Ok(Vec::new());
            }
        };

        const BASE_SQL: &str = "SELECT c.text, c.metadata_json, v.embedding \
                                FROM chunks c JOIN chunk_vectors v ON v.chunk_id = c.id";
        let rows = if let Some(kind) = filter {
            let filtered = format!("{} WHERE c.source_kind = ?", BASE_SQL);
            sqlx::query(&filtered)
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(BASE_SQL).fetch_all(&self.pool).await?
        };

        let mut records: Vec<ContextRecord> = rows
            .iter()
            .filter_map(|row| {
                let metadata_json: String = row.get("metadata_json");
                let metadata: ChunkMetadata = match serde_json::from_str(&metadata_json) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(error = %e, "undecodable chunk metadata, skipping row");
                        return None;
                    }
                };
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                Some(ContextRecord {
                    content: row.get("text"),
                    metadata,
                    distance: Some(1.0 - similarity),
                })
            })
            .collect();

        records.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        records.truncate(k);
        Ok(records)
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            source_kind TEXT NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source_kind ON chunks (source_kind)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS collection_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
