//! SQLite document index with FTS5 keyword ranking and optional embeddings.
//!
//! Uploaded text is chunked ([`crate::chunker`]) into `doc_chunks`; an
//! external-content FTS5 table mirrors the chunk text and triggers keep the
//! two in sync. Queries rank by BM25 by default. When an [`Embedder`] is
//! attached, chunks are embedded at ingest and queries rank by cosine
//! similarity instead, falling back to BM25 if the query can't be embedded.

use crate::vector::{blob_to_embedding, embedding_to_blob, rank_by_similarity};
use crate::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DocumentStore, chunker};
use async_trait::async_trait;
use nova_core::error::RetrievalError;
use nova_core::provider::{EmbeddingRequest, Provider};
use nova_core::retrieval::{DocumentIndex, Passage};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A provider and model used to embed chunks and queries.
#[derive(Clone)]
pub struct Embedder {
    pub provider: Arc<dyn Provider>,
    pub model: String,
}

impl Embedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    async fn embed(&self, inputs: Vec<String>) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let expected = inputs.len();
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs,
            })
            .await
            .map_err(|e| RetrievalError::EmbeddingFailed(e.to_string()))?;

        if response.embeddings.len() != expected {
            return Err(RetrievalError::EmbeddingFailed(format!(
                "expected {expected} embeddings, got {}",
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

/// Chunked plain-text documents stored in SQLite.
pub struct SqliteDocumentIndex {
    pool: SqlitePool,
    embedder: Option<Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SqliteDocumentIndex {
    /// Create the index tables in `pool` (idempotent).
    pub async fn new(pool: SqlitePool) -> Result<Self, RetrievalError> {
        let index = Self {
            pool,
            embedder: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        };
        index.run_migrations().await?;
        Ok(index)
    }

    /// Override the chunk window and overlap used at ingest.
    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }

    /// Rank by embedding similarity instead of BM25.
    pub fn with_embedder(mut self, embedder: Embedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    async fn run_migrations(&self) -> Result<(), RetrievalError> {
        let statements = [
            (
                "doc_chunks table",
                r#"
                CREATE TABLE IF NOT EXISTS doc_chunks (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    source      TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    content     TEXT NOT NULL,
                    embedding   BLOB
                )
                "#,
            ),
            (
                "FTS5 table",
                r#"
                CREATE VIRTUAL TABLE IF NOT EXISTS doc_chunks_fts USING fts5(
                    content,
                    content='doc_chunks',
                    content_rowid='iid',
                    tokenize='porter unicode61'
                )
                "#,
            ),
            (
                "insert trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS doc_chunks_ai AFTER INSERT ON doc_chunks BEGIN
                    INSERT INTO doc_chunks_fts(rowid, content) VALUES (new.iid, new.content);
                END
                "#,
            ),
            (
                "delete trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS doc_chunks_ad AFTER DELETE ON doc_chunks BEGIN
                    INSERT INTO doc_chunks_fts(doc_chunks_fts, rowid, content)
                    VALUES ('delete', old.iid, old.content);
                END
                "#,
            ),
            (
                "source index",
                "CREATE INDEX IF NOT EXISTS idx_doc_chunks_source ON doc_chunks(source)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| RetrievalError::Unavailable(format!("{what}: {e}")))?;
        }

        debug!("Document index migrations complete");
        Ok(())
    }

    /// Build a safe FTS5 query from user text.
    ///
    /// Each word is stripped to alphanumerics and quoted as a prefix term;
    /// terms are OR-ed so a question matches chunks sharing any of its words,
    /// with BM25 rewarding chunks that share more.
    fn sanitize_fts_query(text: &str) -> String {
        text.split_whitespace()
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_')
                    .collect::<String>()
            })
            .filter(|w| !w.is_empty())
            .map(|w| format!("\"{w}\"*"))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    async fn query_bm25(&self, text: &str, limit: usize) -> Result<Vec<Passage>, RetrievalError> {
        let fts_query = Self::sanitize_fts_query(text);
        if fts_query.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT c.content, bm25(doc_chunks_fts) AS rank
            FROM doc_chunks_fts f
            JOIN doc_chunks c ON c.iid = f.rowid
            WHERE doc_chunks_fts MATCH ?1
            ORDER BY rank
            LIMIT ?2
            "#,
        )
        .bind(&fts_query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RetrievalError::QueryFailed(format!("FTS5 search: {e}")))?;

        rows.iter()
            .map(|row| -> Result<Passage, sqlx::Error> {
                let rank: f64 = row.try_get("rank")?;
                // bm25() is lower-is-better; flip it so higher is better.
                Ok(Passage::new(row.try_get::<String, _>("content")?, (-rank) as f32))
            })
            .collect::<Result<_, _>>()
            .map_err(|e| RetrievalError::QueryFailed(format!("FTS5 row: {e}")))
    }

    async fn query_embeddings(
        &self,
        embedder: &Embedder,
        text: &str,
        limit: usize,
    ) -> Result<Option<Vec<Passage>>, RetrievalError> {
        let rows = sqlx::query("SELECT content, embedding FROM doc_chunks WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("embedding scan: {e}")))?;

        if rows.is_empty() {
            return Ok(None);
        }

        let candidates = rows
            .iter()
            .map(|row| -> Result<(String, Vec<f32>), sqlx::Error> {
                let blob: Vec<u8> = row.try_get("embedding")?;
                Ok((row.try_get("content")?, blob_to_embedding(&blob)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RetrievalError::QueryFailed(format!("embedding row: {e}")))?;

        let query_embedding = match embedder.embed(vec![text.to_string()]).await {
            Ok(mut embeddings) => embeddings.remove(0),
            Err(e) => {
                warn!("Query embedding failed, falling back to keyword ranking: {e}");
                return Ok(None);
            }
        };

        Ok(Some(rank_by_similarity(&candidates, &query_embedding, limit)))
    }
}

#[async_trait]
impl DocumentIndex for SqliteDocumentIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM doc_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("COUNT: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| RetrievalError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt as usize)
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<Passage>, RetrievalError> {
        if text.trim().is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        if let Some(embedder) = &self.embedder {
            if let Some(passages) = self.query_embeddings(embedder, text, limit).await? {
                return Ok(passages);
            }
        }
        self.query_bm25(text, limit).await
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentIndex {
    async fn ingest(&self, source: &str, text: &str) -> Result<usize, RetrievalError> {
        let ingest_err = |reason: String| RetrievalError::IngestFailed {
            source_name: source.to_string(),
            reason,
        };

        let chunks = chunker::split_text(text, self.chunk_size, self.chunk_overlap);

        let embeddings = match &self.embedder {
            Some(embedder) if !chunks.is_empty() => match embedder.embed(chunks.clone()).await {
                Ok(embeddings) => Some(embeddings),
                Err(e) => {
                    warn!("Embedding {source} failed, storing without embeddings: {e}");
                    None
                }
            },
            _ => None,
        };

        let mut tx = self.pool.begin().await.map_err(|e| ingest_err(e.to_string()))?;

        sqlx::query("DELETE FROM doc_chunks WHERE source = ?1")
            .bind(source)
            .execute(&mut *tx)
            .await
            .map_err(|e| ingest_err(format!("replace: {e}")))?;

        for (i, chunk) in chunks.iter().enumerate() {
            let blob = embeddings.as_ref().map(|e| embedding_to_blob(&e[i]));
            sqlx::query(
                "INSERT INTO doc_chunks (source, chunk_index, content, embedding) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(source)
            .bind(i as i64)
            .bind(chunk)
            .bind(blob)
            .execute(&mut *tx)
            .await
            .map_err(|e| ingest_err(format!("insert: {e}")))?;
        }

        tx.commit().await.map_err(|e| ingest_err(e.to_string()))?;

        info!(source, chunks = chunks.len(), "Document ingested");
        Ok(chunks.len())
    }

    async fn sources(&self) -> Result<Vec<(String, usize)>, RetrievalError> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS cnt FROM doc_chunks GROUP BY source ORDER BY source",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RetrievalError::QueryFailed(format!("sources: {e}")))?;

        rows.iter()
            .map(|row| -> Result<(String, usize), sqlx::Error> {
                let cnt: i64 = row.try_get("cnt")?;
                Ok((row.try_get("source")?, cnt as usize))
            })
            .collect::<Result<_, _>>()
            .map_err(|e| RetrievalError::QueryFailed(format!("source row: {e}")))
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        sqlx::query("DELETE FROM doc_chunks")
            .execute(&self.pool)
            .await
            .map_err(|e| RetrievalError::QueryFailed(format!("CLEAR: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::open_pool;
    use nova_core::error::ProviderError;
    use nova_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};

    async fn test_index() -> SqliteDocumentIndex {
        let pool = open_pool("sqlite::memory:").await.unwrap();
        SqliteDocumentIndex::new(pool).await.unwrap()
    }

    /// Embeds text as `[mentions of "rust", mentions of "cooking", 1.0]`.
    struct KeywordEmbedder {
        fail: bool,
    }

    #[async_trait]
    impl Provider for KeywordEmbedder {
        fn name(&self) -> &str {
            "keyword-embedder"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("embeddings only".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            if self.fail {
                return Err(ProviderError::Network("offline".into()));
            }
            let embeddings = request
                .inputs
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![t.matches("rust").count() as f32, t.matches("cooking").count() as f32, 1.0]
                })
                .collect();
            Ok(EmbeddingResponse {
                embeddings,
                model: request.model,
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn empty_index_counts_zero() {
        let index = test_index().await;
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_chunks_and_counts() {
        let index = test_index().await.with_chunking(40, 10);
        let text = "Rust guarantees memory safety without a garbage collector. \
                    Ownership and borrowing are checked at compile time.";
        let n = index.ingest("rust.txt", text).await.unwrap();
        assert!(n > 1);
        assert_eq!(index.count().await.unwrap(), n);
    }

    #[tokio::test]
    async fn bm25_ranks_matching_chunks_first() {
        let index = test_index().await;
        index.ingest("rust.txt", "Rust is a systems programming language").await.unwrap();
        index.ingest("pasta.txt", "Cooking pasta needs salted boiling water").await.unwrap();
        index.ingest("python.txt", "Python is popular for scripting").await.unwrap();

        let passages = index.query("What is Rust?", 3).await.unwrap();
        assert!(!passages.is_empty());
        assert!(passages[0].text.contains("Rust"));
        assert!(passages[0].score > 0.0, "score should be positive");
        assert!(passages.iter().all(|p| !p.text.contains("pasta")));
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let index = test_index().await;
        for i in 0..10 {
            index
                .ingest(&format!("doc{i}.txt"), &format!("Topic number {i} about retrieval"))
                .await
                .unwrap();
        }
        assert_eq!(index.query("retrieval", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn reingest_replaces_source() {
        let index = test_index().await;
        index.ingest("notes.txt", "first version xyzzy").await.unwrap();
        index.ingest("notes.txt", "second version plugh").await.unwrap();

        assert_eq!(index.count().await.unwrap(), 1);
        assert!(index.query("xyzzy", 3).await.unwrap().is_empty());
        assert_eq!(index.query("plugh", 3).await.unwrap().len(), 1);
        assert_eq!(index.sources().await.unwrap(), vec![("notes.txt".to_string(), 1)]);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let index = test_index().await;
        index.ingest("a.txt", "alpha beta").await.unwrap();
        index.ingest("b.txt", "gamma delta").await.unwrap();
        index.clear().await.unwrap();

        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query("alpha", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn punctuation_only_query_is_empty() {
        let index = test_index().await;
        index.ingest("a.txt", "alpha beta").await.unwrap();
        assert!(index.query("?!", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embeddings_rank_by_similarity() {
        let embedder = Embedder::new(Arc::new(KeywordEmbedder { fail: false }), "test-embed");
        let index = test_index().await.with_embedder(embedder);
        index.ingest("rust.txt", "rust rust rust").await.unwrap();
        index.ingest("food.txt", "cooking cooking").await.unwrap();

        let passages = index.query("tell me about rust", 1).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "rust rust rust");
    }

    #[tokio::test]
    async fn failing_embedder_falls_back_to_bm25() {
        let embedder = Embedder::new(Arc::new(KeywordEmbedder { fail: true }), "test-embed");
        let index = test_index().await.with_embedder(embedder);
        index.ingest("rust.txt", "Rust ownership rules").await.unwrap();

        let passages = index.query("ownership", 3).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert!(passages[0].text.contains("ownership"));
    }

    #[test]
    fn sanitize_fts_query_quotes_and_ors() {
        assert_eq!(
            SqliteDocumentIndex::sanitize_fts_query("hello! @world#"),
            "\"hello\"* OR \"world\"*"
        );
        assert_eq!(SqliteDocumentIndex::sanitize_fts_query("   "), "");
    }
}
