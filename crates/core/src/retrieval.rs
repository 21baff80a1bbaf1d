//! Document index trait: ranked passages over uploaded documents.
//!
//! Indexes may store and rank chunks however they like (BM25, cosine
//! similarity, ...). What leaves an index is always a list of
//! [`Passage`]s, best first, so callers never deal with engine-specific
//! result shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::RetrievalError;

/// Default number of passages requested per turn.
pub const DEFAULT_RESULT_LIMIT: usize = 3;

/// A retrieved chunk of text and its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// The chunk text
    pub text: String,

    /// Engine-defined relevance (higher = better for the bundled indexes)
    pub score: f32,
}

impl Passage {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// The core DocumentIndex trait.
///
/// Implementations: SQLite (FTS5 or embeddings), in-memory, none (no-op).
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// The index name (e.g., "sqlite", "in_memory", "none").
    fn name(&self) -> &str;

    /// Number of chunks currently indexed.
    async fn count(&self) -> std::result::Result<usize, RetrievalError>;

    /// Up to `limit` passages relevant to `text`, best first.
    async fn query(
        &self,
        text: &str,
        limit: usize,
    ) -> std::result::Result<Vec<Passage>, RetrievalError>;
}
