//! Storage implementations for Nova.
//!
//! Two families live here:
//! - memory stores (profile, facts, turn log): [`SqliteStore`], [`InMemoryStore`]
//! - document indexes: [`SqliteDocumentIndex`], [`InMemoryDocumentIndex`],
//!   [`NoopDocumentIndex`]

pub mod chunker;
pub mod in_memory;
pub mod noop;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod documents;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use nova_core::error::RetrievalError;
use nova_core::retrieval::DocumentIndex;

pub use chunker::split_text;
pub use in_memory::{InMemoryDocumentIndex, InMemoryStore};
pub use noop::NoopDocumentIndex;
pub use vector::cosine_similarity;

#[cfg(feature = "sqlite")]
pub use documents::{Embedder, SqliteDocumentIndex};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Default chunk window, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 800;

/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// A document index that can also be written to.
///
/// The turn core only ever reads through [`DocumentIndex`]; ingestion is
/// the caller's business (the CLI's `docs` commands).
#[async_trait]
pub trait DocumentStore: DocumentIndex {
    /// Chunk `text` and index it under `source`, replacing any chunks
    /// previously indexed under the same source. Returns the chunk count.
    async fn ingest(&self, source: &str, text: &str) -> Result<usize, RetrievalError>;

    /// Distinct sources with their chunk counts, alphabetically.
    async fn sources(&self) -> Result<Vec<(String, usize)>, RetrievalError>;

    /// Remove every indexed chunk.
    async fn clear(&self) -> Result<(), RetrievalError>;
}
