//! No-op document index: retrieval disabled.

use crate::DocumentStore;
use async_trait::async_trait;
use nova_core::error::RetrievalError;
use nova_core::retrieval::{DocumentIndex, Passage};

/// An index that never holds any documents.
///
/// With zero documents the retrieval flag is never raised, so the index is
/// not even queried during a turn.
pub struct NoopDocumentIndex;

#[async_trait]
impl DocumentIndex for NoopDocumentIndex {
    fn name(&self) -> &str {
        "none"
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(0)
    }

    async fn query(&self, _text: &str, _limit: usize) -> Result<Vec<Passage>, RetrievalError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl DocumentStore for NoopDocumentIndex {
    async fn ingest(&self, source: &str, _text: &str) -> Result<usize, RetrievalError> {
        Err(RetrievalError::IngestFailed {
            source_name: source.to_string(),
            reason: "retrieval is disabled in the configuration".into(),
        })
    }

    async fn sources(&self) -> Result<Vec<(String, usize)>, RetrievalError> {
        Ok(Vec::new())
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        Ok(())
    }
}
