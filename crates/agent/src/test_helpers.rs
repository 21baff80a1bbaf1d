//! Shared test doubles for the turn core.

use async_trait::async_trait;
use nova_core::error::{MemoryError, ProviderError, RetrievalError};
use nova_core::memory::{Fact, FactStore, ProfileStore};
use nova_core::message::Message;
use nova_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use nova_core::retrieval::{DocumentIndex, Passage};
use std::sync::Mutex;

/// A provider that streams scripted fragments and records every prompt.
///
/// Optionally fails after the fragments, or refuses to open the stream.
pub struct ScriptedProvider {
    fragments: Vec<String>,
    fail_after: Option<ProviderError>,
    fail_to_open: Option<ProviderError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail_after: None,
            fail_to_open: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Stream the fragments, then an error item.
    pub fn failing_after(fragments: &[&str], error: ProviderError) -> Self {
        Self {
            fail_after: Some(error),
            ..Self::new(fragments)
        }
    }

    /// Reject the request before any fragment is produced.
    pub fn unreachable(error: ProviderError) -> Self {
        Self {
            fail_to_open: Some(error),
            ..Self::new(&[])
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn record(&self, request: &ProviderRequest) {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.record(&request);
        Ok(ProviderResponse {
            message: Message::assistant(self.fragments.concat()),
            usage: None,
            model: request.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.record(&request);
        if let Some(e) = &self.fail_to_open {
            return Err(e.clone());
        }

        let (tx, rx) = tokio::sync::mpsc::channel(self.fragments.len() + 2);
        for fragment in &self.fragments {
            tx.send(Ok(StreamChunk::text(fragment.clone()))).await.unwrap();
        }
        match &self.fail_after {
            Some(e) => tx.send(Err(e.clone())).await.unwrap(),
            None => tx
                .send(Ok(StreamChunk {
                    done: true,
                    ..StreamChunk::default()
                }))
                .await
                .unwrap(),
        }
        Ok(rx)
    }
}

/// An index that reports documents but fails on count or on query.
pub struct FailingIndex {
    count_fails: bool,
}

impl FailingIndex {
    pub fn on_count() -> Self {
        Self { count_fails: true }
    }

    /// Count succeeds with a non-zero value, so retrieval reaches `query`.
    pub fn on_query() -> Self {
        Self { count_fails: false }
    }
}

#[async_trait]
impl DocumentIndex for FailingIndex {
    fn name(&self) -> &str {
        "failing"
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        if self.count_fails {
            Err(RetrievalError::Unavailable("index offline".into()))
        } else {
            Ok(7)
        }
    }

    async fn query(&self, _text: &str, _limit: usize) -> Result<Vec<Passage>, RetrievalError> {
        Err(RetrievalError::QueryFailed("no such table: doc_chunks".into()))
    }
}

/// Profile and fact store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl ProfileStore for FailingStore {
    async fn get_profile(&self, _key: &str) -> Result<Option<String>, MemoryError> {
        Err(MemoryError::Storage("database is locked".into()))
    }

    async fn set_profile(&self, _key: &str, _value: &str) -> Result<(), MemoryError> {
        Err(MemoryError::Storage("database is locked".into()))
    }
}

#[async_trait]
impl FactStore for FailingStore {
    async fn get_facts(&self) -> Result<Vec<Fact>, MemoryError> {
        Err(MemoryError::QueryFailed("no such table: facts".into()))
    }

    async fn add_fact(&self, _fact: Fact) -> Result<(), MemoryError> {
        Err(MemoryError::Storage("database is locked".into()))
    }

    async fn clear_facts(&self) -> Result<(), MemoryError> {
        Err(MemoryError::Storage("database is locked".into()))
    }
}
