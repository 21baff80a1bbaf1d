//! In-memory stores: useful for testing and ephemeral sessions.

use crate::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DocumentStore, chunker};
use async_trait::async_trait;
use nova_core::error::{MemoryError, RetrievalError};
use nova_core::memory::{Fact, FactStore, ProfileStore, TurnLog};
use nova_core::message::{ConversationTurn, Message, ThreadId};
use nova_core::retrieval::{DocumentIndex, Passage};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Profile, facts and turn log held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    profile: Arc<RwLock<HashMap<String, String>>>,
    facts: Arc<RwLock<Vec<Fact>>>,
    history: Arc<RwLock<History>>,
}

/// Messages per thread, plus threads ordered oldest write first.
#[derive(Default)]
struct History {
    threads: HashMap<ThreadId, Vec<Message>>,
    recency: Vec<ThreadId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn get_profile(&self, key: &str) -> Result<Option<String>, MemoryError> {
        Ok(self.profile.read().await.get(key).cloned())
    }

    async fn set_profile(&self, key: &str, value: &str) -> Result<(), MemoryError> {
        self.profile.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl FactStore for InMemoryStore {
    async fn get_facts(&self) -> Result<Vec<Fact>, MemoryError> {
        Ok(self.facts.read().await.clone())
    }

    async fn add_fact(&self, fact: Fact) -> Result<(), MemoryError> {
        self.facts.write().await.push(fact);
        Ok(())
    }

    async fn clear_facts(&self) -> Result<(), MemoryError> {
        self.facts.write().await.clear();
        Ok(())
    }
}

#[async_trait]
impl TurnLog for InMemoryStore {
    async fn save_turn(&self, turn: &ConversationTurn) -> Result<(), MemoryError> {
        let mut history = self.history.write().await;
        let thread = history.threads.entry(turn.thread_id.clone()).or_default();
        thread.push(Message::user(turn.user.clone()));
        thread.push(Message::assistant(turn.assistant.clone()));

        history.recency.retain(|t| t != &turn.thread_id);
        history.recency.push(turn.thread_id.clone());
        Ok(())
    }

    async fn load_history(&self, thread_id: &ThreadId) -> Result<Vec<Message>, MemoryError> {
        Ok(self
            .history
            .read()
            .await
            .threads
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_history(&self, thread_id: &ThreadId) -> Result<(), MemoryError> {
        let mut history = self.history.write().await;
        history.threads.remove(thread_id);
        history.recency.retain(|t| t != thread_id);
        Ok(())
    }

    async fn recent_threads(&self, limit: usize) -> Result<Vec<ThreadId>, MemoryError> {
        let history = self.history.read().await;
        Ok(history.recency.iter().rev().take(limit).cloned().collect())
    }
}

/// Chunked documents held in process memory, ranked by keyword overlap.
pub struct InMemoryDocumentIndex {
    chunks: Arc<RwLock<Vec<(String, String)>>>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl InMemoryDocumentIndex {
    pub fn new() -> Self {
        Self {
            chunks: Arc::new(RwLock::new(Vec::new())),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    /// Override the chunk window and overlap used at ingest.
    pub fn with_chunking(mut self, size: usize, overlap: usize) -> Self {
        self.chunk_size = size;
        self.chunk_overlap = overlap;
        self
    }
}

impl Default for InMemoryDocumentIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased alphanumeric words of `text`.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl DocumentIndex for InMemoryDocumentIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        Ok(self.chunks.read().await.len())
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<Passage>, RetrievalError> {
        let wanted = terms(text);
        if wanted.is_empty() {
            return Ok(vec![]);
        }

        let chunks = self.chunks.read().await;
        let mut results: Vec<Passage> = chunks
            .iter()
            .filter_map(|(_, chunk)| {
                let hits = terms(chunk).intersection(&wanted).count();
                (hits > 0).then(|| Passage::new(chunk.clone(), hits as f32))
            })
            .collect();

        // Stable sort keeps insertion order among ties.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentIndex {
    async fn ingest(&self, source: &str, text: &str) -> Result<usize, RetrievalError> {
        let new_chunks = chunker::split_text(text, self.chunk_size, self.chunk_overlap);
        let n = new_chunks.len();

        let mut chunks = self.chunks.write().await;
        chunks.retain(|(s, _)| s != source);
        chunks.extend(new_chunks.into_iter().map(|c| (source.to_string(), c)));
        Ok(n)
    }

    async fn sources(&self) -> Result<Vec<(String, usize)>, RetrievalError> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (source, _) in self.chunks.read().await.iter() {
            *counts.entry(source.clone()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        self.chunks.write().await.clear();
        Ok(())
    }
}
