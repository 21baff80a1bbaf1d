//! Store and provider wiring shared by the commands.

use nova_agent::TurnOrchestrator;
use nova_config::AppConfig;
use nova_core::memory::{FactStore, ProfileStore, TurnLog};
use nova_core::retrieval::DocumentIndex;
use nova_memory::{
    DocumentStore, Embedder, InMemoryDocumentIndex, InMemoryStore, NoopDocumentIndex,
    SqliteDocumentIndex, SqliteStore,
};
use nova_providers::{ProviderRouter, build_from_config};
use std::sync::Arc;
use tracing::debug;

/// Everything a command may need, built from the configuration.
pub struct Runtime {
    pub config: AppConfig,
    pub router: ProviderRouter,
    pub profile: Arc<dyn ProfileStore>,
    pub facts: Arc<dyn FactStore>,
    pub turns: Arc<dyn TurnLog>,
    /// Read side of the document index, handed to the turn core
    pub index: Arc<dyn DocumentIndex>,
    /// Write side of the same index
    pub documents: Arc<dyn DocumentStore>,
}

impl Runtime {
    /// Load `~/.nova/config.toml` and open the configured stores.
    pub async fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
        Self::open(config).await
    }

    /// Open the stores described by `config`.
    pub async fn open(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let router = build_from_config(&config);

        let embedder = if config.retrieval.uses_embeddings() {
            let provider = router
                .get(&config.retrieval.embedding_provider)
                .ok_or("Embedding provider is not configured")?;
            Some(Embedder::new(provider, &config.retrieval.embedding_model))
        } else {
            None
        };

        let sqlite = config.memory.backend == "sqlite";
        let runtime = if sqlite {
            let path = config.memory_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let store = Arc::new(SqliteStore::new(&path.to_string_lossy()).await?);

            let (index, documents) = if config.retrieval.enabled {
                let mut index = SqliteDocumentIndex::new(store.pool().clone())
                    .await?
                    .with_chunking(config.retrieval.chunk_size, config.retrieval.chunk_overlap);
                if let Some(embedder) = embedder {
                    index = index.with_embedder(embedder);
                }
                split(index)
            } else {
                split(NoopDocumentIndex)
            };

            Self {
                profile: store.clone(),
                facts: store.clone(),
                turns: store,
                index,
                documents,
                router,
                config,
            }
        } else {
            let store = Arc::new(InMemoryStore::new());
            let (index, documents) = if config.retrieval.enabled {
                split(
                    InMemoryDocumentIndex::new()
                        .with_chunking(config.retrieval.chunk_size, config.retrieval.chunk_overlap),
                )
            } else {
                split(NoopDocumentIndex)
            };

            Self {
                profile: store.clone(),
                facts: store.clone(),
                turns: store,
                index,
                documents,
                router,
                config,
            }
        };

        debug!(
            backend = %runtime.config.memory.backend,
            index = runtime.index.name(),
            "Runtime ready"
        );
        Ok(runtime)
    }

    /// The model to request: the default provider's own `default_model`,
    /// else the top-level one.
    pub fn model(&self) -> String {
        self.config
            .providers
            .get(&self.config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| self.config.default_model.clone())
    }

    /// Build the turn core over this runtime's provider and stores.
    pub fn orchestrator(&self) -> Result<TurnOrchestrator, Box<dyn std::error::Error>> {
        let provider = self
            .router
            .default_provider()
            .ok_or("No default provider configured")?;

        Ok(TurnOrchestrator::new(
            provider,
            self.model(),
            self.index.clone(),
            self.profile.clone(),
            self.facts.clone(),
        )
        .with_persona(&self.config.assistant.persona)
        .with_result_limit(self.config.assistant.result_limit)
        .with_temperature(self.config.default_temperature)
        .with_max_tokens(self.config.default_max_tokens))
    }

    /// Human-readable location of the stores.
    pub fn store_location(&self) -> String {
        match self.config.memory.backend.as_str() {
            "sqlite" => self.config.memory_path().display().to_string(),
            _ => "(in memory, discarded on exit)".to_string(),
        }
    }
}

/// One index, seen through both its read and write traits.
fn split<D: DocumentStore + 'static>(index: D) -> (Arc<dyn DocumentIndex>, Arc<dyn DocumentStore>) {
    let index = Arc::new(index);
    (index.clone(), index)
}
