//! End-to-end integration tests for the Nova assistant.
//!
//! These tests exercise the full turn from user utterance to streamed
//! answer: SQLite-backed stores, document ingestion, quick fact capture,
//! the turn orchestrator and the OpenAI-compatible provider.

use std::sync::Arc;

use futures::StreamExt;
use nova_agent::{TurnOrchestrator, quick_facts};
use nova_config::AppConfig;
use nova_core::error::ProviderError;
use nova_core::memory::{Fact, FactStore, PROFILE_NAME, ProfileStore, TurnLog};
use nova_core::message::{ConversationTurn, Message, Role, ThreadId};
use nova_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use nova_core::retrieval::DocumentIndex;
use nova_memory::{DocumentStore, SqliteDocumentIndex, SqliteStore};
use nova_providers::OpenAiCompatProvider;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Streams scripted fragments, optionally followed by an error, and keeps
/// every prompt it receives.
struct ScriptedProvider {
    fragments: Vec<&'static str>,
    error: Option<ProviderError>,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(fragments: Vec<&'static str>) -> Self {
        Self {
            fragments,
            error: None,
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn failing(fragments: Vec<&'static str>, error: ProviderError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(fragments)
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(self.fragments.concat()),
            usage: None,
            model: request.model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.prompts
            .lock()
            .unwrap()
            .push(request.messages[0].content.clone());

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        for f in &self.fragments {
            tx.send(Ok(StreamChunk::text(*f))).await.unwrap();
        }
        if let Some(e) = &self.error {
            tx.send(Err(e.clone())).await.unwrap();
        }
        Ok(rx)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

struct Stores {
    store: Arc<SqliteStore>,
    index: Arc<SqliteDocumentIndex>,
}

async fn sqlite_stores() -> Stores {
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    let index = Arc::new(SqliteDocumentIndex::new(store.pool().clone()).await.unwrap());
    Stores { store, index }
}

fn orchestrator(provider: Arc<dyn Provider>, stores: &Stores) -> TurnOrchestrator {
    TurnOrchestrator::new(
        provider,
        "llama-3.1-8b-instant",
        stores.index.clone(),
        stores.store.clone(),
        stores.store.clone(),
    )
}

/// What the CLI does per utterance: quick facts first, otherwise a full
/// turn, then the turn is saved.
async fn chat_once(
    orch: &TurnOrchestrator,
    stores: &Stores,
    thread: &ThreadId,
    utterance: &str,
) -> String {
    let reply = match quick_facts::capture(utterance) {
        Some(q) => {
            stores.store.add_fact(q.fact).await.unwrap();
            q.reply
        }
        None => orch.run_turn(utterance).collect::<Vec<_>>().await.concat(),
    };
    stores
        .store
        .save_turn(&ConversationTurn::new(thread.clone(), utterance, reply.as_str()))
        .await
        .unwrap();
    reply
}

// ── E2E: Full turn over SQLite stores ────────────────────────────────────

#[tokio::test]
async fn e2e_memory_grounded_answer() {
    let stores = sqlite_stores().await;
    stores.store.set_profile(PROFILE_NAME, "Asha").await.unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec!["Your name ", "is Asha."]));
    let orch = orchestrator(provider.clone(), &stores);
    let thread = ThreadId::new();

    let reply = chat_once(&orch, &stores, &thread, "What is my name?").await;
    assert_eq!(reply, "Your name is Asha.");

    let prompt = provider.last_prompt();
    assert!(prompt.starts_with("You are Nova, a helpful and factual AI assistant.\n\n"));
    assert!(prompt.contains("User name: Asha."));
    assert!(!prompt.contains("Relevant document context"));

    let history = stores.store.load_history(&thread).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].content, "Your name is Asha.");
}

#[tokio::test]
async fn e2e_document_grounded_answer() {
    let stores = sqlite_stores().await;
    stores
        .index
        .ingest(
            "resume.txt",
            "Asha built a distributed cache in Rust.\n\nShe also led the compiler team.",
        )
        .await
        .unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec!["She built a cache."]));
    let orch = orchestrator(provider.clone(), &stores);

    let fragments: Vec<String> = orch.run_turn("Summarize her Rust experience").collect().await;
    assert_eq!(fragments, vec!["She built a cache."]);

    let prompt = provider.last_prompt();
    assert!(prompt.contains("\nRelevant document context:\nAsha built a distributed cache in Rust."));
}

#[tokio::test]
async fn e2e_quick_fact_then_recall() {
    let stores = sqlite_stores().await;
    let provider = Arc::new(ScriptedProvider::new(vec!["Your friend is Ravi."]));
    let orch = orchestrator(provider.clone(), &stores);
    let thread = ThreadId::from("session-1");

    let ack = chat_once(&orch, &stores, &thread, "My friend's name is Ravi").await;
    assert_eq!(ack, "Got it — I’ll remember your friend's name is Ravi.");
    assert!(provider.last_prompt().is_empty(), "quick facts never reach the model");

    chat_once(&orch, &stores, &thread, "Who is my friend?").await;
    assert!(
        provider
            .last_prompt()
            .contains("Memory facts: friend/friend_name: Ravi")
    );

    assert_eq!(
        stores.store.get_facts_in("friend").await.unwrap(),
        vec![Fact::new("friend", "friend_name", "Ravi")]
    );
    assert_eq!(stores.store.load_history(&thread).await.unwrap().len(), 4);
}

#[tokio::test]
async fn e2e_arithmetic_result_in_prompt() {
    let stores = sqlite_stores().await;
    let provider = Arc::new(ScriptedProvider::new(vec!["14"]));
    let orch = orchestrator(provider.clone(), &stores);

    let reply: String = orch.run_turn("calculate 2 + 3 * 4").collect::<Vec<_>>().await.concat();
    assert_eq!(reply, "14");
    assert!(provider.last_prompt().contains("\nMath result: 14\n"));

    // Code smuggled in as "arithmetic" is rejected and never reaches the prompt.
    orch.run_turn("calculate __import__('os').system('ls')")
        .collect::<Vec<_>>()
        .await;
    assert!(!provider.last_prompt().contains("Math result"));
}

#[tokio::test]
async fn e2e_model_failure_is_saved_as_error_fragment() {
    let stores = sqlite_stores().await;
    let provider = Arc::new(ScriptedProvider::failing(
        vec!["Partial"],
        ProviderError::Network("connection reset".into()),
    ));
    let orch = orchestrator(provider, &stores);
    let thread = ThreadId::new();

    let reply = chat_once(&orch, &stores, &thread, "hello").await;
    assert_eq!(reply, "Partial[Error: Network error: connection reset]");
    assert_eq!(stores.store.load_history(&thread).await.unwrap()[1].content, reply);
}

#[tokio::test]
async fn e2e_cleared_documents_stop_retrieval() {
    let stores = sqlite_stores().await;
    stores.index.ingest("a.txt", "hello from the notes").await.unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec!["ok"]));
    let orch = orchestrator(provider.clone(), &stores);

    orch.run_turn("hello").collect::<Vec<_>>().await;
    assert!(provider.last_prompt().contains("hello from the notes"));

    stores.index.clear().await.unwrap();
    assert_eq!(stores.index.count().await.unwrap(), 0);

    orch.run_turn("hello").collect::<Vec<_>>().await;
    assert!(!provider.last_prompt().contains("Relevant document context"));
}

// ── E2E: Real provider over HTTP ─────────────────────────────────────────

/// Serve one canned SSE response on a local port; returns the base URL.
async fn serve_sse(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + len {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}/v1")
}

#[tokio::test]
async fn e2e_openai_compatible_stream() {
    let url = serve_sse(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
         data: {\"choices\":[{\"delta\":{\"content\":\"Hello \"}}]}\n\n\
         data: {\"choices\":[{\"delta\":{\"content\":\"Asha\"}}]}\n\n\
         data: [DONE]\n\n",
    )
    .await;

    let stores = sqlite_stores().await;
    let provider = Arc::new(OpenAiCompatProvider::new("local", url, ""));
    let orch = orchestrator(provider, &stores);

    let fragments: Vec<String> = orch.run_turn("hi").collect().await;
    assert_eq!(fragments, vec!["Hello ", "Asha"]);
}

#[tokio::test]
async fn e2e_error_payload_mid_stream_becomes_error_fragment() {
    let url = serve_sse(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Partial\"}}]}\n\n\
         data: {\"error\":{\"message\":\"model overloaded\"}}\n\n",
    )
    .await;

    let stores = sqlite_stores().await;
    let provider = Arc::new(OpenAiCompatProvider::new("local", url, ""));
    let orch = orchestrator(provider, &stores);
    let thread = ThreadId::new();

    let reply = chat_once(&orch, &stores, &thread, "hi").await;
    assert_eq!(reply, "Partial[Error: Stream interrupted: model overloaded]");
    assert_eq!(stores.store.load_history(&thread).await.unwrap()[1].content, reply);
}

#[tokio::test]
async fn e2e_unreachable_provider_yields_one_error_fragment() {
    // Bind then drop, so nothing is listening on the port.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

    let stores = sqlite_stores().await;
    let provider = Arc::new(OpenAiCompatProvider::new("local", format!("http://{addr}/v1"), ""));
    let orch = orchestrator(provider, &stores);

    let fragments: Vec<String> = orch.run_turn("hi").collect().await;
    assert_eq!(fragments.len(), 1);
    assert!(fragments[0].starts_with("[Error: Network error"));
}

// ── E2E: Configuration ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_defaults_and_validation() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.default_provider, "groq");
    assert_eq!(config.default_model, "llama-3.1-8b-instant");
    assert_eq!(config.assistant.result_limit, 3);
    assert_eq!(config.retrieval.chunk_size, 800);
    assert_eq!(config.retrieval.chunk_overlap, 200);

    let router = nova_providers::build_from_config(&config);
    assert_eq!(router.default_provider().unwrap().name(), "groq");

    let toml_str = AppConfig::default_toml();
    let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed.default_model, config.default_model);
}
