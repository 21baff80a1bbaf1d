//! The turn orchestrator: detector → assemblers → composer → provider.

use crate::context::{DEFAULT_PERSONA, PromptSections, assembler, compose_prompt};
use crate::detector::{CapabilityFlags, detect};
use futures::stream::{self, Stream};
use nova_core::memory::{FactStore, MemorySnapshot, ProfileStore};
use nova_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use nova_core::retrieval::{DEFAULT_RESULT_LIMIT, DocumentIndex};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The text fragments of one answer, in arrival order.
///
/// Either exactly the provider's fragments, or those fragments followed by
/// a single `[Error: ...]` fragment.
pub type TurnStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Runs one user turn end to end.
///
/// Holds only shared handles, so cloning is cheap and every clone sees the
/// same stores.
#[derive(Clone)]
pub struct TurnOrchestrator {
    /// The LLM provider to stream answers from
    provider: Arc<dyn Provider>,

    /// The model to request
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// Uploaded documents
    index: Arc<dyn DocumentIndex>,

    profile: Arc<dyn ProfileStore>,

    facts: Arc<dyn FactStore>,

    /// Opening line of every prompt
    persona: String,

    /// Maximum passages per turn
    result_limit: usize,
}

impl TurnOrchestrator {
    /// Create an orchestrator with the default persona and result limit.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        index: Arc<dyn DocumentIndex>,
        profile: Arc<dyn ProfileStore>,
        facts: Arc<dyn FactStore>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            index,
            profile,
            facts,
            persona: DEFAULT_PERSONA.to_string(),
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    /// Replace the persona line.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    /// Set the maximum number of passages retrieved per turn.
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per answer.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Gather every section the utterance calls for and compose the prompt.
    ///
    /// Never fails: unavailable collaborators just leave their section out.
    pub async fn prompt_for(&self, utterance: &str) -> String {
        let docs_exist = match self.index.count().await {
            Ok(n) => n > 0,
            Err(e) => {
                warn!(index = self.index.name(), error = %e, "Document count failed; assuming none");
                false
            }
        };

        let flags = detect(&utterance.to_lowercase(), docs_exist);
        debug!(?flags, docs_exist, "Capabilities detected");

        self.compose(utterance, flags).await
    }

    async fn compose(&self, utterance: &str, flags: CapabilityFlags) -> String {
        let memory = if flags.needs_memory {
            assembler::assemble_memory(self.profile.as_ref(), self.facts.as_ref()).await
        } else {
            MemorySnapshot::default()
        };

        let excerpt = if flags.needs_retrieval {
            let passages =
                assembler::assemble_retrieval(self.index.as_ref(), utterance, self.result_limit).await;
            assembler::excerpt(&passages)
        } else {
            None
        };

        let arithmetic = if flags.needs_arithmetic {
            assembler::assemble_arithmetic(utterance)
        } else {
            None
        };

        debug!(
            name = memory.name.is_some(),
            facts = memory.facts.len(),
            excerpt = excerpt.is_some(),
            arithmetic = arithmetic.is_some(),
            "Context sections assembled"
        );

        compose_prompt(&PromptSections {
            persona: &self.persona,
            utterance,
            memory: &memory,
            excerpt: excerpt.as_deref(),
            arithmetic: arithmetic.as_ref(),
        })
    }

    fn request(&self, prompt: String) -> ProviderRequest {
        let mut request = ProviderRequest::prompt(&self.model, prompt);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request
    }

    /// Answer `utterance` as a lazy stream of text fragments.
    ///
    /// Nothing happens until the stream is first polled. The stream never
    /// yields an error: a provider failure becomes one final
    /// `[Error: ...]` fragment.
    pub fn run_turn(&self, utterance: &str) -> TurnStream {
        let start = TurnState::Pending {
            orchestrator: self.clone(),
            utterance: utterance.to_string(),
        };

        Box::pin(stream::unfold(start, |state| async move {
            match state {
                TurnState::Pending {
                    orchestrator,
                    utterance,
                } => {
                    info!(model = %orchestrator.model, provider = orchestrator.provider.name(), "Turn started");
                    let prompt = orchestrator.prompt_for(&utterance).await;
                    match orchestrator.provider.stream(orchestrator.request(prompt)).await {
                        Ok(rx) => next_fragment(rx).await,
                        Err(e) => {
                            warn!(error = %e, "Provider stream failed to open");
                            Some((error_fragment(&e), TurnState::Finished))
                        }
                    }
                }
                TurnState::Streaming(rx) => next_fragment(rx).await,
                TurnState::Finished => None,
            }
        }))
    }
}

enum TurnState {
    Pending {
        orchestrator: TurnOrchestrator,
        utterance: String,
    },
    Streaming(ChunkReceiver),
    Finished,
}

/// Pull from the provider channel until there is text to yield or the
/// stream is over.
async fn next_fragment(mut rx: ChunkReceiver) -> Option<(String, TurnState)> {
    loop {
        let item = rx.recv().await;
        match item {
            Some(Ok(chunk)) => {
                let done = chunk.done;
                if let Some(text) = chunk.content.filter(|c| !c.is_empty()) {
                    let next = if done {
                        TurnState::Finished
                    } else {
                        TurnState::Streaming(rx)
                    };
                    return Some((text, next));
                }
                if done {
                    info!("Turn finished");
                    return None;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "Provider stream failed mid-answer");
                return Some((error_fragment(&e), TurnState::Finished));
            }
            None => {
                info!("Turn finished");
                return None;
            }
        }
    }
}

fn error_fragment(e: &impl std::fmt::Display) -> String {
    format!("[Error: {e}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CLOSING_INSTRUCTION;
    use crate::test_helpers::{FailingIndex, FailingStore, ScriptedProvider};
    use futures::StreamExt;
    use nova_core::error::ProviderError;
    use nova_core::memory::{Fact, PROFILE_NAME};
    use nova_memory::{DocumentStore, InMemoryDocumentIndex, InMemoryStore};

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        index: Arc<dyn DocumentIndex>,
        store: Arc<InMemoryStore>,
    ) -> TurnOrchestrator {
        TurnOrchestrator::new(provider, "mock-model", index, store.clone(), store)
    }

    #[tokio::test]
    async fn fragments_pass_through_in_order() {
        let provider = Arc::new(ScriptedProvider::new(&["Hel", "lo", "!"]));
        let orch = orchestrator(
            provider.clone(),
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        );

        let fragments: Vec<String> = orch.run_turn("hello").collect().await;
        assert_eq!(fragments, vec!["Hel", "lo", "!"]);

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with(DEFAULT_PERSONA));
        assert!(prompts[0].ends_with(&format!("\nUser: hello\n{CLOSING_INSTRUCTION}")));
    }

    #[tokio::test]
    async fn nothing_runs_until_polled() {
        let provider = Arc::new(ScriptedProvider::new(&["hi"]));
        let orch = orchestrator(
            provider.clone(),
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        );

        let mut turn = orch.run_turn("hello");
        assert!(provider.prompts().is_empty());
        assert_eq!(turn.next().await.as_deref(), Some("hi"));
        assert_eq!(provider.prompts().len(), 1);
    }

    #[tokio::test]
    async fn failure_after_fragments_yields_one_error_fragment() {
        let provider = Arc::new(ScriptedProvider::failing_after(
            &["The answer", " is"],
            ProviderError::StreamInterrupted("connection reset".into()),
        ));
        let orch = orchestrator(
            provider,
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        );

        let fragments: Vec<String> = orch.run_turn("hello").collect().await;
        assert_eq!(
            fragments,
            vec![
                "The answer".to_string(),
                " is".to_string(),
                "[Error: Stream interrupted: connection reset]".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn failure_to_open_yields_only_the_error() {
        let provider = Arc::new(ScriptedProvider::unreachable(ProviderError::AuthenticationFailed(
            "invalid key".into(),
        )));
        let orch = orchestrator(
            provider,
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        );

        let fragments: Vec<String> = orch.run_turn("hello").collect().await;
        assert_eq!(fragments, vec!["[Error: Authentication failed: invalid key]"]);
    }

    #[tokio::test]
    async fn memory_question_uses_name_and_facts() {
        let store = Arc::new(InMemoryStore::new());
        store.set_profile(PROFILE_NAME, "Asha").await.unwrap();
        store.add_fact(Fact::new("friend", "friend_name", "Ravi")).await.unwrap();

        let provider = Arc::new(ScriptedProvider::new(&["You are Asha."]));
        let orch = orchestrator(provider.clone(), Arc::new(InMemoryDocumentIndex::new()), store);

        let answer: String = orch.run_turn("What is my name?").collect::<Vec<_>>().await.concat();
        assert_eq!(answer, "You are Asha.");

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("User name: Asha."));
        assert!(prompt.contains("Memory facts: friend/friend_name: Ravi"));
        assert!(!prompt.contains("Relevant document context"));
        assert!(!prompt.contains("Math result"));
    }

    #[tokio::test]
    async fn memory_not_fetched_when_not_needed() {
        let store = Arc::new(InMemoryStore::new());
        store.set_profile(PROFILE_NAME, "Asha").await.unwrap();

        let provider = Arc::new(ScriptedProvider::new(&["ok"]));
        let orch = orchestrator(provider.clone(), Arc::new(InMemoryDocumentIndex::new()), store);
        let _: Vec<String> = orch.run_turn("hello").collect().await;

        assert!(!provider.prompts()[0].contains("Asha"));
    }

    #[tokio::test]
    async fn indexed_documents_are_always_consulted() {
        let index = Arc::new(InMemoryDocumentIndex::new());
        index.ingest("notes.txt", "The launch code is hello world").await.unwrap();

        let provider = Arc::new(ScriptedProvider::new(&["ok"]));
        let orch = orchestrator(provider.clone(), index, Arc::new(InMemoryStore::new()));
        let _: Vec<String> = orch.run_turn("hello").collect().await;

        assert!(
            provider.prompts()[0]
                .contains("\nRelevant document context:\nThe launch code is hello world")
        );
    }

    #[tokio::test]
    async fn result_limit_caps_passages() {
        let index = Arc::new(InMemoryDocumentIndex::new());
        for i in 0..5 {
            index.ingest(&format!("doc{i}.txt"), &format!("rust fact {i}")).await.unwrap();
        }

        let provider = Arc::new(ScriptedProvider::new(&["ok"]));
        let orch = orchestrator(provider.clone(), index, Arc::new(InMemoryStore::new()))
            .with_result_limit(2);
        let _: Vec<String> = orch.run_turn("rust").collect().await;

        let prompt = &provider.prompts()[0];
        assert_eq!(prompt.matches("rust fact").count(), 2);
    }

    #[tokio::test]
    async fn arithmetic_result_in_prompt() {
        let provider = Arc::new(ScriptedProvider::new(&["14"]));
        let orch = orchestrator(
            provider.clone(),
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        );
        let _: Vec<String> = orch.run_turn("Calculate 2 + 3 * 4").collect().await;

        assert!(provider.prompts()[0].contains("\nMath result: 14\n"));
    }

    #[tokio::test]
    async fn failing_index_still_completes_with_other_context() {
        let store = Arc::new(InMemoryStore::new());
        store.set_profile(PROFILE_NAME, "Asha").await.unwrap();

        let provider = Arc::new(ScriptedProvider::new(&["fine"]));
        let orch = orchestrator(provider.clone(), Arc::new(FailingIndex::on_query()), store);

        let fragments: Vec<String> = orch.run_turn("my resume: 2*3").collect().await;
        assert_eq!(fragments, vec!["fine"]);

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("User name: Asha."));
        assert!(!prompt.contains("Relevant document context"));
        // "my resume: 2*3" is not an expression once stripped.
        assert!(!prompt.contains("Math result"));
    }

    #[tokio::test]
    async fn failing_index_keeps_math_result() {
        let provider = Arc::new(ScriptedProvider::new(&["42"]));
        let orch = orchestrator(
            provider.clone(),
            Arc::new(FailingIndex::on_query()),
            Arc::new(InMemoryStore::new()),
        );

        let fragments: Vec<String> = orch.run_turn("calculate 6 * 7").collect().await;
        assert_eq!(fragments, vec!["42"]);

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("\nMath result: 42\n"));
        assert!(!prompt.contains("Relevant document context"));
    }

    #[tokio::test]
    async fn pathological_expression_does_not_end_the_turn() {
        let provider = Arc::new(ScriptedProvider::new(&["too deep"]));
        let orch = orchestrator(
            provider.clone(),
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        );

        let unary = format!("calculate {}1", "-".repeat(100_000));
        let fragments: Vec<String> = orch.run_turn(&unary).collect().await;
        assert_eq!(fragments, vec!["too deep"]);

        let parens = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        let fragments: Vec<String> = orch.run_turn(&parens).collect().await;
        assert_eq!(fragments, vec!["too deep"]);

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|p| !p.contains("Math result")));
    }

    #[tokio::test]
    async fn provider_error_payload_surfaces_as_error_fragment() {
        let provider = Arc::new(ScriptedProvider::failing_after(
            &["Partial"],
            ProviderError::StreamInterrupted("model overloaded".into()),
        ));
        let orch = orchestrator(
            provider,
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        );

        let answer: String = orch.run_turn("hello").collect::<Vec<_>>().await.concat();
        assert_eq!(answer, "Partial[Error: Stream interrupted: model overloaded]");
    }

    #[tokio::test]
    async fn failing_count_and_stores_degrade_quietly() {
        let provider = Arc::new(ScriptedProvider::new(&["still here"]));
        let orch = TurnOrchestrator::new(
            provider.clone(),
            "mock-model",
            Arc::new(FailingIndex::on_count()),
            Arc::new(FailingStore),
            Arc::new(FailingStore),
        );

        let fragments: Vec<String> = orch.run_turn("remember my pdf").collect().await;
        assert_eq!(fragments, vec!["still here"]);

        let prompt = &provider.prompts()[0];
        assert!(!prompt.contains("User name"));
        assert!(!prompt.contains("Memory facts"));
        assert!(!prompt.contains("Relevant document context"));
    }

    #[tokio::test]
    async fn custom_persona_and_request_settings() {
        let provider = Arc::new(ScriptedProvider::new(&["arr"]));
        let orch = orchestrator(
            provider.clone(),
            Arc::new(InMemoryDocumentIndex::new()),
            Arc::new(InMemoryStore::new()),
        )
        .with_persona("You are a pirate.")
        .with_temperature(0.2)
        .with_max_tokens(64);

        let req = orch.request("p".into());
        assert_eq!(req.model, "mock-model");
        assert!((req.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(req.max_tokens, Some(64));
        assert!(req.stream);

        let _: Vec<String> = orch.run_turn("ahoy").collect().await;
        assert!(provider.prompts()[0].starts_with("You are a pirate.\n"));
    }
}
