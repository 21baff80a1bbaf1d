//! Context assemblers: memory, retrieval and arithmetic.
//!
//! Each assembler returns an empty or absent value instead of an error.
//! Collaborator failures are logged and the turn carries on without that
//! section; one failing assembler never blocks the others.

use nova_core::memory::{FactStore, MemorySnapshot, PROFILE_NAME, ProfileStore};
use nova_core::retrieval::{DocumentIndex, Passage};
use nova_tools::Value;
use tracing::{debug, warn};

/// Fetch the user's name and every stored fact.
///
/// Any store failure yields an empty snapshot, never a partial one.
pub async fn assemble_memory(profile: &dyn ProfileStore, facts: &dyn FactStore) -> MemorySnapshot {
    let name = match profile.get_profile(PROFILE_NAME).await {
        Ok(name) => name,
        Err(e) => {
            warn!(error = %e, "Profile lookup failed; continuing without memory");
            return MemorySnapshot::default();
        }
    };

    match facts.get_facts().await {
        Ok(facts) => MemorySnapshot { name, facts },
        Err(e) => {
            warn!(error = %e, "Fact lookup failed; continuing without memory");
            MemorySnapshot::default()
        }
    }
}

/// Ask the index for up to `limit` passages relevant to `utterance`.
///
/// An empty index, or a failing one, contributes nothing.
pub async fn assemble_retrieval(index: &dyn DocumentIndex, utterance: &str, limit: usize) -> Vec<Passage> {
    match index.count().await {
        Ok(0) => {
            debug!(index = index.name(), "No documents indexed");
            return vec![];
        }
        Ok(_) => {}
        Err(e) => {
            warn!(index = index.name(), error = %e, "Document count failed; skipping retrieval");
            return vec![];
        }
    }

    match index.query(utterance, limit).await {
        Ok(passages) => {
            debug!(index = index.name(), passages = passages.len(), "Retrieved passages");
            passages
        }
        Err(e) => {
            warn!(index = index.name(), error = %e, "Document query failed; skipping retrieval");
            vec![]
        }
    }
}

/// Join passage texts, best first, into a single excerpt.
///
/// `None` when the joined text is empty.
pub fn excerpt(passages: &[Passage]) -> Option<String> {
    let joined = passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    (!joined.is_empty()).then_some(joined)
}

/// The expression left after removing the command words from an utterance.
///
/// Only `calculate` and `what is` are removed; trailing punctuation stays
/// and makes the evaluator reject the input.
pub fn arithmetic_expression(utterance: &str) -> String {
    utterance
        .to_lowercase()
        .replace("calculate", "")
        .replace("what is", "")
        .trim()
        .to_string()
}

/// Evaluate the arithmetic in `utterance`, if there is any.
pub fn assemble_arithmetic(utterance: &str) -> Option<Value> {
    nova_tools::evaluate_logged(&arithmetic_expression(utterance)).ok()
}
