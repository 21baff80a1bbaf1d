//! Memory traits: the user profile, extracted facts and the turn log.
//!
//! Three narrow stores back the assistant's memory:
//! - a key-value profile (`name`, ...)
//! - an append-only log of `(category, label, value)` facts
//! - a per-thread ordered message log, written by the caller after a turn

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::{ConversationTurn, Message, ThreadId};

/// Profile key holding the user's name.
pub const PROFILE_NAME: &str = "name";

/// A single extracted fact about the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Broad grouping, e.g. "friend" or "teacher"
    pub category: String,

    /// What the value is, e.g. "friend_name"
    pub label: String,

    /// The remembered value
    pub value: String,
}

impl Fact {
    pub fn new(
        category: impl Into<String>,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A point-in-time view of the user's memory, fetched fresh every turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// The stored user name, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Facts in insertion order
    #[serde(default)]
    pub facts: Vec<Fact>,
}

impl MemorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.facts.is_empty()
    }
}

/// Key-value user profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up a profile value.
    async fn get_profile(&self, key: &str) -> std::result::Result<Option<String>, MemoryError>;

    /// Insert or replace a profile value.
    async fn set_profile(&self, key: &str, value: &str) -> std::result::Result<(), MemoryError>;
}

/// Append-only fact log.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// All facts, oldest first.
    async fn get_facts(&self) -> std::result::Result<Vec<Fact>, MemoryError>;

    /// Facts of one category, oldest first.
    async fn get_facts_in(&self, category: &str) -> std::result::Result<Vec<Fact>, MemoryError> {
        Ok(self
            .get_facts()
            .await?
            .into_iter()
            .filter(|f| f.category == category)
            .collect())
    }

    /// Append a fact.
    async fn add_fact(&self, fact: Fact) -> std::result::Result<(), MemoryError>;

    /// Remove every fact.
    async fn clear_facts(&self) -> std::result::Result<(), MemoryError>;
}

/// Per-thread ordered message log.
///
/// Owned by the caller: the orchestrator never writes to it.
#[async_trait]
pub trait TurnLog: Send + Sync {
    /// Persist one completed turn as a user message followed by an
    /// assistant message.
    async fn save_turn(&self, turn: &ConversationTurn) -> std::result::Result<(), MemoryError>;

    /// All messages of a thread in the order they were saved.
    async fn load_history(&self, thread_id: &ThreadId) -> std::result::Result<Vec<Message>, MemoryError>;

    /// Delete a thread's messages.
    async fn clear_history(&self, thread_id: &ThreadId) -> std::result::Result<(), MemoryError>;

    /// Threads with saved messages, most recently written first, at most
    /// `limit` of them.
    async fn recent_threads(&self, limit: usize) -> std::result::Result<Vec<ThreadId>, MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snap = MemorySnapshot::default();
        assert!(snap.is_empty());

        let snap = MemorySnapshot {
            name: Some("Asha".into()),
            facts: vec![],
        };
        assert!(!snap.is_empty());
    }

    #[test]
    fn fact_serialization() {
        let fact = Fact::new("friend", "friend_name", "Ravi");
        let json = serde_json::to_string(&fact).unwrap();
        assert!(json.contains(r#""category":"friend""#));
        assert!(json.contains("Ravi"));
    }
}
