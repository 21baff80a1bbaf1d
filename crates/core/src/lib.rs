//! # Nova Core
//!
//! Domain types, traits, and error definitions for the Nova assistant.
//! This crate has **zero framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the turn core is defined as a trait here: the
//! generative model, the document index, and the memory stores.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use error::{Error, EvalError, MemoryError, ProviderError, Result, RetrievalError};
pub use memory::{Fact, FactStore, MemorySnapshot, ProfileStore, TurnLog};
pub use message::{ConversationTurn, Message, Role, ThreadId};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use retrieval::{DocumentIndex, Passage};
