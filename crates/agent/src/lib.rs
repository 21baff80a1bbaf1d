//! The turn core of Nova.
//!
//! A single user utterance goes through one pass:
//!
//! 1. **Detect** which capabilities the utterance needs (keyword rules)
//! 2. **Assemble** memory, document excerpts and an arithmetic result
//! 3. **Compose** one grounding prompt from whatever was found
//! 4. **Stream** the provider's answer back fragment by fragment
//!
//! Every collaborator failure before step 4 degrades to a missing prompt
//! section. Failures during step 4 become a single `[Error: ...]` fragment,
//! so a turn never returns an error to its caller.

pub mod context;
pub mod detector;
pub mod orchestrator;
pub mod quick_facts;

#[cfg(test)]
mod test_helpers;

pub use context::{DEFAULT_PERSONA, compose_prompt};
pub use detector::{CapabilityFlags, detect};
pub use orchestrator::{TurnOrchestrator, TurnStream};
pub use quick_facts::{QuickFact, capture};
