//! Prompt composition.
//!
//! # Determinism
//!
//! Composition is a pure function of its inputs: identical sections always
//! produce a byte-identical prompt. Absent sections leave no trace, not even
//! an empty heading.

use nova_core::memory::MemorySnapshot;
use nova_tools::Value;

/// Persona line used when none is configured.
pub const DEFAULT_PERSONA: &str = "You are Nova, a helpful and factual AI assistant.";

/// Final line of every prompt.
pub const CLOSING_INSTRUCTION: &str =
    "Provide the best possible answer without mentioning tool usage unless helpful.";

/// Everything the composer may put into a prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptSections<'a> {
    /// Opening persona line.
    pub persona: &'a str,
    /// The user's utterance, verbatim.
    pub utterance: &'a str,
    /// Name and facts; an empty snapshot adds nothing.
    pub memory: &'a MemorySnapshot,
    /// Joined document passages.
    pub excerpt: Option<&'a str>,
    /// Result of the arithmetic in the utterance.
    pub arithmetic: Option<&'a Value>,
}

/// Render the grounding prompt for one turn.
pub fn compose_prompt(sections: &PromptSections<'_>) -> String {
    let mut lines = vec![sections.persona.to_string(), String::new()];

    if let Some(name) = sections.memory.name.as_deref().filter(|n| !n.is_empty()) {
        lines.push(format!("User name: {name}."));
    }
    if !sections.memory.facts.is_empty() {
        let facts = sections
            .memory
            .facts
            .iter()
            .map(|f| format!("{}/{}: {}", f.category, f.label, f.value))
            .collect::<Vec<_>>()
            .join("; ");
        lines.push(format!("Memory facts: {facts}"));
    }

    if let Some(excerpt) = sections.excerpt.filter(|e| !e.is_empty()) {
        lines.push(format!("\nRelevant document context:\n{excerpt}"));
    }
    if let Some(value) = sections.arithmetic {
        lines.push(format!("\nMath result: {value}"));
    }

    lines.push(format!("\nUser: {}", sections.utterance));
    lines.push(CLOSING_INSTRUCTION.to_string());

    lines.join("\n")
}
