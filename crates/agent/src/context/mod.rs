//! Grounding context for a single turn.
//!
//! | Section | Source | On failure |
//! |---------|--------|------------|
//! | Memory | profile `name` + all facts | empty snapshot |
//! | Documents | top passages from the index | no excerpt |
//! | Math | the evaluator on the stripped utterance | no result |
//!
//! The assemblers gather each section; the composer renders whatever was
//! gathered into one prompt.

pub mod assembler;
pub mod composer;

pub use assembler::{arithmetic_expression, assemble_arithmetic, assemble_memory, assemble_retrieval, excerpt};
pub use composer::{CLOSING_INSTRUCTION, DEFAULT_PERSONA, PromptSections, compose_prompt};
