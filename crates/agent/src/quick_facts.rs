//! Quick fact capture.
//!
//! Two fixed sentence shapes are recognised before a turn reaches the
//! model: naming a friend and naming a teacher. The caller stores the
//! captured fact, replies with the canned acknowledgement and skips the
//! model for that utterance.
//!
//! The keyword checks are case-insensitive but the value is cut from the
//! original text at the case-sensitive marker, so capitalisation of the
//! name survives.

use nova_core::memory::Fact;

/// A fact captured from an utterance, plus the reply to show for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickFact {
    pub fact: Fact,
    pub reply: String,
}

/// Try to capture a friend's or teacher's name from `utterance`.
///
/// A friend sentence that has nothing after `name is` captures nothing and
/// does not fall through to the teacher rule.
pub fn capture(utterance: &str) -> Option<QuickFact> {
    let lower = utterance.to_lowercase();

    if lower.contains("friend") && lower.contains("name is") {
        let name = after_last(utterance, "name is").split_whitespace().next()?;
        return Some(QuickFact {
            fact: Fact::new("friend", "friend_name", name),
            reply: format!("Got it — I’ll remember your friend's name is {name}."),
        });
    }

    if lower.contains("teacher") && (lower.contains("is") || lower.contains("sir")) {
        let teacher = if lower.contains("is") {
            after_last(utterance, "is").trim()
        } else {
            utterance
        };
        if teacher.is_empty() {
            return None;
        }
        return Some(QuickFact {
            fact: Fact::new("teacher", "teacher_name", teacher),
            reply: format!("Thanks — I’ll remember that {teacher} is your teacher."),
        });
    }

    None
}

/// The text after the last occurrence of `marker`, or all of `text` when
/// the marker does not occur with that exact case.
fn after_last<'a>(text: &'a str, marker: &str) -> &'a str {
    text.rsplit_once(marker).map_or(text, |(_, rest)| rest)
}
