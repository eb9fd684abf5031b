//! Urgency classification — pure keyword matching, no I/O.

use crate::message::DecodedMessage;

/// Whether the subject or body contains any urgency keyword.
///
/// Case-insensitive substring match, not word-boundary match, so
/// "asapproval" matches "asap". That quirk is inherited behavior and kept
/// deliberately.
pub fn is_urgent(message: &DecodedMessage, keywords: &[String]) -> bool {
    contains_any(&message.subject, keywords) || contains_any(&message.body, keywords)
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k.as_str()))
}
