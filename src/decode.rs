//! MIME decoding — raw payload to `DecodedMessage`.
//!
//! Decoding never fails: an unparseable payload or body part degrades to
//! empty/partial content with a warning, so one malformed message can never
//! abort a cycle.

use mail_parser::{MessageParser, MessagePart, MimeHeaders};
use tracing::warn;

use crate::message::{DecodedMessage, RawMessage};

/// Decode a raw payload into a structured message.
///
/// Body = concatenation of the plain-text body parts only; parts with an
/// attachment disposition never contribute. RFC 2047 header fragments are
/// decoded by the parser. A missing From, Subject, or Message-ID yields an
/// empty string for that field.
pub fn decode(raw: &RawMessage) -> DecodedMessage {
    let Some(parsed) = MessageParser::default().parse(&raw.bytes) else {
        warn!(id = %raw.id, "unparseable message payload, decoding as empty");
        return DecodedMessage {
            sender: String::new(),
            subject: String::new(),
            body: String::new(),
            message_id: String::new(),
        };
    };

    let mut body = String::new();
    for part in parsed.text_bodies() {
        if !is_plain_text(part) {
            continue;
        }
        match part.text_contents() {
            Some(text) => body.push_str(text),
            None => warn!(id = %raw.id, "skipping undecodable body part"),
        }
    }

    DecodedMessage {
        sender: sender_display(&parsed),
        subject: parsed.subject().unwrap_or_default().to_string(),
        body,
        message_id: parsed.message_id().unwrap_or_default().to_string(),
    }
}

/// Plain-text check; an absent Content-Type defaults to text/plain.
fn is_plain_text(part: &MessagePart) -> bool {
    match part.content_type() {
        None => true,
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().is_none_or(|s| s.eq_ignore_ascii_case("plain"))
        }
    }
}

/// Display form of the From header: `Name <addr>` when a display name
/// exists, the bare address otherwise, empty when absent.
fn sender_display(parsed: &mail_parser::Message) -> String {
    let Some(addr) = parsed.from().and_then(|a| a.first()) else {
        return String::new();
    };
    match (addr.name(), addr.address()) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (None, Some(email)) => email.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}
