//! Message types flowing through the processing cycle.

/// A raw RFC 822 payload as fetched from the mailbox.
///
/// `id` is the endpoint-assigned sequence identifier, only valid within
/// the retrieval session that produced it.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub bytes: Vec<u8>,
}

/// A decoded message — the unit the classifier and responder operate on.
///
/// Missing headers decode to empty strings rather than errors, so every
/// field is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Display form of the From header (`Name <addr>` when a display name
    /// exists, bare address otherwise).
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// Message-ID header, or empty when absent.
    pub message_id: String,
}

/// An outgoing acknowledgement — constructed, sent, discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRecord {
    pub to: String,
    pub subject: String,
    pub body: String,
}
