//! Acknowledgement replies — composition and dispatch.

use chrono::Local;
use tracing::info;

use crate::client::MailGateway;
use crate::error::Result;
use crate::message::{DecodedMessage, ReplyRecord};

/// Extract the reply target from a From display string.
///
/// `"Jane Doe <jane@example.com>"` yields `jane@example.com`; a string
/// without angle brackets is used as-is.
pub fn reply_address(sender: &str) -> &str {
    if let Some(open) = sender.find('<')
        && sender.contains('>')
    {
        let rest = &sender[open + 1..];
        return match rest.find('>') {
            Some(close) => &rest[..close],
            None => rest,
        };
    }
    sender
}

/// Compose the acknowledgement for an urgent message.
///
/// Subject is the original prefixed with `Re: `; the body embeds the
/// original subject and a `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn build_reply(message: &DecodedMessage, now: chrono::DateTime<Local>) -> ReplyRecord {
    let timestamp = now.format("%Y-%m-%d %H:%M:%S");
    let body = format!(
        "Hello,\n\n\
         This is an automatic response to your email regarding \"{}\".\n\n\
         I have received your message marked as urgent and will address it as soon as possible.\n\
         Please note that this is an automated reply sent at {}.\n\n\
         If your matter requires immediate attention, please contact me directly by phone.\n\n\
         Best regards,\n\
         Auto Email Responder\n",
        message.subject, timestamp,
    );
    ReplyRecord {
        to: reply_address(&message.sender).to_string(),
        subject: format!("Re: {}", message.subject),
        body,
    }
}

/// Send the acknowledgement for one urgent message.
///
/// One invocation per urgent message per cycle. There is no dedup across
/// cycles: a message whose mark-read failed is reprocessed next cycle and
/// may receive a second reply — an accepted limitation, not prevented here.
pub fn send_auto_reply(gateway: &dyn MailGateway, message: &DecodedMessage) -> Result<()> {
    let reply = build_reply(message, Local::now());
    gateway.send(&reply)?;
    info!(to = %reply.to, "auto-reply sent");
    // Plain console line per dispatched reply, alongside the log stream.
    println!("Replied to: {} - Subject: {}", message.sender, message.subject);
    Ok(())
}
