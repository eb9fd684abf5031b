//! mail-sentry — automatic urgent-email responder.
//!
//! Polls a mailbox for unread messages on a fixed interval, replies to
//! the ones carrying urgency keywords, and flags processed messages as
//! read.

pub mod classify;
pub mod client;
pub mod config;
pub mod cycle;
pub mod decode;
pub mod error;
pub mod message;
pub mod responder;
pub mod scheduler;
