//! Cycle orchestrator — one full pass over the unread mailbox.
//!
//! Per cycle: open retrieval session, enumerate unread, then per message
//! fetch → decode → classify → (urgent? reply) → mark read. A failure in
//! any per-message step abandons that message only; the loop continues.
//! The session is closed on every exit path, including enumeration failure.
//!
//! Blocking by design — the scheduler dispatches each run onto a blocking
//! task.

use tracing::{error, info, warn};

use crate::classify::is_urgent;
use crate::client::MailGateway;
use crate::decode::decode;
use crate::responder::send_auto_reply;

/// Counts from one completed pass, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Messages enumerated as unread.
    pub seen: usize,
    /// Auto-replies successfully dispatched.
    pub replied: usize,
    /// Messages abandoned by a per-message failure (left unread).
    pub failed: usize,
}

/// Run one processing cycle against the mailbox.
///
/// Never panics and never propagates errors: open/enumerate failures abort
/// the cycle with an error log, per-message failures are logged and skipped.
/// A message whose reply or mark-read fails stays unread and is retried
/// naturally on the next cycle.
pub fn run_cycle(gateway: &dyn MailGateway, keywords: &[String]) -> CycleStats {
    let mut stats = CycleStats::default();

    let mut session = match gateway.open_retrieval() {
        Ok(s) => s,
        Err(e) => {
            error!("failed to open retrieval session, skipping cycle: {e}");
            return stats;
        }
    };

    match session.list_unread() {
        Ok(ids) if ids.is_empty() => {
            info!("no unread emails found");
        }
        Ok(ids) => {
            info!("found {} unread email(s)", ids.len());
            stats.seen = ids.len();
            for id in &ids {
                if let Err(e) = process_message(gateway, session.as_mut(), id, keywords, &mut stats)
                {
                    warn!(id = %id, "message left unread: {e}");
                    stats.failed += 1;
                }
            }
        }
        Err(e) => {
            error!("failed to enumerate unread emails: {e}");
        }
    }

    session.close();
    stats
}

fn process_message(
    gateway: &dyn MailGateway,
    session: &mut dyn crate::client::RetrievalSession,
    id: &str,
    keywords: &[String],
    stats: &mut CycleStats,
) -> crate::error::Result<()> {
    let raw = session.fetch(id)?;
    let message = decode(&raw);
    info!(sender = %message.sender, subject = %message.subject, "processing email");

    if is_urgent(&message, keywords) {
        info!(sender = %message.sender, "urgent keywords found");
        send_auto_reply(gateway, &message)?;
        stats.replied += 1;
    }

    session.mark_read(id)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::client::RetrievalSession;
    use crate::config::DEFAULT_URGENT_KEYWORDS;
    use crate::error::{MailError, Result};
    use crate::message::{RawMessage, ReplyRecord};

    fn keywords() -> Vec<String> {
        DEFAULT_URGENT_KEYWORDS.iter().map(|s| s.to_string()).collect()
    }

    fn raw_mail(id: &str, subject: &str, body: &str) -> RawMessage {
        let bytes = format!(
            "From: Jane Doe <jane@example.com>\r\nSubject: {subject}\r\n\r\n{body}\r\n"
        )
        .into_bytes();
        RawMessage {
            id: id.to_string(),
            bytes,
        }
    }

    /// Scripted session recording every call.
    #[derive(Default)]
    struct SessionScript {
        unread: Vec<RawMessage>,
        fail_list: bool,
        fail_fetch_ids: Vec<String>,
        fail_mark_ids: Vec<String>,
        fetched: Vec<String>,
        marked: Vec<String>,
        closed: usize,
    }

    struct MockSession<'a> {
        script: &'a Mutex<SessionScript>,
    }

    impl RetrievalSession for MockSession<'_> {
        fn list_unread(&mut self) -> Result<Vec<String>> {
            let script = self.script.lock().unwrap();
            if script.fail_list {
                return Err(MailError::protocol("search", "scripted failure"));
            }
            Ok(script.unread.iter().map(|m| m.id.clone()).collect())
        }

        fn fetch(&mut self, id: &str) -> Result<RawMessage> {
            let mut script = self.script.lock().unwrap();
            script.fetched.push(id.to_string());
            if script.fail_fetch_ids.iter().any(|f| f == id) {
                return Err(MailError::protocol("fetch", "scripted failure"));
            }
            script
                .unread
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| MailError::protocol("fetch", "unknown id"))
        }

        fn mark_read(&mut self, id: &str) -> Result<()> {
            let mut script = self.script.lock().unwrap();
            if script.fail_mark_ids.iter().any(|f| f == id) {
                return Err(MailError::protocol("store", "scripted failure"));
            }
            script.marked.push(id.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.script.lock().unwrap().closed += 1;
        }
    }

    struct MockGateway {
        script: Mutex<SessionScript>,
        opened: Mutex<usize>,
        fail_open: bool,
        fail_send: bool,
        sent: Mutex<Vec<ReplyRecord>>,
    }

    impl MockGateway {
        fn new(script: SessionScript) -> Self {
            Self {
                script: Mutex::new(script),
                opened: Mutex::new(0),
                fail_open: false,
                fail_send: false,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl MailGateway for MockGateway {
        fn open_retrieval(&self) -> Result<Box<dyn RetrievalSession + '_>> {
            *self.opened.lock().unwrap() += 1;
            if self.fail_open {
                return Err(MailError::Connect("scripted failure".into()));
            }
            Ok(Box::new(MockSession {
                script: &self.script,
            }))
        }

        fn send(&self, reply: &ReplyRecord) -> Result<()> {
            if self.fail_send {
                return Err(MailError::protocol("send", "scripted failure"));
            }
            self.sent.lock().unwrap().push(reply.clone());
            Ok(())
        }
    }

    #[test]
    fn empty_mailbox_opens_and_closes_exactly_once() {
        let gateway = MockGateway::new(SessionScript::default());
        let stats = run_cycle(&gateway, &keywords());

        assert_eq!(stats, CycleStats::default());
        assert_eq!(*gateway.opened.lock().unwrap(), 1);
        let script = gateway.script.lock().unwrap();
        assert_eq!(script.closed, 1);
        assert!(script.fetched.is_empty());
        assert!(script.marked.is_empty());
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn fetch_failure_isolates_one_message() {
        let gateway = MockGateway::new(SessionScript {
            unread: vec![
                raw_mail("1", "urgent: server down", "please look"),
                raw_mail("2", "also urgent", "broken"),
                raw_mail("3", "weekly report", "all quiet"),
            ],
            fail_fetch_ids: vec!["2".into()],
            ..Default::default()
        });

        let stats = run_cycle(&gateway, &keywords());

        assert_eq!(stats.seen, 3);
        assert_eq!(stats.replied, 1);
        assert_eq!(stats.failed, 1);
        let script = gateway.script.lock().unwrap();
        assert_eq!(script.marked, vec!["1", "3"]);
        assert_eq!(script.closed, 1);
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn non_urgent_messages_are_flagged_without_reply() {
        let gateway = MockGateway::new(SessionScript {
            unread: vec![raw_mail("1", "weekly report", "all quiet")],
            ..Default::default()
        });

        let stats = run_cycle(&gateway, &keywords());

        assert_eq!(stats.replied, 0);
        assert_eq!(gateway.script.lock().unwrap().marked, vec!["1"]);
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn reply_failure_leaves_message_unread() {
        let mut gateway = MockGateway::new(SessionScript {
            unread: vec![raw_mail("1", "urgent", "now")],
            ..Default::default()
        });
        gateway.fail_send = true;

        let stats = run_cycle(&gateway, &keywords());

        assert_eq!(stats.replied, 0);
        assert_eq!(stats.failed, 1);
        assert!(gateway.script.lock().unwrap().marked.is_empty());
    }

    #[test]
    fn mark_read_failure_still_counts_the_reply() {
        let gateway = MockGateway::new(SessionScript {
            unread: vec![raw_mail("1", "urgent", "now")],
            fail_mark_ids: vec!["1".into()],
            ..Default::default()
        });

        let stats = run_cycle(&gateway, &keywords());

        // Reply went out but the flag failed: next cycle may reply again.
        assert_eq!(stats.replied, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn enumeration_failure_still_closes_session() {
        let gateway = MockGateway::new(SessionScript {
            fail_list: true,
            ..Default::default()
        });

        let stats = run_cycle(&gateway, &keywords());

        assert_eq!(stats, CycleStats::default());
        assert_eq!(gateway.script.lock().unwrap().closed, 1);
    }

    #[test]
    fn open_failure_aborts_cycle_quietly() {
        let mut gateway = MockGateway::new(SessionScript::default());
        gateway.fail_open = true;

        let stats = run_cycle(&gateway, &keywords());

        assert_eq!(stats, CycleStats::default());
        assert_eq!(gateway.script.lock().unwrap().closed, 0);
    }

    #[test]
    fn reply_goes_to_extracted_address() {
        let gateway = MockGateway::new(SessionScript {
            unread: vec![raw_mail("1", "help me", "asap")],
            ..Default::default()
        });

        run_cycle(&gateway, &keywords());

        let sent = gateway.sent.lock().unwrap();
        assert_eq!(sent[0].to, "jane@example.com");
        assert_eq!(sent[0].subject, "Re: help me");
    }
}
