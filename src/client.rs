//! Protocol client — raw IMAP over TLS for retrieval, SMTP via lettre for
//! submission.
//!
//! All operations here are blocking; callers run them on a blocking task
//! (see `scheduler`). The IMAP side speaks just the six commands the cycle
//! needs: LOGIN, SELECT, SEARCH UNSEEN, FETCH RFC822, STORE +FLAGS, LOGOUT.

use std::io::{Read as IoRead, Write as IoWrite};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::config::MailConfig;
use crate::error::{MailError, Result};
use crate::message::{RawMessage, ReplyRecord};

/// An open retrieval session against the monitored mailbox.
///
/// Opened at the start of a cycle, closed on every exit path.
pub trait RetrievalSession: Send {
    /// Enumerate unread message identifiers. Empty is a valid result.
    fn list_unread(&mut self) -> Result<Vec<String>>;

    /// Fetch the raw payload for one identifier.
    fn fetch(&mut self, id: &str) -> Result<RawMessage>;

    /// Flag a message as read, removing it from future enumerations.
    fn mark_read(&mut self, id: &str) -> Result<()>;

    /// Terminate the session. Never fails; errors are logged and dropped.
    fn close(&mut self);
}

/// Gateway to both mailbox protocols.
///
/// A retrieval session is opened per cycle; a submission connection is
/// opened per outgoing reply — cheap enough to do repeatedly, and it keeps
/// cycles free of shared connection state.
pub trait MailGateway: Send + Sync {
    fn open_retrieval(&self) -> Result<Box<dyn RetrievalSession + '_>>;

    fn send(&self, reply: &ReplyRecord) -> Result<()>;
}

// ── IMAP session ────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// A logged-in IMAP session with INBOX selected.
pub struct ImapSession {
    tls: TlsStream,
    tag: u32,
}

impl ImapSession {
    /// Connect, authenticate, and select INBOX.
    pub fn open(config: &MailConfig) -> Result<Self> {
        let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))
            .map_err(|e| MailError::Connect(format!("{}:{}: {e}", config.imap_host, config.imap_port)))?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))
            .map_err(|e| MailError::Connect(e.to_string()))?;

        let tls = tls_handshake(&config.imap_host, tcp)?;
        let mut session = Self { tls, tag: 0 };

        // Server greeting precedes the first command.
        session
            .read_line()
            .map_err(|e| MailError::Connect(format!("no IMAP greeting: {e}")))?;

        let login = session.command(&format!(
            "LOGIN \"{}\" \"{}\"",
            config.address,
            config.password.expose_secret()
        ))?;
        if !tagged_ok(&login) {
            return Err(MailError::Auth("IMAP login rejected".into()));
        }

        let select = session.command("SELECT \"INBOX\"")?;
        if !tagged_ok(&select) {
            return Err(MailError::protocol("select", "SELECT INBOX rejected"));
        }

        debug!(host = %config.imap_host, "IMAP session opened");
        Ok(session)
    }

    /// Issue one tagged command and collect lines up to its tagged response.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        let full = format!("{tag} {cmd}\r\n");
        self.tls
            .write_all(full.as_bytes())
            .and_then(|()| self.tls.flush())
            .map_err(|e| MailError::protocol("write", e))?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.tls.read(&mut byte) {
                Ok(0) => return Err(MailError::protocol("read", "connection closed")),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(MailError::protocol("read", e)),
            }
        }
    }
}

impl RetrievalSession for ImapSession {
    fn list_unread(&mut self) -> Result<Vec<String>> {
        let lines = self.command("SEARCH UNSEEN")?;
        if !tagged_ok(&lines) {
            return Err(MailError::protocol("search", "SEARCH UNSEEN rejected"));
        }
        Ok(lines.iter().flat_map(|l| parse_search_line(l)).collect())
    }

    fn fetch(&mut self, id: &str) -> Result<RawMessage> {
        let lines = self.command(&format!("FETCH {id} RFC822"))?;
        if !tagged_ok(&lines) {
            return Err(MailError::protocol("fetch", format!("FETCH {id} rejected")));
        }
        // Payload sits between the untagged FETCH line and the closing
        // paren + tagged response.
        let raw: String = lines
            .iter()
            .skip(1)
            .take(lines.len().saturating_sub(3))
            .cloned()
            .collect();
        Ok(RawMessage {
            id: id.to_string(),
            bytes: raw.into_bytes(),
        })
    }

    fn mark_read(&mut self, id: &str) -> Result<()> {
        let lines = self.command(&format!("STORE {id} +FLAGS (\\Seen)"))?;
        if !tagged_ok(&lines) {
            return Err(MailError::protocol("store", format!("STORE {id} rejected")));
        }
        debug!(id, "marked message as read");
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.command("LOGOUT") {
            debug!("IMAP logout error (ignored): {e}");
        }
    }
}

fn tls_handshake(host: &str, tcp: TcpStream) -> Result<TlsStream> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| MailError::Connect(format!("invalid server name {host:?}: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| MailError::Connect(e.to_string()))?;
    Ok(rustls::StreamOwned::new(conn, tcp))
}

/// Whether the tagged (final) response line reports OK.
fn tagged_ok(lines: &[String]) -> bool {
    lines
        .last()
        .is_some_and(|l| l.split_whitespace().nth(1) == Some("OK"))
}

/// Pull identifiers out of an untagged `* SEARCH n n n` line.
fn parse_search_line(line: &str) -> Vec<String> {
    if !line.starts_with("* SEARCH") {
        return Vec::new();
    }
    line.split_whitespace()
        .skip(2)
        .map(str::to_string)
        .collect()
}

// ── Gateway ─────────────────────────────────────────────────────────

/// Production gateway: IMAP for retrieval, SMTP over STARTTLS for
/// submission.
pub struct ImapSmtpGateway {
    config: MailConfig,
}

impl ImapSmtpGateway {
    /// Construct the gateway, eagerly opening and closing one session of
    /// each kind to validate the credentials. Failure here is fatal to
    /// startup rather than surfacing at the first scheduled cycle.
    pub fn new(config: MailConfig) -> Result<Self> {
        let gateway = Self { config };
        gateway.validate_credentials()?;
        Ok(gateway)
    }

    fn validate_credentials(&self) -> Result<()> {
        let mut session = ImapSession::open(&self.config)?;
        session.close();

        let transport = self.smtp_transport()?;
        match transport.test_connection() {
            Ok(true) => Ok(()),
            Ok(false) => Err(MailError::Connect("SMTP connection test failed".into())),
            Err(e) => Err(smtp_error(e)),
        }
    }

    fn smtp_transport(&self) -> Result<SmtpTransport> {
        // starttls_relay performs the explicit upgrade handshake before
        // authenticating.
        Ok(SmtpTransport::starttls_relay(&self.config.smtp_host)
            .map_err(|e| MailError::Connect(format!("SMTP relay: {e}")))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.address.clone(),
                self.config.password.expose_secret().to_string(),
            ))
            .build())
    }
}

impl MailGateway for ImapSmtpGateway {
    fn open_retrieval(&self) -> Result<Box<dyn RetrievalSession + '_>> {
        Ok(Box::new(ImapSession::open(&self.config)?))
    }

    fn send(&self, reply: &ReplyRecord) -> Result<()> {
        let email = lettre::Message::builder()
            .from(
                self.config
                    .address
                    .parse()
                    .map_err(|e| MailError::protocol("send", format!("from address: {e}")))?,
            )
            .to(reply
                .to
                .parse()
                .map_err(|e| MailError::protocol("send", format!("to address {:?}: {e}", reply.to)))?)
            .subject(&reply.subject)
            .body(reply.body.clone())
            .map_err(|e| MailError::protocol("send", format!("build message: {e}")))?;

        // Fresh connection per reply; dropped (and thus closed) on return.
        let transport = self.smtp_transport()?;
        transport
            .send(&email)
            .map_err(|e| MailError::protocol("send", e))?;
        Ok(())
    }
}

fn smtp_error(e: lettre::transport::smtp::Error) -> MailError {
    if e.is_permanent() {
        MailError::Auth(format!("SMTP rejected credentials: {e}"))
    } else {
        MailError::Connect(format!("SMTP: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_ok_accepts_final_ok_line() {
        let lines = vec![
            "* SEARCH 1 2\r\n".to_string(),
            "A3 OK SEARCH completed\r\n".to_string(),
        ];
        assert!(tagged_ok(&lines));
    }

    #[test]
    fn tagged_ok_rejects_no_and_bad() {
        assert!(!tagged_ok(&["A1 NO [AUTHENTICATIONFAILED]\r\n".to_string()]));
        assert!(!tagged_ok(&["A1 BAD parse error\r\n".to_string()]));
        assert!(!tagged_ok(&[]));
    }

    #[test]
    fn search_line_yields_ids() {
        assert_eq!(
            parse_search_line("* SEARCH 4 8 15\r\n"),
            vec!["4", "8", "15"]
        );
    }

    #[test]
    fn search_line_empty_result() {
        assert!(parse_search_line("* SEARCH\r\n").is_empty());
    }

    #[test]
    fn search_line_ignores_other_untagged() {
        assert!(parse_search_line("* 3 EXISTS\r\n").is_empty());
    }
}
