//! Configuration — environment variables plus a minimal `.env` loader.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default urgency keywords, matched case-insensitively as substrings.
pub const DEFAULT_URGENT_KEYWORDS: &[&str] = &["urgent", "help", "asap", "emergency", "important"];

/// Mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub address: String,
    pub password: SecretString,
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub check_interval: Duration,
    pub urgent_keywords: Vec<String>,
}

impl MailConfig {
    /// Build config from environment variables.
    ///
    /// `EMAIL_ADDRESS` and `EMAIL_PASSWORD` are mandatory; everything else
    /// falls back to Gmail defaults and a 10-minute check interval.
    pub fn from_env() -> Result<Self, ConfigError> {
        let address = require_env("EMAIL_ADDRESS")?;
        let password = SecretString::from(require_env("EMAIL_PASSWORD")?);

        let imap_host = std::env::var("IMAP_HOST").unwrap_or_else(|_| "imap.gmail.com".into());
        let imap_port = parse_env_port("IMAP_PORT", 993)?;
        let smtp_host = std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into());
        let smtp_port = parse_env_port("SMTP_PORT", 587)?;

        let check_interval_secs: u64 = match std::env::var("CHECK_INTERVAL_SECS") {
            Ok(s) => s.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CHECK_INTERVAL_SECS".into(),
                message: format!("not a number of seconds: {s:?}"),
            })?,
            Err(_) => 600,
        };

        let urgent_keywords: Vec<String> = match std::env::var("URGENT_KEYWORDS") {
            Ok(list) => list
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_URGENT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            address,
            password,
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            check_interval: Duration::from_secs(check_interval_secs),
            urgent_keywords,
        })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

fn parse_env_port(key: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(key) {
        Ok(s) => s.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("not a port number: {s:?}"),
        }),
        Err(_) => Ok(default),
    }
}

/// Load a `.env`-style file into the process environment.
///
/// `KEY=VALUE` lines, `#` comments and blank lines skipped, split on the
/// first `=`, both sides trimmed. Values already present in the environment
/// are never overridden. A missing file is not an error.
pub fn load_env_file(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let contents = std::fs::read_to_string(path)?;
    for (key, value) in parse_env_file(&contents) {
        if std::env::var_os(&key).is_none() {
            // SAFETY: called once during startup, before any task that
            // reads the environment is running.
            unsafe { std::env::set_var(&key, &value) };
        }
    }
    Ok(())
}

/// Parse `.env` contents into key/value pairs.
pub fn parse_env_file(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
