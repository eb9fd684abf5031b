//! Error types for mail-sentry.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mailbox protocol errors.
///
/// `Auth` is fatal at startup validation and fatal to the current cycle
/// thereafter. `Connect` is fatal to the current cycle. `Protocol` is
/// recovered at the smallest enclosing scope: per-message for
/// fetch/reply/flag, per-cycle for open/enumerate. Decode failures never
/// surface as errors — they degrade to partial content with a warning.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Protocol error during {op}: {reason}")]
    Protocol { op: String, reason: String },
}

impl MailError {
    pub fn protocol(op: &str, reason: impl std::fmt::Display) -> Self {
        Self::Protocol {
            op: op.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for mailbox operations.
pub type Result<T> = std::result::Result<T, MailError>;
