//! Error types for placement-alert.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Attachment error: {0}")]
    Attachment(#[from] AttachmentError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mailbox errors. Any of these aborts the current poll cycle only.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Mailbox {host} unreachable: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Authentication failed for mailbox {host}")]
    AuthFailed { host: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("Mailbox task failed: {0}")]
    TaskFailed(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Failures of the LLM-backed placement classifier.
///
/// Every variant is recoverable: the analyzer substitutes the keyword fallback.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// No provider was configured at startup; no request was attempted.
    #[error("Classifier unavailable: {reason}")]
    Unavailable { reason: String },

    /// The provider call itself failed (network, quota, auth).
    #[error("Classifier transport failure: {0}")]
    Transport(#[from] LlmError),

    /// The provider answered, but not with a usable classification.
    #[error("Classifier returned unusable output: {reason}")]
    Format { reason: String },
}

impl ClassifierError {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::Transport(_) => "transport",
            Self::Format { .. } => "format",
        }
    }
}

/// Per-attachment scan failures. Never abort the batch.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("Failed to parse spreadsheet {filename}: {reason}")]
    Parse { filename: String, reason: String },

    #[error("Transient storage failure for {filename}: {source}")]
    Io {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outbound delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to deliver on {channel}: {reason}")]
    SendFailed { channel: String, reason: String },

    #[error("{channel} rejected message with status {status}: {body}")]
    Rejected {
        channel: String,
        status: u16,
        body: String,
    },
}

/// Profile update errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("No recognized non-empty profile fields in update (rejected: {rejected:?})")]
    NoRecognizedFields { rejected: Vec<String> },
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
