//! Error types shared across the ingestion pipeline.
//!
//! The taxonomy is deliberately flat:
//! - [`MalformedRecord`] is produced per record by the parser and is always recovered
//!   (the caller logs and skips the record).
//! - [`AdapterError`] ends one adapter instance and moves the owning source to `error`.
//! - [`ConfigError`] covers operating-mode violations such as strict offline.
//! - [`PersistError`] covers the key/value store used for layout and recent lists.
//! - [`StartupError`] is returned when the window cannot be opened at all.

use thiserror::Error;

/// A single raw record could not be turned into a [`Sample`](crate::data::sample::Sample).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("ts must be a string")]
    TimestampNotString,

    #[error("{0} must be a number")]
    ChannelNotNumber(&'static str),

    #[error("invalid ts: {0:?}")]
    InvalidTimestamp(String),
}

/// Configuration / operating-mode errors. These are fatal for the operation that hit them
/// and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "strict offline mode is enabled and no bundled broker client is available; \
         the remote fallback is disabled"
    )]
    StrictOffline,

    #[error("no broker client could be resolved")]
    ClientUnavailable,

    #[error("invalid broker parameters: {0}")]
    InvalidBrokerParams(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Adapter-level failures. Every variant ends the adapter instance and is surfaced as a
/// source state transition; none of them is retried automatically.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("stream closed: {0}")]
    StreamClosed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AdapterError {
    /// Short machine-friendly name used in logs and status lines.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterError::ConnectFailed(_) => "ConnectFailed",
            AdapterError::AuthFailed(_) => "AuthFailed",
            AdapterError::StreamClosed(_) => "StreamClosed",
            AdapterError::Io(_) => "Io",
            AdapterError::Config(_) => "Config",
        }
    }

    /// Whether this error moves the owning source to the `error` state. Every adapter
    /// error does; per-record parse failures are [`MalformedRecord`]s and never reach here.
    pub fn changes_state(&self) -> bool {
        true
    }
}

/// Failures that keep the application window from opening.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to start the I/O runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Ui(#[from] eframe::Error),
}

/// Failures of the persistent key/value store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to access state store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize state: {0}")]
    Json(#[from] serde_json::Error),
}
