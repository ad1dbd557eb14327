//! Client error types

use shared::error::ErrorBody;
use thiserror::Error;

/// How a single call to the server failed
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Definitive rejection (4xx). Retrying the same command cannot succeed.
    #[error("Rejected ({status}): {}", body.message)]
    Rejected { status: u16, body: ErrorBody },

    /// Network failure, timeout, throttling or an unavailable upstream.
    /// Safe to retry with the same request id.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The server received the command and failed while handling it (5xx).
    /// Retried like a transient failure, but only a bounded number of times.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Server { .. })
    }
}

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local queue failure
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<redb::DatabaseError> for ClientError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<redb::TransactionError> for ClientError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<redb::TableError> for ClientError {
    fn from(err: redb::TableError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<redb::StorageError> for ClientError {
    fn from(err: redb::StorageError) -> Self {
        Self::Queue(err.to_string())
    }
}

impl From<redb::CommitError> for ClientError {
    fn from(err: redb::CommitError) -> Self {
        Self::Queue(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
