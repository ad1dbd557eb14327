//! Error kind classification

use serde::{Deserialize, Serialize};

/// Error kind
///
/// Exhaustive classification of [`AppError`](super::AppError) variants.
/// Clients use it to decide whether a failed command may be retried:
/// only [`ErrorKind::Internal`] is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    Unauthorized,
    Conflict,
    RateLimited,
    Internal,
}

impl ErrorKind {
    /// Whether a client should retry the same command later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Internal)
    }
}
