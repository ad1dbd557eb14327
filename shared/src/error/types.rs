//! Error types

use thiserror::Error;

use super::category::ErrorKind;
use crate::models::{OrderStatus, Role};

/// Application error
///
/// Every variant carries the structured payload needed to render it, so the
/// boundary layer never has to parse messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Order / product / shift / staff / table / terminal absent
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Disallowed status edge
    #[error("Invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Item mutation on an order that already left `pending`
    #[error("Order {order_id} is {status} and can no longer be modified")]
    ImmutableOrder {
        order_id: String,
        status: OrderStatus,
    },

    /// Other state preconditions (unfinished orders, closed shift, ...)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed quantity / amount / missing field
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Actor role not permitted
    #[error("Staff {actor_id} is not permitted (requires one of: {})", format_roles(.required))]
    Unauthorized {
        actor_id: String,
        required: Vec<Role>,
    },

    /// Login failed (unknown user or wrong password)
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Table already held by a different open order
    #[error("Table {table_id} is already occupied by order {order_id} (terminal {terminal_id})")]
    TableOccupied {
        table_id: String,
        order_id: String,
        terminal_id: String,
    },

    /// Too many login attempts within the window
    #[error("Too many attempts, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Backing store failure
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Money arithmetic left the representable range
    pub fn amount_overflow(field: &str) -> Self {
        Self::Validation(format!("{field} exceeds the supported amount range"))
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn unauthorized(actor_id: impl Into<String>, required: &[Role]) -> Self {
        Self::Unauthorized {
            actor_id: actor_id.into(),
            required: required.to_vec(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classification used for status codes and client retry policy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidTransition { .. } | Self::ImmutableOrder { .. } | Self::InvalidState(_) => {
                ErrorKind::InvalidState
            }
            Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthorized { .. } | Self::InvalidCredentials => ErrorKind::Unauthorized,
            Self::TableOccupied { .. } => ErrorKind::Conflict,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Storage(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ImmutableOrder { .. } => "IMMUTABLE_ORDER",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::TableOccupied { .. } => "TABLE_OCCUPIED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result alias used throughout the edge node
pub type AppResult<T> = Result<T, AppError>;

// ========== Storage conversions ==========

macro_rules! storage_error_from {
    ($($err:ty),+ $(,)?) => {
        $(
            impl From<$err> for AppError {
                fn from(err: $err) -> Self {
                    tracing::error!(error = %err, "Storage failure");
                    AppError::Storage(err.to_string())
                }
            }
        )+
    };
}

storage_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
