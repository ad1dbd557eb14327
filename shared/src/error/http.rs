//! HTTP status mapping and wire format

use http::StatusCode;
use serde::{Deserialize, Serialize};

use super::category::ErrorKind;
use super::types::AppError;

impl ErrorKind {
    /// HTTP status for this kind
    ///
    /// | Kind | Status |
    /// |------|--------|
    /// | NotFound | 404 |
    /// | InvalidState, Conflict | 409 |
    /// | Validation | 400 |
    /// | Unauthorized | 403 |
    /// | RateLimited | 429 |
    /// | Internal | 500 |
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidState | Self::Conflict => StatusCode::CONFLICT,
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
///
/// ```json
/// { "code": "TABLE_OCCUPIED", "kind": "conflict", "message": "...", "details": { "order_id": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        let details = match err {
            AppError::NotFound { entity, id } => serde_json::json!({ "entity": entity, "id": id }),
            AppError::InvalidTransition { order_id, from, to } => {
                serde_json::json!({ "order_id": order_id, "from": from, "to": to })
            }
            AppError::ImmutableOrder { order_id, status } => {
                serde_json::json!({ "order_id": order_id, "status": status })
            }
            AppError::Unauthorized { actor_id, required } => {
                serde_json::json!({ "actor_id": actor_id, "required": required })
            }
            AppError::TableOccupied {
                table_id,
                order_id,
                terminal_id,
            } => serde_json::json!({
                "table_id": table_id,
                "order_id": order_id,
                "terminal_id": terminal_id,
            }),
            AppError::RateLimited { retry_after_secs } => {
                serde_json::json!({ "retry_after_secs": retry_after_secs })
            }
            AppError::InvalidState(_)
            | AppError::Validation(_)
            | AppError::InvalidCredentials
            | AppError::Storage(_)
            | AppError::Internal(_) => serde_json::Value::Null,
        };

        // Internal failures keep their detail in the server log only
        let message = match err.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => err.to_string(),
        };

        Self {
            code: err.code().to_string(),
            kind: err.kind(),
            message,
            details,
        }
    }
}

// ===== Axum Integration =====

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let kind = self.kind();
        if kind == ErrorKind::Internal {
            tracing::error!(code = self.code(), error = %self, "System error occurred");
        }
        (kind.http_status(), axum::Json(ErrorBody::from(&self))).into_response()
    }
}
