//! Idempotency record

use serde::{Deserialize, Serialize};

/// Stored result of one client request id. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub key: String,
    pub resource_type: String,
    pub result: serde_json::Value,
    pub created_at: i64,
}
