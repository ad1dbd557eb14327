//! Terminal Model

use serde::{Deserialize, Serialize};

/// Point-of-sale device identified by a stable code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: String,
    pub code: String,
    pub registered_at: i64,
}

/// Register terminal payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalRegister {
    pub code: String,
}
