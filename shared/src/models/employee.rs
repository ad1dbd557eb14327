//! Staff Model

use serde::{Deserialize, Serialize};

use super::Role;

/// Staff member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    /// argon2 PHC string, never sent to clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub created_at: i64,
}

impl Staff {
    /// Copy without credentials, for responses
    pub fn public(&self) -> Staff {
        Staff {
            password_hash: None,
            ..self.clone()
        }
    }
}

/// Create staff payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffCreate {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub password: Option<String>,
}

/// Login payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}
