//! Role Model

use serde::{Deserialize, Serialize};

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cashier,
    Waiter,
    Kitchen,
    Bar,
    Manager,
    Admin,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Cashier,
        Role::Waiter,
        Role::Kitchen,
        Role::Bar,
        Role::Manager,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cashier => "cashier",
            Self::Waiter => "waiter",
            Self::Kitchen => "kitchen",
            Self::Bar => "bar",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Manager-level authority (void, variance approval)
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Manager | Self::Admin)
    }
}
