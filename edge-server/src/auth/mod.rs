//! 认证与授权
//!
//! - [`RoleService`]: `assert_role(actor_id, allowed)` before every mutation
//! - [`StaffDirectory`]: staff records, argon2 passwords
//! - [`LoginRateLimiter`]: store-backed per-username login window

pub mod password;
pub mod rate_limit;
pub mod roles;

pub use rate_limit::LoginRateLimiter;
pub use roles::{RoleService, StaffDirectory};
