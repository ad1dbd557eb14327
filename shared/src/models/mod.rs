//! Data models
//!
//! Shared between edge-server and terminals (via API). All IDs are strings.

pub mod audit;
pub mod dining_table;
pub mod employee;
pub mod idempotency;
pub mod order;
pub mod payment;
pub mod product;
pub mod role;
pub mod shift;
pub mod terminal;

// Re-exports
pub use audit::*;
pub use dining_table::*;
pub use employee::*;
pub use idempotency::*;
pub use order::*;
pub use payment::*;
pub use product::*;
pub use role::*;
pub use shift::*;
pub use terminal::*;
