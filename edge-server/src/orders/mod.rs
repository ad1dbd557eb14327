//! Order State Machine
//!
//! ```text
//! pending → preparing → ready → awaiting_payment → served
//!    └──→ cancelled          (preparing|ready|awaiting_payment → cancelled: void, elevated)
//! ```
//!
//! - [`OrdersManager`]: lifecycle, items, payments
//! - [`Catalog`]: product lookup for item pricing

pub mod catalog;
pub mod manager;

pub use catalog::Catalog;
pub use manager::OrdersManager;
