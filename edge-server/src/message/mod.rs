//! Event fan-out
//!
//! - [`EventBus`]: in-process broadcast of scoped events
//! - [`Outbox`] / [`Effects`]: side effects staged during a command and
//!   dispatched after commit

pub mod bus;
pub mod outbox;

pub use bus::{EventBus, ScopedReceiver};
pub use outbox::{Effects, Outbox};
