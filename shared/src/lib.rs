//! Shared types for the edge node
//!
//! Domain models, the command envelope, real-time events and the closed
//! error enum used by both edge-server and terminals. No I/O.

pub mod command;
pub mod error;
pub mod event;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use command::{CommandEnvelope, CommandOutcome, GatewayOutcome, ServerCommand};
pub use error::{AppError, AppResult, ErrorBody, ErrorKind};
pub use event::{EdgeEvent, EventScope, ScopedEvent};
