//! Edge Client - terminal-side offline sync for the edge node
//!
//! A terminal keeps taking orders while the edge server is unreachable.
//! Mutations are queued durably in a local redb file and replayed strictly
//! FIFO on reconnect. Every queued item carries its client request id, which
//! the server uses as the idempotency key, so a replay never double-applies.
//!
//! - [`SyncEngine`] - submit / drain / run loop
//! - [`OfflineQueue`] - durable FIFO
//! - [`CommandTransport`] - how commands reach the server ([`HttpTransport`], [`OneshotTransport`])

pub mod config;
pub mod engine;
pub mod error;
pub mod queue;
pub mod transport;

pub use config::SyncConfig;
pub use engine::{Connectivity, DrainOutcome, SubmitResult, SyncEngine, SyncEvent};
pub use error::{ClientError, ClientResult, TransportError};
pub use queue::{DeadMutation, OfflineQueue, QueuedMutation};
pub use transport::{CommandTransport, HttpTransport, OneshotTransport};
