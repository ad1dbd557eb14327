//! Persistence layer
//!
//! Single embedded redb file; see [`storage`] for the table layout.

pub mod storage;

pub use storage::{Storage, StorageError, StorageResult};
