//! Durable offline queue
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `pending_mutations` | `seq` (u64) | `QueuedMutation` (JSON) |
//! | `dead_mutations` | `seq` (u64) | `DeadMutation` (JSON) |
//! | `queue_meta` | name | u64 |
//!
//! `seq` comes from a persisted counter and is never reused, so key order is
//! enqueue order even across restarts. Items leave the queue through
//! [`OfflineQueue::remove`] after the server gave a definitive answer, or
//! through [`OfflineQueue::dead_letter`] once the server kept failing on them.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::command::CommandEnvelope;

use crate::error::{ClientError, ClientResult};

const PENDING: TableDefinition<u64, &[u8]> = TableDefinition::new("pending_mutations");
const DEAD: TableDefinition<u64, &[u8]> = TableDefinition::new("dead_mutations");
const META: TableDefinition<&str, u64> = TableDefinition::new("queue_meta");
const NEXT_SEQ: &str = "next_seq";

/// One mutation waiting for the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub seq: u64,
    /// Idempotency key, identical on every replay
    pub client_request_id: String,
    pub envelope: CommandEnvelope,
    pub enqueued_at: i64,
    /// Transient failures so far
    pub attempts: u32,
    /// How many of those were 5xx answers from the server
    #[serde(default)]
    pub server_errors: u32,
}

/// A queued command the server failed on too many times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadMutation {
    pub mutation: QueuedMutation,
    pub reason: String,
    pub dead_at: i64,
}

#[derive(Clone)]
pub struct OfflineQueue {
    db: Arc<Database>,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue").finish_non_exhaustive()
    }
}

impl OfflineQueue {
    /// Open or create the queue file
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    pub fn open_in_memory() -> ClientResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> ClientResult<Self> {
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(PENDING)?;
            let _ = txn.open_table(DEAD)?;
            let _ = txn.open_table(META)?;
        }
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Append behind every existing item. The envelope must carry its request id.
    pub fn enqueue(&self, envelope: CommandEnvelope) -> ClientResult<QueuedMutation> {
        let client_request_id = envelope
            .client_request_id
            .clone()
            .ok_or_else(|| ClientError::Config("queued command needs a client_request_id".into()))?;

        let txn = self.db.begin_write()?;
        let item = {
            let mut meta = txn.open_table(META)?;
            let seq = meta.get(NEXT_SEQ)?.map(|v| v.value()).unwrap_or(1);
            meta.insert(NEXT_SEQ, seq + 1)?;

            let item = QueuedMutation {
                seq,
                client_request_id,
                envelope,
                enqueued_at: shared::util::now_millis(),
                attempts: 0,
                server_errors: 0,
            };
            let bytes = serde_json::to_vec(&item)?;
            txn.open_table(PENDING)?.insert(seq, bytes.as_slice())?;
            item
        };
        txn.commit()?;

        tracing::debug!(seq = item.seq, client_request_id = %item.client_request_id, "Mutation queued");
        Ok(item)
    }

    /// Oldest item, if any
    pub fn peek(&self) -> ClientResult<Option<QueuedMutation>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PENDING)?;
        match table.first()? {
            Some((_, value)) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Drop an item after a definitive server result
    pub fn remove(&self, seq: u64) -> ClientResult<bool> {
        let txn = self.db.begin_write()?;
        let existed = txn.open_table(PENDING)?.remove(seq)?.is_some();
        txn.commit()?;
        Ok(existed)
    }

    /// Count a transient failure against an item, keeping its position
    pub fn record_attempt(&self, seq: u64) -> ClientResult<Option<QueuedMutation>> {
        self.bump(seq, false)
    }

    /// Count a 5xx answer against an item, keeping its position
    pub fn record_server_error(&self, seq: u64) -> ClientResult<Option<QueuedMutation>> {
        self.bump(seq, true)
    }

    fn bump(&self, seq: u64, server_error: bool) -> ClientResult<Option<QueuedMutation>> {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(PENDING)?;
            let current: Option<QueuedMutation> = match table.get(seq)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            match current {
                Some(mut item) => {
                    item.attempts += 1;
                    if server_error {
                        item.server_errors += 1;
                    }
                    let bytes = serde_json::to_vec(&item)?;
                    table.insert(seq, bytes.as_slice())?;
                    Some(item)
                }
                None => None,
            }
        };
        txn.commit()?;
        Ok(updated)
    }

    /// Move an item out of the pending queue, in one transaction
    pub fn dead_letter(&self, seq: u64, reason: &str) -> ClientResult<Option<DeadMutation>> {
        let txn = self.db.begin_write()?;
        let dead = {
            let mut pending = txn.open_table(PENDING)?;
            let removed = pending.remove(seq)?.map(|v| v.value().to_vec());
            match removed {
                Some(raw) => {
                    let dead = DeadMutation {
                        mutation: serde_json::from_slice(&raw)?,
                        reason: reason.to_string(),
                        dead_at: shared::util::now_millis(),
                    };
                    let bytes = serde_json::to_vec(&dead)?;
                    txn.open_table(DEAD)?.insert(seq, bytes.as_slice())?;
                    Some(dead)
                }
                None => None,
            }
        };
        txn.commit()?;
        if let Some(dead) = &dead {
            tracing::warn!(seq, client_request_id = %dead.mutation.client_request_id, reason, "Mutation dead-lettered");
        }
        Ok(dead)
    }

    /// Dead-lettered items, oldest first
    pub fn dead_letters(&self) -> ClientResult<Vec<DeadMutation>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DEAD)?;
        let mut items = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            items.push(serde_json::from_slice(value.value())?);
        }
        Ok(items)
    }

    /// Every pending item in FIFO order
    pub fn all(&self) -> ClientResult<Vec<QueuedMutation>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PENDING)?;
        let mut items = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            items.push(serde_json::from_slice(value.value())?);
        }
        Ok(items)
    }

    pub fn len(&self) -> ClientResult<u64> {
        let txn = self.db.begin_read()?;
        Ok(txn.open_table(PENDING)?.len()?)
    }

    pub fn is_empty(&self) -> ClientResult<bool> {
        Ok(self.len()? == 0)
    }
}
