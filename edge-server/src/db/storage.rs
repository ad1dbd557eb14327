//! redb-based storage for the edge node
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order rows |
//! | `payments` | `payment_id` | `Payment` | Payment rows |
//! | `order_payments` | `(order_id, payment_id)` | `()` | Payments per order |
//! | `shift_open_orders` | `(shift_id, order_id)` | `()` | Non-terminal orders per shift |
//! | `shifts` | `shift_id` | `Shift` | Shift rows |
//! | `shift_ledgers` | `shift_id` | `ShiftLedger` | Running totals |
//! | `active_shifts` | `staff_id` | `shift_id` | At most one active shift per staff |
//! | `table_occupancy` | `table_id` | `TableOccupancy` | At most one holder per table |
//! | `idempotency` | `resource_type:key` | `IdempotencyRecord` | Stored command results |
//! | `terminals` / `terminal_codes` | `terminal_id` / `code` | `Terminal` / `terminal_id` | Registry |
//! | `staff` / `staff_usernames` | `staff_id` / `username` | `Staff` / `staff_id` | Directory |
//! | `products` | `product_id` | `Product` | Catalog |
//! | `counters` | name | `u64` | Display numbers, outbox ids |
//! | `audit_outbox` | `u64` | `PendingAudit` | Written inside the command txn |
//! | `audit_log` | `sequence` | `AuditLogEntry` | Hash-chained, append-only |
//! | `audit_dead_letter` | `u64` | `DeadLetterAudit` | Entries that failed to chain |
//! | `login_attempts` | `username` | `LoginAttempts` | Rate limiter window |
//!
//! # Isolation
//!
//! redb serializes write transactions. Uniqueness is the table key itself, so
//! "check then insert" inside one `WriteTransaction` cannot race.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::error::AppError;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table holding JSON values keyed by string id
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Composite index `(parent_id, child_id)` with no payload
pub type IndexTable = TableDefinition<'static, (&'static str, &'static str), ()>;

pub const ORDERS: JsonTable = TableDefinition::new("orders");
pub const PAYMENTS: JsonTable = TableDefinition::new("payments");
pub const ORDER_PAYMENTS: IndexTable = TableDefinition::new("order_payments");
pub const SHIFT_OPEN_ORDERS: IndexTable = TableDefinition::new("shift_open_orders");
pub const SHIFTS: JsonTable = TableDefinition::new("shifts");
pub const SHIFT_LEDGERS: JsonTable = TableDefinition::new("shift_ledgers");
/// staff_id → shift_id
pub const ACTIVE_SHIFTS: TableDefinition<&str, &str> = TableDefinition::new("active_shifts");
pub const TABLE_OCCUPANCY: JsonTable = TableDefinition::new("table_occupancy");
pub const IDEMPOTENCY: JsonTable = TableDefinition::new("idempotency");
pub const TERMINALS: JsonTable = TableDefinition::new("terminals");
/// code → terminal_id
pub const TERMINAL_CODES: TableDefinition<&str, &str> = TableDefinition::new("terminal_codes");
pub const STAFF: JsonTable = TableDefinition::new("staff");
/// username → staff_id
pub const STAFF_USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("staff_usernames");
pub const PRODUCTS: JsonTable = TableDefinition::new("products");
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");
pub const AUDIT_OUTBOX: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_outbox");
pub const AUDIT_LOG: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_log");
pub const AUDIT_DEAD_LETTER: TableDefinition<u64, &[u8]> =
    TableDefinition::new("audit_dead_letter");
pub const LOGIN_ATTEMPTS: JsonTable = TableDefinition::new("login_attempts");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        tracing::error!(error = %err, "Storage failure");
        AppError::storage(err.to_string())
    }
}

/// Edge node storage backed by redb
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the data survives power loss.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, demos)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let txn = db.begin_write()?;
        {
            for def in [
                ORDERS,
                PAYMENTS,
                SHIFTS,
                SHIFT_LEDGERS,
                TABLE_OCCUPANCY,
                IDEMPOTENCY,
                TERMINALS,
                STAFF,
                PRODUCTS,
                LOGIN_ATTEMPTS,
            ] {
                let _ = txn.open_table(def)?;
            }
            let _ = txn.open_table(ORDER_PAYMENTS)?;
            let _ = txn.open_table(SHIFT_OPEN_ORDERS)?;
            let _ = txn.open_table(ACTIVE_SHIFTS)?;
            let _ = txn.open_table(TERMINAL_CODES)?;
            let _ = txn.open_table(STAFF_USERNAMES)?;
            let _ = txn.open_table(COUNTERS)?;
            let _ = txn.open_table(AUDIT_OUTBOX)?;
            let _ = txn.open_table(AUDIT_LOG)?;
            let _ = txn.open_table(AUDIT_DEAD_LETTER)?;
        }
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    ///
    /// Dropping the transaction without `commit()` rolls it back.
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Begin a read transaction (snapshot of the last commit)
    pub fn begin_read(&self) -> StorageResult<redb::ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    /// Read one JSON value outside any write transaction
    pub fn read_json<T: DeserializeOwned>(&self, def: JsonTable, key: &str) -> StorageResult<Option<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(def)?;
        let bytes = table.get(key)?.map(|guard| guard.value().to_vec());
        decode(bytes)
    }

    /// Read every value of a JSON table
    pub fn read_all<T: DeserializeOwned>(&self, def: JsonTable) -> StorageResult<Vec<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(def)?;
        let mut out = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }
}

fn decode<T: DeserializeOwned>(bytes: Option<Vec<u8>>) -> StorageResult<Option<T>> {
    match bytes {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

// ========== Transaction helpers ==========
//
// Each helper opens its table for the duration of the call only, so callers
// can freely mix helpers inside one transaction.

/// Get a JSON value inside a write transaction
pub fn get_json<T: DeserializeOwned>(
    txn: &WriteTransaction,
    def: JsonTable,
    key: &str,
) -> StorageResult<Option<T>> {
    let table = txn.open_table(def)?;
    let bytes = table.get(key)?.map(|guard| guard.value().to_vec());
    decode(bytes)
}

/// Insert or replace a JSON value
pub fn put_json<T: Serialize>(
    txn: &WriteTransaction,
    def: JsonTable,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value)?;
    let mut table = txn.open_table(def)?;
    table.insert(key, bytes.as_slice())?;
    Ok(())
}

/// Remove a key, returning whether it existed
pub fn remove_key(txn: &WriteTransaction, def: JsonTable, key: &str) -> StorageResult<bool> {
    let mut table = txn.open_table(def)?;
    let existed = table.remove(key)?.is_some();
    Ok(existed)
}

/// Add `(parent, child)` to an index table
pub fn index_insert(
    txn: &WriteTransaction,
    def: IndexTable,
    parent: &str,
    child: &str,
) -> StorageResult<()> {
    let mut table = txn.open_table(def)?;
    table.insert((parent, child), ())?;
    Ok(())
}

pub fn index_remove(
    txn: &WriteTransaction,
    def: IndexTable,
    parent: &str,
    child: &str,
) -> StorageResult<()> {
    let mut table = txn.open_table(def)?;
    table.remove((parent, child))?;
    Ok(())
}

/// Children of `parent` in key order
pub fn index_children(
    txn: &WriteTransaction,
    def: IndexTable,
    parent: &str,
) -> StorageResult<Vec<String>> {
    let table = txn.open_table(def)?;
    let mut out = Vec::new();
    for item in table.range((parent, "")..)? {
        let (key, _) = item?;
        let (p, child) = key.value();
        if p != parent {
            break;
        }
        out.push(child.to_string());
    }
    Ok(out)
}

/// Increment a named counter and return the new value (starts at 1)
pub fn next_counter(txn: &WriteTransaction, name: &str) -> StorageResult<u64> {
    let mut table = txn.open_table(COUNTERS)?;
    let current = table.get(name)?.map(|guard| guard.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(name, next)?;
    Ok(next)
}
