//! Table Occupancy Lock
//!
//! One row per table in `table_occupancy`, keyed by table id. A dine-in order
//! acquires it at creation and the order state machine releases it when the
//! order enters a terminal status. There is no time-based expiry; the
//! [`sweeper`] only corrects rows orphaned by a crash.

pub mod sweeper;

use redb::{ReadableTable, WriteTransaction};
use shared::error::{AppError, AppResult};
use shared::event::{EdgeEvent, EventScope};
use shared::models::{AuditAction, Order, TableOccupancy};

use crate::audit::PendingAudit;
use crate::db::storage::{self, ORDERS, TABLE_OCCUPANCY};
use crate::db::{Storage, StorageResult};
use crate::message::{Effects, Outbox};

pub use sweeper::OccupancySweeper;

/// Who is claiming the table
#[derive(Debug, Clone, Copy)]
pub struct Claim<'a> {
    pub table_id: &'a str,
    pub order_id: &'a str,
    pub terminal_id: &'a str,
    pub staff_id: &'a str,
}

/// Table occupancy operations (stateless, transaction-scoped)
pub struct TableLock;

impl TableLock {
    /// Claim a table for an order.
    ///
    /// - free table: lock is created
    /// - held by the same order: no-op refresh, existing row returned
    /// - held by another order: `TableOccupied` naming the holder, row untouched
    pub fn acquire(txn: &WriteTransaction, fx: &mut Effects, claim: Claim<'_>) -> AppResult<TableOccupancy> {
        let existing: Option<TableOccupancy> = storage::get_json(txn, TABLE_OCCUPANCY, claim.table_id)?;

        if let Some(existing) = existing {
            if existing.order_id == claim.order_id {
                tracing::debug!(table_id = claim.table_id, order_id = claim.order_id, "Table lock refreshed");
                return Ok(existing);
            }
            tracing::info!(
                table_id = claim.table_id,
                holder = %existing.order_id,
                requested_by = claim.order_id,
                "Table already occupied"
            );
            return Err(AppError::TableOccupied {
                table_id: existing.table_id,
                order_id: existing.order_id,
                terminal_id: existing.terminal_id,
            });
        }

        let occupancy = TableOccupancy {
            table_id: claim.table_id.to_string(),
            order_id: claim.order_id.to_string(),
            terminal_id: claim.terminal_id.to_string(),
            staff_id: claim.staff_id.to_string(),
            locked_at: shared::util::now_millis(),
        };
        storage::put_json(txn, TABLE_OCCUPANCY, claim.table_id, &occupancy)?;
        fx.emit(
            EdgeEvent::TableLocked {
                table_id: occupancy.table_id.clone(),
                order_id: occupancy.order_id.clone(),
            },
            vec![EventScope::Table(occupancy.table_id.clone())],
        );
        tracing::debug!(table_id = claim.table_id, order_id = claim.order_id, "Table lock acquired");
        Ok(occupancy)
    }

    /// Release every lock held by `order_id`. Idempotent; returns the freed table ids.
    pub fn release(txn: &WriteTransaction, fx: &mut Effects, order_id: &str) -> AppResult<Vec<String>> {
        let held = Self::held_by(txn, order_id)?;
        if held.is_empty() {
            return Ok(held);
        }
        {
            let mut table = txn.open_table(TABLE_OCCUPANCY)?;
            for table_id in &held {
                table.remove(table_id.as_str())?;
            }
        }
        for table_id in &held {
            fx.emit(
                EdgeEvent::TableReleased {
                    table_id: table_id.clone(),
                    order_id: order_id.to_string(),
                },
                vec![EventScope::Table(table_id.clone())],
            );
            tracing::debug!(table_id = %table_id, order_id, "Table lock released");
        }
        Ok(held)
    }

    fn held_by(txn: &WriteTransaction, order_id: &str) -> StorageResult<Vec<String>> {
        let table = txn.open_table(TABLE_OCCUPANCY)?;
        let mut held = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            let occupancy: TableOccupancy = serde_json::from_slice(value.value())?;
            if occupancy.order_id == order_id {
                held.push(key.value().to_string());
            }
        }
        Ok(held)
    }

    /// Current holder of a table
    pub fn get(storage: &Storage, table_id: &str) -> StorageResult<Option<TableOccupancy>> {
        storage.read_json(TABLE_OCCUPANCY, table_id)
    }

    /// Release locks whose order is terminal or gone. Returns the freed table ids.
    pub fn sweep_stale(storage: &Storage, outbox: &Outbox) -> AppResult<Vec<String>> {
        let txn = storage.begin_write()?;
        let mut fx = Effects::new();

        let rows: Vec<TableOccupancy> = {
            let table = txn.open_table(TABLE_OCCUPANCY)?;
            let mut rows = Vec::new();
            for item in table.iter()? {
                let (_, value) = item?;
                rows.push(serde_json::from_slice(value.value()).map_err(crate::db::StorageError::from)?);
            }
            rows
        };

        let mut freed = Vec::new();
        for occupancy in rows {
            let order: Option<Order> = storage::get_json(&txn, ORDERS, &occupancy.order_id)?;
            let stale = order.as_ref().is_none_or(|o| o.status.is_terminal());
            if !stale {
                continue;
            }
            storage::remove_key(&txn, TABLE_OCCUPANCY, &occupancy.table_id)?;
            tracing::warn!(
                table_id = %occupancy.table_id,
                order_id = %occupancy.order_id,
                order_status = ?order.as_ref().map(|o| o.status),
                "Released stale table lock"
            );
            fx.audit(
                &txn,
                PendingAudit::new(AuditAction::TableReleased, "table", occupancy.table_id.clone(), None)
                    .snapshots(&occupancy, &serde_json::Value::Null),
            )?;
            fx.emit(
                EdgeEvent::TableReleased {
                    table_id: occupancy.table_id.clone(),
                    order_id: occupancy.order_id.clone(),
                },
                vec![EventScope::Table(occupancy.table_id.clone())],
            );
            freed.push(occupancy.table_id);
        }

        txn.commit()?;
        outbox.dispatch(fx);
        Ok(freed)
    }
}
