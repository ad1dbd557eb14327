//! OrdersManager - order lifecycle over one write transaction
//!
//! Every operation takes the command's `WriteTransaction` and its
//! [`Effects`]. Status write, table release, open-order index and ledger
//! stamp land in the same atomic unit; audit rows are staged in the same
//! transaction and events are published only after commit.
//!
//! # Transition Flow
//!
//! ```text
//! transition(order, to)
//!     ├─ 1. Guard: OrderStatus::can_transition_to(to, elevated)
//!     ├─ 2. Append status_history, write status
//!     ├─ 3. Terminal? release table lock, drop from shift_open_orders
//!     ├─ 4. Persist order
//!     ├─ 5. Stage audit entry (before/after snapshots)
//!     └─ 6. Queue scoped OrderStatusChanged event
//! ```
//!
//! Two terminals racing on the same order serialize on the write lock; the
//! second one re-reads the new status and fails the guard with
//! `InvalidTransition`.

mod payment;

use redb::WriteTransaction;
use shared::error::{AppError, AppResult};
use shared::event::{EdgeEvent, EventScope};
use shared::models::{
    AuditAction, Order, OrderItem, OrderItemInput, OrderStatus, OrderType, Staff, StatusChange,
};

use super::catalog::Catalog;
use crate::audit::PendingAudit;
use crate::db::Storage;
use crate::db::storage::{self, ORDERS};
use crate::message::Effects;
use crate::shifts::{self, ShiftManager};
use crate::tables::{Claim, TableLock};
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, validate_optional_text, validate_quantity, validate_required_text,
};

const ENTITY: &str = "order";
const DISPLAY_NUMBER_COUNTER: &str = "display_number";

/// OrdersManager for order commands
#[derive(Debug, Clone)]
pub struct OrdersManager {
    shifts: ShiftManager,
}

impl OrdersManager {
    pub fn new(shifts: ShiftManager) -> Self {
        Self { shifts }
    }

    pub fn shifts(&self) -> &ShiftManager {
        &self.shifts
    }

    // ========== Creation ==========

    /// Create an order in `pending` on the actor's active shift.
    ///
    /// Dine-in requires a table and acquires its lock; takeaway forbids one.
    pub fn create(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_type: OrderType,
        table_id: Option<&str>,
    ) -> AppResult<Order> {
        let table_id = match (order_type, table_id) {
            (OrderType::DineIn, Some(t)) => {
                validate_required_text(t, "table_id", MAX_NAME_LEN)?;
                Some(t.trim().to_string())
            }
            (OrderType::DineIn, None) => {
                return Err(AppError::validation("dine-in order requires a table_id"));
            }
            (OrderType::Takeaway, Some(_)) => {
                return Err(AppError::validation("takeaway order must not have a table_id"));
            }
            (OrderType::Takeaway, None) => None,
        };

        let shift = shifts::require_active_for_staff(txn, &actor.id)?;
        let now = shared::util::now_millis();
        let order = Order {
            id: shared::util::new_id(),
            display_number: storage::next_counter(txn, DISPLAY_NUMBER_COUNTER)?,
            order_type,
            table_id,
            shift_id: shift.id.clone(),
            terminal_id: shift.terminal_id.clone(),
            status: OrderStatus::Pending,
            items: Vec::new(),
            total: rust_decimal::Decimal::ZERO,
            paid: rust_decimal::Decimal::ZERO,
            status_history: Vec::new(),
            created_by: actor.id.clone(),
            created_at: now,
            updated_at: now,
        };

        if let Some(table_id) = order.table_id.as_deref() {
            TableLock::acquire(
                txn,
                fx,
                Claim {
                    table_id,
                    order_id: &order.id,
                    terminal_id: &order.terminal_id,
                    staff_id: &actor.id,
                },
            )?;
        }

        storage::put_json(txn, ORDERS, &order.id, &order)?;
        ShiftManager::track_open_order(txn, &order.shift_id, &order.id)?;

        fx.audit(
            txn,
            PendingAudit::new(AuditAction::OrderCreated, ENTITY, &order.id, Some(&actor.id)).after(&order),
        )?;
        fx.emit(
            EdgeEvent::OrderCreated {
                order_id: order.id.clone(),
                display_number: order.display_number,
            },
            scopes(&order),
        );

        tracing::info!(
            order_id = %order.id,
            display_number = order.display_number,
            table_id = ?order.table_id,
            shift_id = %order.shift_id,
            "Order created"
        );
        Ok(order)
    }

    // ========== Items (pending only) ==========

    pub fn add_item(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        order_id: &str,
        input: &OrderItemInput,
    ) -> AppResult<Order> {
        let mut order = load_mutable(txn, order_id)?;
        validate_quantity(input.quantity)?;
        validate_optional_text(input.notes.as_deref(), "notes", MAX_NOTE_LEN)?;

        let product = Catalog::require(txn, &input.product_id)?;
        let unit_price = product.unit_price(input.size.as_deref(), &input.modifiers)?;

        let item = OrderItem {
            id: shared::util::new_id(),
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity: input.quantity,
            size: input.size.clone(),
            modifiers: input.modifiers.clone(),
            notes: input.notes.clone(),
            sort_order: order.next_sort_order(),
            unit_price,
        };
        tracing::debug!(order_id, item_id = %item.id, product_id = %item.product_id, "Item added");
        order.items.push(item);
        self.save_items(txn, fx, &mut order)?;
        Ok(order)
    }

    pub fn remove_item(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        order_id: &str,
        item_id: &str,
    ) -> AppResult<Order> {
        let mut order = load_mutable(txn, order_id)?;
        let index = find_item(&order, item_id)?;
        order.items.remove(index);
        self.save_items(txn, fx, &mut order)?;
        Ok(order)
    }

    pub fn update_quantity(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        order_id: &str,
        item_id: &str,
        quantity: u32,
    ) -> AppResult<Order> {
        let mut order = load_mutable(txn, order_id)?;
        validate_quantity(quantity)?;
        let index = find_item(&order, item_id)?;
        order.items[index].quantity = quantity;
        self.save_items(txn, fx, &mut order)?;
        Ok(order)
    }

    fn save_items(&self, txn: &WriteTransaction, fx: &mut Effects, order: &mut Order) -> AppResult<()> {
        order.recalculate_total()?;
        order.updated_at = shared::util::now_millis();
        storage::put_json(txn, ORDERS, &order.id, &*order)?;
        fx.emit(
            EdgeEvent::OrderItemsChanged {
                order_id: order.id.clone(),
                total: order.total,
            },
            scopes(order),
        );
        Ok(())
    }

    // ========== Transitions ==========

    /// `pending → preparing`; needs at least one item
    pub fn submit_to_kitchen(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
    ) -> AppResult<Order> {
        let mut order = require(txn, order_id)?;
        guard(&order, OrderStatus::Preparing, false)?;
        if order.items.is_empty() {
            return Err(AppError::invalid_state(format!(
                "Order {order_id} has no items to submit"
            )));
        }
        let before = self.transition(txn, fx, actor, &mut order, OrderStatus::Preparing, false)?;
        audit_transition(txn, fx, AuditAction::OrderSubmitted, actor, &before, &order)?;
        Ok(order)
    }

    /// Kitchen/bar: `preparing → ready`
    pub fn mark_ready(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
    ) -> AppResult<Order> {
        let mut order = require(txn, order_id)?;
        let before = self.transition(txn, fx, actor, &mut order, OrderStatus::Ready, false)?;
        audit_transition(txn, fx, AuditAction::OrderReady, actor, &before, &order)?;
        Ok(order)
    }

    /// Hand-off to payment: `ready → awaiting_payment`
    pub fn request_payment(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
    ) -> AppResult<Order> {
        let mut order = require(txn, order_id)?;
        let before = self.transition(txn, fx, actor, &mut order, OrderStatus::AwaitingPayment, false)?;
        audit_transition(txn, fx, AuditAction::OrderPaymentRequested, actor, &before, &order)?;
        Ok(order)
    }

    /// `awaiting_payment → served` (a `ready` order passes through
    /// `awaiting_payment` in the same transaction).
    ///
    /// Requires completed payments ≥ total. Releases the table and stamps
    /// the shift ledger. One audit entry covers the whole checkout.
    pub fn checkout(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
    ) -> AppResult<Order> {
        let mut order = require(txn, order_id)?;
        if !matches!(order.status, OrderStatus::Ready | OrderStatus::AwaitingPayment) {
            return Err(AppError::InvalidTransition {
                order_id: order.id.clone(),
                from: order.status,
                to: OrderStatus::Served,
            });
        }
        if !order.is_fully_paid() {
            return Err(AppError::invalid_state(format!(
                "Order {order_id} is not fully paid ({} of {})",
                order.paid, order.total
            )));
        }

        let before = order.clone();
        if order.status == OrderStatus::Ready {
            self.transition(txn, fx, actor, &mut order, OrderStatus::AwaitingPayment, false)?;
        }
        self.transition(txn, fx, actor, &mut order, OrderStatus::Served, false)?;
        self.shifts.stamp_checkout(txn, fx, &order.shift_id, order.total)?;
        audit_transition(txn, fx, AuditAction::OrderCheckedOut, actor, &before, &order)?;

        tracing::info!(order_id, total = %order.total, paid = %order.paid, "Order checked out");
        Ok(order)
    }

    /// `pending → cancelled`, any authenticated staff
    pub fn cancel(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
        reason: Option<&str>,
    ) -> AppResult<Order> {
        validate_optional_text(reason, "reason", MAX_NOTE_LEN)?;
        let mut order = require(txn, order_id)?;
        let before = self.transition(txn, fx, actor, &mut order, OrderStatus::Cancelled, false)?;
        audit_transition(txn, fx, AuditAction::OrderCancelled, actor, &before, &order)?;
        fx.emit(
            EdgeEvent::OrderCancelled {
                order_id: order.id.clone(),
                voided: false,
                reason: reason.map(str::to_string),
            },
            scopes(&before),
        );
        Ok(order)
    }

    /// Void an order already sent to the kitchen. Caller must hold an
    /// elevated role; a reason is mandatory.
    pub fn void(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
        reason: &str,
    ) -> AppResult<Order> {
        validate_required_text(reason, "reason", MAX_NOTE_LEN)?;
        let mut order = require(txn, order_id)?;
        if order.status == OrderStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "Order {order_id} is still pending; cancel it instead of voiding"
            )));
        }
        let before =
            self.transition(txn, fx, actor, &mut order, OrderStatus::Cancelled, actor.role.is_elevated())?;

        let mut entry = PendingAudit::new(AuditAction::OrderVoided, ENTITY, &order.id, Some(&actor.id))
            .snapshots(&before, &order);
        if let serde_json::Value::Object(map) = &mut entry.after {
            map.insert("void_reason".into(), serde_json::Value::String(reason.to_string()));
        }
        fx.audit(txn, entry)?;
        fx.emit(
            EdgeEvent::OrderCancelled {
                order_id: order.id.clone(),
                voided: true,
                reason: Some(reason.to_string()),
            },
            scopes(&before),
        );
        tracing::warn!(order_id, actor_id = %actor.id, from = %before.status, reason, "Order voided");
        Ok(order)
    }

    /// Guarded status write plus terminal-state side effects.
    ///
    /// Returns the order as it was before the change. Audit is left to the
    /// caller so multi-hop operations record a single entry.
    fn transition(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order: &mut Order,
        to: OrderStatus,
        elevated: bool,
    ) -> AppResult<Order> {
        guard(order, to, elevated)?;
        let before = order.clone();
        let now = shared::util::now_millis();

        order.status_history.push(StatusChange {
            from: before.status,
            to,
            actor_id: actor.id.clone(),
            at: now,
        });
        order.status = to;
        order.updated_at = now;

        if to.is_terminal() {
            TableLock::release(txn, fx, &order.id)?;
            ShiftManager::untrack_open_order(txn, &order.shift_id, &order.id)?;
        }

        storage::put_json(txn, ORDERS, &order.id, &*order)?;
        fx.emit(
            EdgeEvent::OrderStatusChanged {
                order_id: order.id.clone(),
                from: before.status,
                to,
            },
            scopes(order),
        );
        tracing::debug!(order_id = %order.id, from = %before.status, %to, "Order status changed");
        Ok(before)
    }

    // ========== Reads ==========

    pub fn get(storage: &Storage, order_id: &str) -> AppResult<Order> {
        storage
            .read_json(ORDERS, order_id)?
            .ok_or_else(|| AppError::not_found("order", order_id))
    }

    pub fn all(storage: &Storage) -> AppResult<Vec<Order>> {
        Ok(storage.read_all(ORDERS)?)
    }
}

/// Shift scope, plus the table scope for dine-in
fn scopes(order: &Order) -> Vec<EventScope> {
    let mut scopes = vec![EventScope::Shift(order.shift_id.clone())];
    if let Some(table_id) = &order.table_id {
        scopes.push(EventScope::Table(table_id.clone()));
    }
    scopes
}

fn guard(order: &Order, to: OrderStatus, elevated: bool) -> AppResult<()> {
    if order.status.can_transition_to(to, elevated) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            order_id: order.id.clone(),
            from: order.status,
            to,
        })
    }
}

fn audit_transition(
    txn: &WriteTransaction,
    fx: &mut Effects,
    action: AuditAction,
    actor: &Staff,
    before: &Order,
    after: &Order,
) -> AppResult<()> {
    fx.audit(
        txn,
        PendingAudit::new(action, ENTITY, &after.id, Some(&actor.id)).snapshots(before, after),
    )?;
    Ok(())
}

pub(crate) fn require(txn: &WriteTransaction, order_id: &str) -> AppResult<Order> {
    storage::get_json(txn, ORDERS, order_id)?.ok_or_else(|| AppError::not_found("order", order_id))
}

/// Order whose items may still change
fn load_mutable(txn: &WriteTransaction, order_id: &str) -> AppResult<Order> {
    let order = require(txn, order_id)?;
    if order.status != OrderStatus::Pending {
        return Err(AppError::ImmutableOrder {
            order_id: order.id,
            status: order.status,
        });
    }
    Ok(order)
}

fn find_item(order: &Order, item_id: &str) -> AppResult<usize> {
    order
        .items
        .iter()
        .position(|i| i.id == item_id)
        .ok_or_else(|| AppError::not_found("order item", item_id))
}

#[cfg(test)]
mod tests;
