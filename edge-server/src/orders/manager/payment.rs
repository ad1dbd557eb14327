//! Payments against an order
//!
//! A completed payment increments `order.paid`, feeds the shift ledger and is
//! audited on the order itself, all inside the command transaction. Failed
//! gateway reports are kept for the record and change nothing else.

use redb::{ReadableTable, WriteTransaction};
use rust_decimal::Decimal;
use shared::command::GatewayOutcome;
use shared::error::{AppError, AppResult};
use shared::event::EdgeEvent;
use shared::models::{AuditAction, Order, Payment, PaymentMethod, PaymentStatus, Staff};

use super::{ENTITY, OrdersManager, require, scopes};
use crate::audit::PendingAudit;
use crate::db::Storage;
use crate::db::storage::{self, ORDER_PAYMENTS, ORDERS, PAYMENTS};
use crate::message::Effects;
use crate::utils::validation::{MAX_NAME_LEN, validate_positive_amount, validate_required_text};

impl OrdersManager {
    /// Record a completed payment (cash at the counter, manual card entry)
    pub fn record_payment(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
        amount: Decimal,
        method: PaymentMethod,
    ) -> AppResult<Payment> {
        validate_positive_amount(amount, "payment amount")?;
        let mut order = require_payable(txn, order_id)?;
        self.complete_payment(txn, fx, actor, &mut order, amount, method, None)
    }

    /// Apply an asynchronous gateway report.
    ///
    /// A reference completes an order at most once. Repeated reports return the
    /// stored payment, with one exception: `Completed` after `Failed` is the
    /// gateway's retry succeeding and is applied.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_gateway_report(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order_id: &str,
        amount: Decimal,
        method: PaymentMethod,
        reference: &str,
        outcome: GatewayOutcome,
    ) -> AppResult<Payment> {
        validate_required_text(reference, "reference", MAX_NAME_LEN)?;
        validate_positive_amount(amount, "payment amount")?;

        let seen = find_by_reference(txn, order_id, reference)?;
        let completed = seen.iter().find(|p| p.status == PaymentStatus::Completed);
        let duplicate = match outcome {
            GatewayOutcome::Completed => completed,
            GatewayOutcome::Failed => completed.or(seen.last()),
        };
        if let Some(existing) = duplicate {
            tracing::info!(order_id, reference, payment_id = %existing.id, "Duplicate gateway report ignored");
            return Ok(existing.clone());
        }
        if !seen.is_empty() {
            tracing::info!(order_id, reference, "Gateway retry succeeded after failure");
        }

        let mut order = require_payable(txn, order_id)?;
        match outcome {
            GatewayOutcome::Completed => {
                self.complete_payment(txn, fx, actor, &mut order, amount, method, Some(reference))
            }
            GatewayOutcome::Failed => {
                let payment = new_payment(&order, actor, amount, method, PaymentStatus::Failed, Some(reference));
                store_payment(txn, &payment)?;
                fx.audit(
                    txn,
                    PendingAudit::new(AuditAction::PaymentFailed, ENTITY, &order.id, Some(&actor.id))
                        .after(&payment),
                )?;
                tracing::warn!(order_id, reference, amount = %amount, "Gateway reported failed payment");
                Ok(payment)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_payment(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        order: &mut Order,
        amount: Decimal,
        method: PaymentMethod,
        reference: Option<&str>,
    ) -> AppResult<Payment> {
        let before = order.clone();
        let payment = new_payment(order, actor, amount, method, PaymentStatus::Completed, reference);
        order.add_paid(amount)?;
        store_payment(txn, &payment)?;

        order.updated_at = payment.created_at;
        storage::put_json(txn, ORDERS, &order.id, &*order)?;

        self.shifts().record_payment(txn, fx, &order.shift_id, method, amount)?;

        fx.audit(
            txn,
            PendingAudit::new(AuditAction::PaymentRecorded, ENTITY, &order.id, Some(&actor.id))
                .snapshots(&before, &*order),
        )?;
        fx.emit(
            EdgeEvent::PaymentRecorded {
                order_id: order.id.clone(),
                payment_id: payment.id.clone(),
                amount,
                method,
            },
            scopes(order),
        );

        tracing::info!(
            order_id = %order.id,
            payment_id = %payment.id,
            amount = %amount,
            ?method,
            paid = %order.paid,
            total = %order.total,
            "Payment recorded"
        );
        Ok(payment)
    }

    /// Payments recorded against an order, completed and failed
    pub fn payments_for(storage: &Storage, order_id: &str) -> AppResult<Vec<Payment>> {
        let txn = storage.begin_read()?;
        let index = txn.open_table(ORDER_PAYMENTS)?;
        let payments = txn.open_table(PAYMENTS)?;

        let mut out = Vec::new();
        for item in index.range((order_id, "")..)? {
            let (key, _) = item?;
            let (parent, payment_id) = key.value();
            if parent != order_id {
                break;
            }
            if let Some(raw) = payments.get(payment_id)? {
                let payment: Payment = serde_json::from_slice(raw.value())
                    .map_err(|e| AppError::storage(e.to_string()))?;
                out.push(payment);
            }
        }
        out.sort_by_key(|p| p.created_at);
        Ok(out)
    }
}

fn require_payable(txn: &WriteTransaction, order_id: &str) -> AppResult<Order> {
    let order = require(txn, order_id)?;
    if order.status.is_terminal() {
        return Err(AppError::invalid_state(format!(
            "Order {order_id} is {} and cannot take payments",
            order.status
        )));
    }
    Ok(order)
}

fn new_payment(
    order: &Order,
    actor: &Staff,
    amount: Decimal,
    method: PaymentMethod,
    status: PaymentStatus,
    reference: Option<&str>,
) -> Payment {
    Payment {
        id: shared::util::new_id(),
        order_id: order.id.clone(),
        shift_id: order.shift_id.clone(),
        amount,
        method,
        status,
        recorded_by: actor.id.clone(),
        reference: reference.map(str::to_string),
        created_at: shared::util::now_millis(),
    }
}

fn store_payment(txn: &WriteTransaction, payment: &Payment) -> AppResult<()> {
    storage::put_json(txn, PAYMENTS, &payment.id, payment)?;
    storage::index_insert(txn, ORDER_PAYMENTS, &payment.order_id, &payment.id)?;
    Ok(())
}

/// Payments already stored for a gateway reference, oldest first
fn find_by_reference(txn: &WriteTransaction, order_id: &str, reference: &str) -> AppResult<Vec<Payment>> {
    let mut found = Vec::new();
    for payment_id in storage::index_children(txn, ORDER_PAYMENTS, order_id)? {
        let payment: Option<Payment> = storage::get_json(txn, PAYMENTS, &payment_id)?;
        if let Some(payment) = payment
            && payment.reference.as_deref() == Some(reference)
        {
            found.push(payment);
        }
    }
    found.sort_by_key(|p| p.created_at);
    Ok(found)
}
