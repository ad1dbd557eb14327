//! Shift Ledger / 班次现金对账
//!
//! A shift is one staff member's session at one terminal. Its ledger is
//! updated incrementally as payments complete and frozen at close:
//!
//! ```text
//! expected = Σ completed cash payments − drops + adjustments
//! variance = counted − expected
//! ```
//!
//! Every operation runs on the caller's `WriteTransaction`, so the variance
//! computed at close is the variance written: no payment can land between.

use redb::{ReadableTable, WriteTransaction};
use rust_decimal::Decimal;
use shared::error::{AppError, AppResult};
use shared::event::{EdgeEvent, EventScope};
use shared::models::{AuditAction, PaymentMethod, Role, Shift, ShiftLedger, Staff};

use crate::audit::PendingAudit;
use crate::auth::RoleService;
use crate::db::storage::{self, ACTIVE_SHIFTS, SHIFT_LEDGERS, SHIFT_OPEN_ORDERS, SHIFTS};
use crate::db::{Storage, StorageResult};
use crate::message::Effects;
use crate::terminals::TerminalRegistry;
use crate::utils::validation::{MAX_NOTE_LEN, validate_amount, validate_positive_amount, validate_required_text};

/// Roles allowed to approve an out-of-threshold variance
pub const APPROVER_ROLES: &[Role] = &[Role::Manager, Role::Admin];

const ENTITY: &str = "shift";

/// Shift lifecycle and ledger arithmetic
#[derive(Debug, Clone)]
pub struct ShiftManager {
    variance_threshold: Decimal,
}

impl ShiftManager {
    pub fn new(variance_threshold: Decimal) -> Self {
        Self {
            variance_threshold: variance_threshold.abs(),
        }
    }

    pub fn variance_threshold(&self) -> Decimal {
        self.variance_threshold
    }

    // ========== Lifecycle ==========

    /// `startShift(staffId, terminalId)`
    pub fn start(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        staff: &Staff,
        terminal_id: &str,
    ) -> AppResult<Shift> {
        let terminal = TerminalRegistry::require(txn, terminal_id)?;

        if let Some(active) = active_shift_id(txn, &staff.id)? {
            return Err(AppError::invalid_state(format!(
                "Staff {} already has active shift {active}",
                staff.id
            )));
        }

        let now = shared::util::now_millis();
        let shift = Shift {
            id: shared::util::new_id(),
            staff_id: staff.id.clone(),
            terminal_id: terminal.id.clone(),
            started_at: now,
            ended_at: None,
            counted_cash: None,
            expected_cash: None,
            variance: None,
            closed_by: None,
            approved_by: None,
        };
        let ledger = ShiftLedger::new(&shift.id, &terminal.id, now);

        storage::put_json(txn, SHIFTS, &shift.id, &shift)?;
        storage::put_json(txn, SHIFT_LEDGERS, &shift.id, &ledger)?;
        {
            let mut active = txn.open_table(ACTIVE_SHIFTS)?;
            active.insert(staff.id.as_str(), shift.id.as_str())?;
        }

        fx.audit(
            txn,
            PendingAudit::new(AuditAction::ShiftStarted, ENTITY, &shift.id, Some(&staff.id)).after(&shift),
        )?;
        fx.emit(
            EdgeEvent::ShiftStarted {
                shift_id: shift.id.clone(),
                staff_id: staff.id.clone(),
            },
            vec![EventScope::Shift(shift.id.clone())],
        );

        tracing::info!(shift_id = %shift.id, staff_id = %staff.id, terminal_id = %terminal.id, "Shift started");
        Ok(shift)
    }

    /// `closeShift(shiftId, countedCash, approverId?)`
    ///
    /// 1. no non-terminal orders outstanding
    /// 2. expected cash from the ledger
    /// 3. variance = counted − expected
    /// 4. |variance| > threshold ⇒ manager/admin approver mandatory
    /// 5. end time, counted cash, variance, approver written in the same txn
    pub fn close(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        roles: &dyn RoleService,
        actor: &Staff,
        shift_id: &str,
        counted_cash: Decimal,
        approver_id: Option<&str>,
    ) -> AppResult<Shift> {
        let before = require_active(txn, shift_id)?;
        if before.staff_id != actor.id && !actor.role.is_elevated() {
            return Err(AppError::unauthorized(&actor.id, APPROVER_ROLES));
        }
        validate_amount(counted_cash, "counted cash")?;

        let open_orders = storage::index_children(txn, SHIFT_OPEN_ORDERS, shift_id)?;
        if !open_orders.is_empty() {
            return Err(AppError::invalid_state(format!(
                "Shift {shift_id} has {} unfinished order(s)",
                open_orders.len()
            )));
        }

        let ledger = require_ledger(txn, shift_id)?;
        let expected = ledger
            .expected_cash()
            .ok_or_else(|| AppError::amount_overflow("expected cash"))?;
        let variance = counted_cash
            .checked_sub(expected)
            .ok_or_else(|| AppError::amount_overflow("variance"))?;

        // An approver is only consulted when the variance needs one
        let approver = if variance.abs() > self.variance_threshold {
            let Some(id) = approver_id else {
                return Err(AppError::validation(format!(
                    "Variance {variance} exceeds threshold {}; manager approval required",
                    self.variance_threshold
                )));
            };
            Some(self.validate_approver(roles, id)?)
        } else {
            None
        };

        let mut shift = before.clone();
        shift.ended_at = Some(shared::util::now_millis());
        shift.counted_cash = Some(counted_cash);
        shift.expected_cash = Some(expected);
        shift.variance = Some(variance);
        shift.closed_by = Some(actor.id.clone());
        shift.approved_by = approver.map(|s| s.id);

        storage::put_json(txn, SHIFTS, &shift.id, &shift)?;
        {
            let mut active = txn.open_table(ACTIVE_SHIFTS)?;
            active.remove(shift.staff_id.as_str())?;
        }

        fx.audit(
            txn,
            PendingAudit::new(AuditAction::ShiftClosed, ENTITY, &shift.id, Some(&actor.id))
                .snapshots(&before, &shift),
        )?;
        fx.emit(
            EdgeEvent::ShiftClosed {
                shift_id: shift.id.clone(),
                variance,
            },
            vec![EventScope::Shift(shift.id.clone())],
        );

        tracing::info!(
            shift_id = %shift.id,
            %expected,
            %counted_cash,
            %variance,
            approved_by = ?shift.approved_by,
            "Shift closed"
        );
        Ok(shift)
    }

    fn validate_approver(&self, roles: &dyn RoleService, approver_id: &str) -> AppResult<Staff> {
        roles.assert_role(approver_id, APPROVER_ROLES)
    }

    // ========== Ledger ==========

    /// Add a completed payment to the running totals
    pub fn record_payment(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        shift_id: &str,
        method: PaymentMethod,
        amount: Decimal,
    ) -> AppResult<ShiftLedger> {
        require_active(txn, shift_id)?;
        let mut ledger = require_ledger(txn, shift_id)?;
        ledger.add_payment(method, amount, shared::util::now_millis())?;
        self.save_ledger(txn, fx, &ledger)?;
        Ok(ledger)
    }

    /// Count a served order into the shift's sales
    pub fn stamp_checkout(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        shift_id: &str,
        order_total: Decimal,
    ) -> AppResult<ShiftLedger> {
        let mut ledger = require_ledger(txn, shift_id)?;
        ledger.add_sale(order_total, shared::util::now_millis())?;
        self.save_ledger(txn, fx, &ledger)?;
        Ok(ledger)
    }

    /// Cash removed from the drawer
    pub fn record_cash_drop(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        shift_id: &str,
        amount: Decimal,
    ) -> AppResult<ShiftLedger> {
        validate_positive_amount(amount, "cash drop")?;
        require_active(txn, shift_id)?;
        let before = require_ledger(txn, shift_id)?;
        let mut ledger = before.clone();
        ledger.add_drop(amount, shared::util::now_millis())?;
        self.save_ledger(txn, fx, &ledger)?;

        fx.audit(
            txn,
            PendingAudit::new(AuditAction::CashDropRecorded, ENTITY, shift_id, Some(&actor.id))
                .snapshots(&before, &ledger),
        )?;
        tracing::info!(shift_id, %amount, "Cash drop recorded");
        Ok(ledger)
    }

    /// Signed manual correction of expected cash
    pub fn record_cash_adjustment(
        &self,
        txn: &WriteTransaction,
        fx: &mut Effects,
        actor: &Staff,
        shift_id: &str,
        amount: Decimal,
        reason: &str,
    ) -> AppResult<ShiftLedger> {
        if amount.is_zero() {
            return Err(AppError::validation("adjustment amount must not be zero"));
        }
        validate_amount(amount.abs(), "adjustment amount")?;
        validate_required_text(reason, "reason", MAX_NOTE_LEN)?;
        require_active(txn, shift_id)?;
        let before = require_ledger(txn, shift_id)?;
        let mut ledger = before.clone();
        ledger.add_adjustment(amount, shared::util::now_millis())?;
        self.save_ledger(txn, fx, &ledger)?;

        let mut entry = PendingAudit::new(AuditAction::CashAdjustmentRecorded, ENTITY, shift_id, Some(&actor.id))
            .snapshots(&before, &ledger);
        if let serde_json::Value::Object(map) = &mut entry.after {
            map.insert("reason".into(), serde_json::Value::String(reason.to_string()));
        }
        fx.audit(txn, entry)?;
        tracing::info!(shift_id, %amount, reason, "Cash adjustment recorded");
        Ok(ledger)
    }

    fn save_ledger(&self, txn: &WriteTransaction, fx: &mut Effects, ledger: &ShiftLedger) -> AppResult<()> {
        let expected_cash = ledger
            .expected_cash()
            .ok_or_else(|| AppError::amount_overflow("expected cash"))?;
        storage::put_json(txn, SHIFT_LEDGERS, &ledger.shift_id, ledger)?;
        fx.emit(
            EdgeEvent::LedgerChanged {
                shift_id: ledger.shift_id.clone(),
                expected_cash,
            },
            vec![EventScope::Shift(ledger.shift_id.clone())],
        );
        Ok(())
    }

    // ========== Open order index ==========

    pub fn track_open_order(txn: &WriteTransaction, shift_id: &str, order_id: &str) -> StorageResult<()> {
        storage::index_insert(txn, SHIFT_OPEN_ORDERS, shift_id, order_id)
    }

    pub fn untrack_open_order(txn: &WriteTransaction, shift_id: &str, order_id: &str) -> StorageResult<()> {
        storage::index_remove(txn, SHIFT_OPEN_ORDERS, shift_id, order_id)
    }

    // ========== Reads ==========

    pub fn get_shift(storage: &Storage, shift_id: &str) -> AppResult<Shift> {
        storage
            .read_json(SHIFTS, shift_id)?
            .ok_or_else(|| AppError::not_found("shift", shift_id))
    }

    pub fn get_ledger(storage: &Storage, shift_id: &str) -> AppResult<ShiftLedger> {
        storage
            .read_json(SHIFT_LEDGERS, shift_id)?
            .ok_or_else(|| AppError::not_found("shift ledger", shift_id))
    }
}

/// Active shift id of a staff member
pub fn active_shift_id(txn: &WriteTransaction, staff_id: &str) -> StorageResult<Option<String>> {
    let table = txn.open_table(ACTIVE_SHIFTS)?;
    Ok(table.get(staff_id)?.map(|guard| guard.value().to_string()))
}

/// The staff member's active shift, required for taking orders
pub fn require_active_for_staff(txn: &WriteTransaction, staff_id: &str) -> AppResult<Shift> {
    let shift_id = active_shift_id(txn, staff_id)?
        .ok_or_else(|| AppError::invalid_state(format!("Staff {staff_id} has no active shift")))?;
    require_active(txn, &shift_id)
}

/// Shift row that must exist and still be open
pub fn require_active(txn: &WriteTransaction, shift_id: &str) -> AppResult<Shift> {
    let shift: Shift = storage::get_json(txn, SHIFTS, shift_id)?
        .ok_or_else(|| AppError::not_found("shift", shift_id))?;
    if !shift.is_active() {
        return Err(AppError::invalid_state(format!("Shift {shift_id} is closed")));
    }
    Ok(shift)
}

fn require_ledger(txn: &WriteTransaction, shift_id: &str) -> AppResult<ShiftLedger> {
    storage::get_json(txn, SHIFT_LEDGERS, shift_id)?
        .ok_or_else(|| AppError::not_found("shift ledger", shift_id))
}

#[cfg(test)]
mod tests;
