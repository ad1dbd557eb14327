//! Shift Model (班次管理)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PaymentMethod;
use crate::error::{AppError, AppResult};

/// Shift record - one staff member's session at one terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub staff_id: String,
    pub terminal_id: String,
    pub started_at: i64,
    /// None while the shift is active
    pub ended_at: Option<i64>,
    /// Cash counted at close
    pub counted_cash: Option<Decimal>,
    /// Expected cash frozen at close
    pub expected_cash: Option<Decimal>,
    /// counted - expected
    pub variance: Option<Decimal>,
    pub closed_by: Option<String>,
    /// Manager who approved an out-of-threshold variance
    pub approved_by: Option<String>,
}

impl Shift {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Running totals of one shift, updated incrementally as payments land
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftLedger {
    pub shift_id: String,
    pub terminal_id: String,
    pub cash_total: Decimal,
    pub card_total: Decimal,
    pub other_total: Decimal,
    /// Cash removed from the drawer (positive amounts)
    pub drops: Decimal,
    /// Signed manual corrections
    pub adjustments: Decimal,
    pub payment_count: u32,
    pub served_orders: u32,
    pub sales_total: Decimal,
    pub updated_at: i64,
}

impl ShiftLedger {
    pub fn new(shift_id: impl Into<String>, terminal_id: impl Into<String>, now: i64) -> Self {
        Self {
            shift_id: shift_id.into(),
            terminal_id: terminal_id.into(),
            cash_total: Decimal::ZERO,
            card_total: Decimal::ZERO,
            other_total: Decimal::ZERO,
            drops: Decimal::ZERO,
            adjustments: Decimal::ZERO,
            payment_count: 0,
            served_orders: 0,
            sales_total: Decimal::ZERO,
            updated_at: now,
        }
    }

    /// Σ completed cash payments − drops + adjustments, `None` on overflow
    pub fn expected_cash(&self) -> Option<Decimal> {
        self.cash_total.checked_sub(self.drops)?.checked_add(self.adjustments)
    }

    pub fn add_payment(&mut self, method: PaymentMethod, amount: Decimal, now: i64) -> AppResult<()> {
        self.apply(now, |next| {
            let bucket = match method {
                PaymentMethod::Cash => &mut next.cash_total,
                PaymentMethod::Card => &mut next.card_total,
                PaymentMethod::Other => &mut next.other_total,
            };
            *bucket = bucket.checked_add(amount)?;
            next.payment_count = next.payment_count.checked_add(1)?;
            Some(())
        })
    }

    pub fn add_drop(&mut self, amount: Decimal, now: i64) -> AppResult<()> {
        self.apply(now, |next| {
            next.drops = next.drops.checked_add(amount)?;
            Some(())
        })
    }

    pub fn add_adjustment(&mut self, amount: Decimal, now: i64) -> AppResult<()> {
        self.apply(now, |next| {
            next.adjustments = next.adjustments.checked_add(amount)?;
            Some(())
        })
    }

    pub fn add_sale(&mut self, order_total: Decimal, now: i64) -> AppResult<()> {
        self.apply(now, |next| {
            next.sales_total = next.sales_total.checked_add(order_total)?;
            next.served_orders = next.served_orders.checked_add(1)?;
            Some(())
        })
    }

    /// All-or-nothing update; expected cash must stay representable
    fn apply(&mut self, now: i64, update: impl FnOnce(&mut Self) -> Option<()>) -> AppResult<()> {
        let mut next = self.clone();
        update(&mut next)
            .and_then(|()| next.expected_cash())
            .ok_or_else(|| AppError::amount_overflow("shift ledger"))?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }
}
