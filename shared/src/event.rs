//! Real-time events
//!
//! Published after commit; each event names the shift and/or table scopes
//! whose displays should hear about it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{OrderStatus, PaymentMethod};

/// Fan-out scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EventScope {
    Shift(String),
    Table(String),
}

/// Typed event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeEvent {
    OrderCreated {
        order_id: String,
        display_number: u64,
    },
    OrderItemsChanged {
        order_id: String,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },
    OrderCancelled {
        order_id: String,
        voided: bool,
        reason: Option<String>,
    },
    PaymentRecorded {
        order_id: String,
        payment_id: String,
        amount: Decimal,
        method: PaymentMethod,
    },
    TableLocked {
        table_id: String,
        order_id: String,
    },
    TableReleased {
        table_id: String,
        order_id: String,
    },
    ShiftStarted {
        shift_id: String,
        staff_id: String,
    },
    ShiftClosed {
        shift_id: String,
        variance: Decimal,
    },
    LedgerChanged {
        shift_id: String,
        expected_cash: Decimal,
    },
}

impl EdgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderCreated { .. } => "order_created",
            Self::OrderItemsChanged { .. } => "order_items_changed",
            Self::OrderStatusChanged { .. } => "order_status_changed",
            Self::OrderCancelled { .. } => "order_cancelled",
            Self::PaymentRecorded { .. } => "payment_recorded",
            Self::TableLocked { .. } => "table_locked",
            Self::TableReleased { .. } => "table_released",
            Self::ShiftStarted { .. } => "shift_started",
            Self::ShiftClosed { .. } => "shift_closed",
            Self::LedgerChanged { .. } => "ledger_changed",
        }
    }
}

/// Event plus the scopes it is delivered to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedEvent {
    pub scopes: Vec<EventScope>,
    pub event: EdgeEvent,
    pub emitted_at: i64,
}

impl ScopedEvent {
    pub fn matches(&self, scope: &EventScope) -> bool {
        self.scopes.contains(scope)
    }
}
