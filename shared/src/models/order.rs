//! Order Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Takeaway,
}

/// Order status
///
/// ```text
/// pending ─▶ preparing ─▶ ready ─▶ awaiting_payment ─▶ served
///    │           │          │              │
///    ▼           └──────────┴──────────────┴──▶ cancelled (elevated only)
/// cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Ready,
    AwaitingPayment,
    Served,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Served => "served",
            Self::Cancelled => "cancelled",
        }
    }

    /// `served` and `cancelled` are never left once entered
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Served | Self::Cancelled)
    }

    /// The single source of truth for the status graph.
    ///
    /// `elevated` unlocks cancelling an order that was already sent to the
    /// kitchen; it never unlocks any other edge.
    pub fn can_transition_to(&self, target: OrderStatus, elevated: bool) -> bool {
        use OrderStatus::*;
        match (self, target) {
            (Pending, Preparing)
            | (Preparing, Ready)
            | (Ready, AwaitingPayment)
            | (AwaitingPayment, Served)
            | (Pending, Cancelled) => true,
            (Preparing | Ready | AwaitingPayment, Cancelled) => elevated,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub sort_order: u32,
    /// Base price + size delta + modifiers
    pub unit_price: Decimal,
}

impl OrderItem {
    /// `None` on overflow
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Item payload for `add_item`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One recorded status edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor_id: String,
    pub at: i64,
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Monotonic number shown on tickets and kitchen displays
    pub display_number: u64,
    pub order_type: OrderType,
    /// Present iff dine-in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    pub shift_id: String,
    pub terminal_id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    /// Sum of completed payments
    pub paid: Decimal,
    #[serde(default)]
    pub status_history: Vec<StatusChange>,
    pub created_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Recompute `total` from the item lines
    pub fn recalculate_total(&mut self) -> AppResult<()> {
        self.total = self
            .items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| sum.checked_add(item.line_total()?))
            .ok_or_else(|| AppError::amount_overflow("order total"))?;
        Ok(())
    }

    /// Add a completed payment to `paid`
    pub fn add_paid(&mut self, amount: Decimal) -> AppResult<()> {
        self.paid = self
            .paid
            .checked_add(amount)
            .ok_or_else(|| AppError::amount_overflow("order paid"))?;
        Ok(())
    }

    pub fn is_fully_paid(&self) -> bool {
        self.paid >= self.total
    }

    pub fn next_sort_order(&self) -> u32 {
        self.items
            .iter()
            .map(|i| i.sort_order + 1)
            .max()
            .unwrap_or(0)
    }
}
