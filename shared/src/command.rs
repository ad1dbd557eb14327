//! Command envelope
//!
//! Every mutating call, from any terminal, is one [`CommandEnvelope`]. The
//! same envelope is what the offline queue persists and replays.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    Order, OrderItemInput, OrderType, Payment, PaymentMethod, Shift, ShiftLedger,
};

/// `{resourceId, actorId, payload, clientRequestId?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Target order / shift id. None for creating commands.
    #[serde(default)]
    pub resource_id: Option<String>,
    pub actor_id: String,
    pub payload: ServerCommand,
    /// Idempotency key for retried calls
    #[serde(default)]
    pub client_request_id: Option<String>,
}

impl CommandEnvelope {
    pub fn new(actor_id: impl Into<String>, payload: ServerCommand) -> Self {
        Self {
            resource_id: None,
            actor_id: actor_id.into(),
            payload,
            client_request_id: None,
        }
    }

    pub fn on(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_request_id(mut self, client_request_id: impl Into<String>) -> Self {
        self.client_request_id = Some(client_request_id.into());
        self
    }
}

/// Gateway-reported payment result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    Completed,
    Failed,
}

/// Typed command payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerCommand {
    // ═══ 订单 ═══
    CreateOrder {
        order_type: OrderType,
        #[serde(default)]
        table_id: Option<String>,
    },
    AddItem {
        item: OrderItemInput,
    },
    RemoveItem {
        item_id: String,
    },
    UpdateQuantity {
        item_id: String,
        quantity: u32,
    },
    SubmitToKitchen,
    MarkReady,
    RequestPayment,
    Checkout,
    Cancel {
        #[serde(default)]
        reason: Option<String>,
    },
    VoidOrder {
        reason: String,
    },

    // ═══ 支付 ═══
    RecordPayment {
        amount: Decimal,
        method: PaymentMethod,
    },
    GatewayReport {
        amount: Decimal,
        method: PaymentMethod,
        #[serde(default)]
        reference: Option<String>,
        outcome: GatewayOutcome,
    },

    // ═══ 班次 ═══
    StartShift {
        terminal_id: String,
    },
    CloseShift {
        counted_cash: Decimal,
        #[serde(default)]
        approver_id: Option<String>,
    },
    RecordCashDrop {
        amount: Decimal,
    },
    RecordCashAdjustment {
        amount: Decimal,
        reason: String,
    },
}

impl ServerCommand {
    /// Idempotency scope tag
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::CreateOrder { .. }
            | Self::AddItem { .. }
            | Self::RemoveItem { .. }
            | Self::UpdateQuantity { .. }
            | Self::SubmitToKitchen
            | Self::MarkReady
            | Self::RequestPayment
            | Self::Checkout
            | Self::Cancel { .. }
            | Self::VoidOrder { .. } => "order",
            Self::RecordPayment { .. } | Self::GatewayReport { .. } => "payment",
            Self::StartShift { .. } | Self::CloseShift { .. } => "shift",
            Self::RecordCashDrop { .. } | Self::RecordCashAdjustment { .. } => "cash_movement",
        }
    }

    /// Whether the command needs `resource_id`
    pub fn targets_resource(&self) -> bool {
        !matches!(self, Self::CreateOrder { .. } | Self::StartShift { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateOrder { .. } => "create_order",
            Self::AddItem { .. } => "add_item",
            Self::RemoveItem { .. } => "remove_item",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::SubmitToKitchen => "submit_to_kitchen",
            Self::MarkReady => "mark_ready",
            Self::RequestPayment => "request_payment",
            Self::Checkout => "checkout",
            Self::Cancel { .. } => "cancel",
            Self::VoidOrder { .. } => "void_order",
            Self::RecordPayment { .. } => "record_payment",
            Self::GatewayReport { .. } => "gateway_report",
            Self::StartShift { .. } => "start_shift",
            Self::CloseShift { .. } => "close_shift",
            Self::RecordCashDrop { .. } => "record_cash_drop",
            Self::RecordCashAdjustment { .. } => "record_cash_adjustment",
        }
    }
}

/// Resource snapshot returned by a successful command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource", content = "data", rename_all = "snake_case")]
pub enum CommandOutcome {
    Order(Order),
    Payment(Payment),
    Shift(Shift),
    Ledger(ShiftLedger),
}

impl CommandOutcome {
    pub fn as_order(&self) -> Option<&Order> {
        match self {
            Self::Order(o) => Some(o),
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Order(o) => &o.id,
            Self::Payment(p) => &p.id,
            Self::Shift(s) => &s.id,
            Self::Ledger(l) => &l.shift_id,
        }
    }
}
