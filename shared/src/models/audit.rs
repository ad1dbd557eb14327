//! Audit log types
//!
//! 审计日志条目不可变、不可删除，支持 SHA256 哈希链防篡改。

use serde::{Deserialize, Serialize};

/// 审计操作类型（枚举，非自由文本）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // ═══ 订单 ═══
    OrderCreated,
    OrderSubmitted,
    OrderReady,
    OrderPaymentRequested,
    OrderCheckedOut,
    OrderCancelled,
    OrderVoided,
    PaymentRecorded,
    PaymentFailed,

    // ═══ 桌台 ═══
    TableReleased,

    // ═══ 班次 ═══
    ShiftStarted,
    ShiftClosed,
    CashDropRecorded,
    CashAdjustmentRecorded,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 审计日志条目（不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Global sequence, starts at 1
    pub sequence: u64,
    pub timestamp: i64,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    /// None for system actions (sweeps)
    pub actor_id: Option<String>,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    pub prev_hash: String,
    pub curr_hash: String,
}
