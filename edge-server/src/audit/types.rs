//! 审计日志类型定义
//!
//! 条目本身（`AuditLogEntry` / `AuditAction`）在 `shared::models::audit`，
//! 这里是 outbox、死信和链验证相关的结构。

use serde::{Deserialize, Serialize};
use shared::models::AuditAction;

/// Audit intent written to `audit_outbox` inside the command transaction.
///
/// The worker turns it into a chained `AuditLogEntry` after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAudit {
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    /// None for system actions (sweeps)
    pub actor_id: Option<String>,
    pub before: serde_json::Value,
    pub after: serde_json::Value,
    /// Commit-side timestamp
    pub occurred_at: i64,
}

impl PendingAudit {
    pub fn new(
        action: AuditAction,
        entity_type: &str,
        entity_id: impl Into<String>,
        actor_id: Option<&str>,
    ) -> Self {
        Self {
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.into(),
            actor_id: actor_id.map(str::to_string),
            before: serde_json::Value::Null,
            after: serde_json::Value::Null,
            occurred_at: shared::util::now_millis(),
        }
    }

    /// Attach before/after snapshots
    pub fn snapshots<B: Serialize, A: Serialize>(mut self, before: &B, after: &A) -> Self {
        self.before = serde_json::to_value(before).unwrap_or(serde_json::Value::Null);
        self.after = serde_json::to_value(after).unwrap_or(serde_json::Value::Null);
        self
    }

    /// Attach only the resulting state
    pub fn after<A: Serialize>(mut self, after: &A) -> Self {
        self.after = serde_json::to_value(after).unwrap_or(serde_json::Value::Null);
        self
    }
}

/// Outbox row that could not be chained after all retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterAudit {
    pub outbox_id: u64,
    /// Raw outbox payload (may be undecodable)
    pub payload: String,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: i64,
}

/// 审计日志查询参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

/// 审计链验证结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditChainVerification {
    /// 验证的记录总数
    pub total_entries: u64,
    /// 链是否完整
    pub chain_intact: bool,
    /// 断裂点列表
    pub breaks: Vec<AuditChainBreak>,
}

/// 审计链断裂点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditChainBreak {
    /// 断裂处的序列号
    pub sequence: u64,
    pub reason: ChainBreakReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainBreakReason {
    /// prev_hash does not match the previous entry
    BrokenLink,
    /// Stored fields do not hash to curr_hash
    HashMismatch,
    /// Sequence gap
    MissingEntry,
}
