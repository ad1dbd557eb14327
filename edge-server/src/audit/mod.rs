//! 审计日志模块 — 防篡改审计追踪
//!
//! # 架构
//!
//! ```text
//! command txn ──▶ audit_outbox (same atomic unit as the state change)
//!      │ commit
//!      ▼
//! AuditService::notify() ─ mpsc ─▶ AuditWorker ─▶ audit_log (hash chain)
//!                                        │ retries exhausted
//!                                        ▼
//!                                 audit_dead_letter
//! ```
//!
//! SHA256 哈希链: genesis → entry₁ → entry₂ → ... → entryₙ
//!
//! Chaining failures are logged and never reach the command caller.

pub mod service;
pub mod storage;
pub mod types;
pub mod worker;

pub use service::AuditService;
pub use storage::AuditStorage;
pub use types::{
    AuditChainBreak, AuditChainVerification, AuditQuery, ChainBreakReason, DeadLetterAudit,
    PendingAudit,
};
pub use worker::{AuditWorker, FlushReport};
