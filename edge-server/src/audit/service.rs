//! 审计日志服务
//!
//! `AuditService` 持有 mpsc 发送端和存储：
//! - 提交后通知 worker（非阻塞，通道满时仅记录日志）
//! - 日志查询 / 链验证直接读取 storage

use tokio::sync::mpsc;

use super::storage::AuditStorage;
use super::types::{AuditChainVerification, AuditQuery};
use crate::db::{Storage, StorageResult};
use shared::models::AuditLogEntry;

/// 审计日志服务
#[derive(Debug, Clone)]
pub struct AuditService {
    storage: AuditStorage,
    tx: mpsc::Sender<u64>,
}

impl AuditService {
    /// Create the service and the receiver its worker consumes
    pub fn new(storage: Storage, buffer_size: usize) -> (Self, mpsc::Receiver<u64>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let service = Self {
            storage: AuditStorage::new(storage),
            tx,
        };
        (service, rx)
    }

    /// Wake the worker for a freshly committed outbox row.
    ///
    /// Never blocks. A dropped wake-up is recovered by the next flush because
    /// the row itself is durable.
    pub fn notify(&self, outbox_id: u64) {
        match self.tx.try_send(outbox_id) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(outbox_id, "Audit channel full, entry deferred to next flush");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(outbox_id, "Audit worker stopped, entry left in outbox");
            }
        }
    }

    pub fn query(&self, q: &AuditQuery) -> StorageResult<Vec<AuditLogEntry>> {
        self.storage.query(q)
    }

    pub fn verify_chain(&self) -> StorageResult<AuditChainVerification> {
        self.storage.verify_chain()
    }

    pub fn storage(&self) -> &AuditStorage {
        &self.storage
    }
}
