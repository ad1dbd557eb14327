//! 审计日志后台 Worker
//!
//! 收到通知后按 outbox 顺序把待写条目接到哈希链上。
//! 单条失败重试 `max_retries` 次后进入死信表，不阻塞后续条目。
//! 通道关闭或取消令牌触发时做最后一次 flush 后退出。

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::storage::AuditStorage;
use crate::db::StorageResult;

/// Result of one flush pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub appended: usize,
    pub dead_lettered: usize,
}

/// 审计日志后台 Worker
pub struct AuditWorker {
    storage: AuditStorage,
    max_retries: u32,
    retry_delay: Duration,
}

impl AuditWorker {
    pub fn new(storage: AuditStorage, max_retries: u32) -> Self {
        Self {
            storage,
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_millis(50),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// 运行 worker（直到通道关闭或取消）
    pub async fn run(self, mut rx: mpsc::Receiver<u64>, shutdown: CancellationToken) {
        tracing::info!("📋 Audit log worker started");

        // Rows left behind by a crash or a full channel
        let recovered = self.flush().await;
        if recovered.appended > 0 {
            tracing::info!(count = recovered.appended, "Recovered pending audit entries");
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.flush().await;
                    break;
                }
                msg = rx.recv() => match msg {
                    Some(outbox_id) => {
                        tracing::trace!(outbox_id, "Audit wake-up");
                        // Coalesce queued wake-ups into one pass
                        while rx.try_recv().is_ok() {}
                        self.flush().await;
                    }
                    None => {
                        self.flush().await;
                        break;
                    }
                },
            }
        }

        tracing::info!("Audit log worker stopping");
    }

    /// Chain every pending outbox row in order
    pub async fn flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        let ids = match self.blocking(|s| s.pending_ids()).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list audit outbox");
                return report;
            }
        };

        for outbox_id in ids {
            let mut attempts = 0;
            loop {
                attempts += 1;
                match self.blocking(move |s| s.append_pending(outbox_id)).await {
                    Ok(Some(entry)) => {
                        tracing::debug!(
                            sequence = entry.sequence,
                            action = %entry.action,
                            entity = %entry.entity_type,
                            "Audit entry recorded"
                        );
                        report.appended += 1;
                        break;
                    }
                    Ok(None) => break,
                    Err(e) if attempts < self.max_retries => {
                        tracing::warn!(outbox_id, attempts, error = %e, "Audit append failed, retrying");
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    Err(e) => {
                        tracing::error!(outbox_id, attempts, error = %e, "Audit entry dead-lettered");
                        let dead = self.blocking(move |s| s.dead_letter(outbox_id, attempts, &e)).await;
                        if let Err(dl) = dead {
                            tracing::error!(outbox_id, error = %dl, "Failed to dead-letter audit entry");
                        } else {
                            report.dead_lettered += 1;
                        }
                        break;
                    }
                }
            }
        }
        report
    }

    /// redb writes wait for the single writer slot; keep them off the runtime threads
    async fn blocking<T, F>(&self, op: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&AuditStorage) -> StorageResult<T> + Send + 'static,
    {
        let storage = self.storage.clone();
        match tokio::task::spawn_blocking(move || op(&storage)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("audit task failed: {e}")),
        }
    }
}
