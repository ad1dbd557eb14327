//! 桌台占用对账调度器
//!
//! 启动时扫描一次，之后每 `interval` 扫描一次，释放订单已终结（或订单
//! 不存在）的占用记录。仅用于纠正崩溃遗留，不参与正常释放流程。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::TableLock;
use crate::db::Storage;
use crate::message::Outbox;

pub struct OccupancySweeper {
    storage: Storage,
    outbox: Outbox,
    interval: Duration,
    shutdown: CancellationToken,
}

impl OccupancySweeper {
    pub fn new(storage: Storage, outbox: Outbox, interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            storage,
            outbox,
            interval: interval.max(Duration::from_secs(1)),
            shutdown,
        }
    }

    /// 主循环：启动扫描 + 固定间隔扫描
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Occupancy sweeper started");

        // 启动时立即扫描一次
        self.sweep_once().await;

        let mut ticker = tokio::time::interval(self.interval);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Occupancy sweeper received shutdown signal");
                    return;
                }
            }
        }
    }

    /// One sweep on the blocking pool (waits for the redb write slot)
    async fn sweep_once(&self) -> Vec<String> {
        let (storage, outbox) = (self.storage.clone(), self.outbox.clone());
        match tokio::task::spawn_blocking(move || TableLock::sweep_stale(&storage, &outbox)).await {
            Ok(Ok(freed)) if freed.is_empty() => {
                tracing::debug!("No stale table locks");
                freed
            }
            Ok(Ok(freed)) => {
                tracing::warn!(count = freed.len(), tables = ?freed, "Stale table locks released");
                freed
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Occupancy sweep failed");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "Occupancy sweep task failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditService;
    use crate::message::{Effects, EventBus};
    use crate::tables::Claim;

    #[tokio::test]
    async fn test_sweep_waits_for_writer_without_blocking_runtime() {
        let storage = Storage::open_in_memory().unwrap();
        let (audit, _rx) = AuditService::new(storage.clone(), 8);
        let outbox = Outbox::new(audit, EventBus::new(8));
        let txn = storage.begin_write().unwrap();
        TableLock::acquire(
            &txn,
            &mut Effects::new(),
            Claim {
                table_id: "T9",
                order_id: "gone",
                terminal_id: "term-1",
                staff_id: "staff-1",
            },
        )
        .unwrap();
        txn.commit().unwrap();

        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let writer = std::thread::spawn({
            let storage = storage.clone();
            move || {
                let txn = storage.begin_write().unwrap();
                locked_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(300));
                txn.commit().unwrap();
            }
        });
        locked_rx.recv().unwrap();

        let sweeper = OccupancySweeper::new(storage.clone(), outbox, Duration::from_secs(60), CancellationToken::new());
        let sweep = tokio::spawn(async move { sweeper.sweep_once().await });

        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(250));
        assert!(!sweep.is_finished());

        assert_eq!(sweep.await.unwrap(), vec!["T9".to_string()]);
        writer.join().unwrap();
        assert!(TableLock::get(&storage, "T9").unwrap().is_none());
    }
}
