//! 事件总线
//!
//! # 架构
//!
//! ```text
//! Outbox::dispatch() ──▶ EventBus::publish() ──▶ broadcast::Sender<ScopedEvent>
//!                                                   │
//!                        ┌──────────────────────────┼───────────────────┐
//!                        ▼                          ▼                   ▼
//!              subscribe_scope(Shift)    subscribe_scope(Table)   subscribe()
//!              (收银台 / 班次显示)          (桌台显示)              (SSE 全量)
//! ```
//!
//! Delivery is best-effort: publishing never fails the caller, and a slow
//! subscriber that lags simply skips ahead.

use shared::event::{EdgeEvent, EventScope, ScopedEvent};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// 事件总线 - broadcast 通道封装
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScopedEvent>,
}

impl EventBus {
    /// Capacity of the broadcast ring (default: 4096)
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 发布事件 (fire-and-forget)
    pub fn publish(&self, event: ScopedEvent) {
        let name = event.event.name();
        match self.tx.send(event) {
            Ok(receivers) => tracing::trace!(event = name, receivers, "Event published"),
            Err(_) => tracing::debug!(event = name, "No subscribers, event dropped"),
        }
    }

    /// Convenience for publishing outside a command (sweeps)
    pub fn emit(&self, event: EdgeEvent, scopes: Vec<EventScope>) {
        self.publish(ScopedEvent {
            scopes,
            event,
            emitted_at: shared::util::now_millis(),
        });
    }

    /// 订阅全部事件
    pub fn subscribe(&self) -> broadcast::Receiver<ScopedEvent> {
        self.tx.subscribe()
    }

    /// 订阅单一作用域（班次或桌台）
    pub fn subscribe_scope(&self, scope: EventScope) -> ScopedReceiver {
        ScopedReceiver {
            scope,
            rx: self.tx.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiver yielding only events addressed to one scope
#[derive(Debug)]
pub struct ScopedReceiver {
    scope: EventScope,
    rx: broadcast::Receiver<ScopedEvent>,
}

impl ScopedReceiver {
    /// Next matching event, `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<ScopedEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.matches(&self.scope) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(scope = ?self.scope, skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant for tests and polling displays
    pub fn try_recv(&mut self) -> Option<ScopedEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.matches(&self.scope) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn scope(&self) -> &EventScope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn released(table: &str) -> EdgeEvent {
        EdgeEvent::TableReleased {
            table_id: table.into(),
            order_id: "o1".into(),
        }
    }

    #[tokio::test]
    async fn test_scoped_subscribers_only_see_their_scope() {
        let bus = EventBus::new(16);
        let mut t5 = bus.subscribe_scope(EventScope::Table("T5".into()));
        let mut shift = bus.subscribe_scope(EventScope::Shift("s1".into()));

        bus.emit(released("T4"), vec![EventScope::Table("T4".into())]);
        bus.emit(
            released("T5"),
            vec![EventScope::Table("T5".into()), EventScope::Shift("s1".into())],
        );

        let got = t5.recv().await.unwrap();
        assert_eq!(got.event, released("T5"));
        assert!(t5.try_recv().is_none());

        let got = shift.recv().await.unwrap();
        assert_eq!(got.event, released("T5"));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit(released("T1"), vec![EventScope::Table("T1".into())]);
        assert_eq!(bus.receiver_count(), 0);
    }
}
