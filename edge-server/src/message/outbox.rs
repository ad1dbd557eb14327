//! Post-commit side effects
//!
//! A command collects its audit rows and events in [`Effects`] while its
//! transaction is open. Audit rows are written into the same transaction;
//! events are held in memory. [`Outbox::dispatch`] runs only after
//! `commit()` succeeds, so a rolled-back command never notifies anyone.

use redb::WriteTransaction;
use shared::event::{EdgeEvent, EventScope, ScopedEvent};

use super::bus::EventBus;
use crate::audit::{AuditService, AuditStorage, PendingAudit};
use crate::db::StorageResult;

/// Side effects produced by one command
#[derive(Debug, Default)]
pub struct Effects {
    audit_ids: Vec<u64>,
    events: Vec<ScopedEvent>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an audit row in the command transaction
    pub fn audit(&mut self, txn: &WriteTransaction, entry: PendingAudit) -> StorageResult<()> {
        let id = AuditStorage::enqueue(txn, &entry)?;
        self.audit_ids.push(id);
        Ok(())
    }

    /// Queue an event for after commit
    pub fn emit(&mut self, event: EdgeEvent, scopes: Vec<EventScope>) {
        self.events.push(ScopedEvent {
            scopes,
            event,
            emitted_at: shared::util::now_millis(),
        });
    }

    pub fn events(&self) -> &[ScopedEvent] {
        &self.events
    }

    pub fn audit_count(&self) -> usize {
        self.audit_ids.len()
    }
}

/// Dispatches committed effects to the audit worker and the event bus
#[derive(Debug, Clone)]
pub struct Outbox {
    audit: AuditService,
    bus: EventBus,
}

impl Outbox {
    pub fn new(audit: AuditService, bus: EventBus) -> Self {
        Self { audit, bus }
    }

    pub fn dispatch(&self, fx: Effects) {
        if let Some(last) = fx.audit_ids.last() {
            self.audit.notify(*last);
        }
        for event in fx.events {
            self.bus.publish(event);
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn audit(&self) -> &AuditService {
        &self.audit
    }
}
