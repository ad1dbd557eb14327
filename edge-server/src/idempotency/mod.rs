//! Idempotent Command Processor
//!
//! Wraps a mutating operation so a retried client request applies at most
//! once. The stored result is written in the same `WriteTransaction` as the
//! operation's effects:
//!
//! ```text
//! execute(key, resource_type, op)
//!     ├─ 1. fast path: record exists → return stored result
//!     ├─ 2. begin_write (serialized with every other command)
//!     ├─ 3. re-check inside txn → lost the race, return winner's result
//!     ├─ 4. op(txn, fx)            (error → txn dropped, nothing stored)
//!     ├─ 5. insert IdempotencyRecord
//!     ├─ 6. commit
//!     └─ 7. outbox.dispatch(fx)    (audit wake-up + events)
//! ```
//!
//! Keys are scoped as `"{resource_type}:{key}"`.

use redb::WriteTransaction;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::error::{AppError, AppResult};
use shared::models::IdempotencyRecord;

use crate::db::Storage;
use crate::db::storage::{self, IDEMPOTENCY};
use crate::message::{Effects, Outbox};

/// Default upper bound for client request ids
pub const DEFAULT_KEY_MAX_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct CommandProcessor {
    storage: Storage,
    outbox: Outbox,
    key_max_len: usize,
}

impl CommandProcessor {
    pub fn new(storage: Storage, outbox: Outbox, key_max_len: usize) -> Self {
        Self {
            storage,
            outbox,
            key_max_len,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Run `op` in one transaction, at most once per `(resource_type, key)`.
    ///
    /// Without a key the operation simply runs in its own transaction.
    /// Failed operations store nothing, so the same key may be retried.
    pub fn execute<T, F>(&self, key: Option<&str>, resource_type: &str, op: F) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&WriteTransaction, &mut Effects) -> AppResult<T>,
    {
        let scoped = match key {
            Some(key) => {
                self.validate_key(key)?;
                Some(scoped_key(resource_type, key))
            }
            None => None,
        };

        if let Some(scoped) = &scoped
            && let Some(record) = self.storage.read_json::<IdempotencyRecord>(IDEMPOTENCY, scoped)?
        {
            tracing::debug!(key = %scoped, "Idempotent replay");
            return decode_result(record);
        }

        let txn = self.storage.begin_write()?;

        if let Some(scoped) = &scoped
            && let Some(record) = storage::get_json::<IdempotencyRecord>(&txn, IDEMPOTENCY, scoped)?
        {
            // A concurrent request with the same key committed first
            tracing::debug!(key = %scoped, "Idempotent replay after concurrent commit");
            return decode_result(record);
        }

        let mut fx = Effects::new();
        let result = op(&txn, &mut fx)?;

        if let Some(scoped) = &scoped {
            let record = IdempotencyRecord {
                key: scoped.clone(),
                resource_type: resource_type.to_string(),
                result: serde_json::to_value(&result).map_err(|e| AppError::internal(e.to_string()))?,
                created_at: shared::util::now_millis(),
            };
            storage::put_json(&txn, IDEMPOTENCY, scoped, &record)?;
        }

        txn.commit()?;
        self.outbox.dispatch(fx);
        Ok(result)
    }

    /// Stored record for a key, if any
    pub fn lookup(&self, resource_type: &str, key: &str) -> AppResult<Option<IdempotencyRecord>> {
        Ok(self
            .storage
            .read_json(IDEMPOTENCY, &scoped_key(resource_type, key))?)
    }

    fn validate_key(&self, key: &str) -> AppResult<()> {
        if key.trim().is_empty() {
            return Err(AppError::validation("client_request_id must not be empty"));
        }
        if key.len() > self.key_max_len {
            return Err(AppError::validation(format!(
                "client_request_id is too long ({} chars, max {})",
                key.len(),
                self.key_max_len
            )));
        }
        Ok(())
    }
}

fn scoped_key(resource_type: &str, key: &str) -> String {
    format!("{resource_type}:{key}")
}

fn decode_result<T: DeserializeOwned>(record: IdempotencyRecord) -> AppResult<T> {
    serde_json::from_value(record.result).map_err(|e| {
        tracing::error!(key = %record.key, error = %e, "Stored idempotent result no longer decodes");
        AppError::internal(format!("stored result for {} is unreadable", record.key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditService;
    use crate::db::storage::COUNTERS;
    use crate::message::EventBus;
    use redb::ReadableTable;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn processor() -> (CommandProcessor, tokio::sync::mpsc::Receiver<u64>) {
        let storage = Storage::open_in_memory().unwrap();
        let (audit, rx) = AuditService::new(storage.clone(), 64);
        let outbox = Outbox::new(audit, EventBus::new(16));
        (CommandProcessor::new(storage, outbox, DEFAULT_KEY_MAX_LEN), rx)
    }

    /// Increments a counter row so side effects are observable in storage
    fn bump(txn: &WriteTransaction) -> AppResult<u64> {
        Ok(storage::next_counter(txn, "side_effect")?)
    }

    fn side_effects(p: &CommandProcessor) -> u64 {
        let txn = p.storage().begin_read().unwrap();
        let table = txn.open_table(COUNTERS).unwrap();
        table.get("side_effect").unwrap().map(|g| g.value()).unwrap_or(0)
    }

    #[test]
    fn test_replay_returns_stored_result() {
        let (p, _rx) = processor();
        let first: u64 = p.execute(Some("req-1"), "order", |txn, _| bump(txn)).unwrap();
        let second: u64 = p.execute(Some("req-1"), "order", |txn, _| bump(txn)).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(side_effects(&p), 1);
    }

    #[test]
    fn test_keys_are_scoped_by_resource_type() {
        let (p, _rx) = processor();
        let a: u64 = p.execute(Some("same"), "order", |txn, _| bump(txn)).unwrap();
        let b: u64 = p.execute(Some("same"), "shift", |txn, _| bump(txn)).unwrap();
        assert_ne!(a, b);
        assert!(p.lookup("order", "same").unwrap().is_some());
        assert!(p.lookup("payment", "same").unwrap().is_none());
    }

    #[test]
    fn test_failure_is_not_stored() {
        let (p, _rx) = processor();
        let err = p
            .execute::<u64, _>(Some("req-2"), "order", |txn, _| {
                bump(txn)?;
                Err(AppError::validation("boom"))
            })
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(side_effects(&p), 0);
        assert!(p.lookup("order", "req-2").unwrap().is_none());

        let retried: u64 = p.execute(Some("req-2"), "order", |txn, _| bump(txn)).unwrap();
        assert_eq!(retried, 1);
    }

    #[test]
    fn test_no_key_always_executes() {
        let (p, _rx) = processor();
        p.execute(None, "order", |txn, _| bump(txn)).unwrap();
        p.execute(None, "order", |txn, _| bump(txn)).unwrap();
        assert_eq!(side_effects(&p), 2);
    }

    #[test]
    fn test_key_validation() {
        let (p, _rx) = processor();
        let long = "k".repeat(DEFAULT_KEY_MAX_LEN + 1);
        let err = p.execute(Some(&long), "order", |txn, _| bump(txn)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let err = p.execute(Some("  "), "order", |txn, _| bump(txn)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(side_effects(&p), 0);
    }

    #[test]
    fn test_concurrent_same_key_runs_once() {
        let (p, _rx) = processor();
        let p = Arc::new(p);
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let p = p.clone();
                let runs = runs.clone();
                std::thread::spawn(move || {
                    p.execute(Some("race"), "order", |txn, _| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        bump(txn)
                    })
                    .unwrap()
                })
            })
            .collect();
        let results: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| *r == 1));
        assert_eq!(side_effects(&p), 1);
    }

    #[test]
    fn test_effects_dispatched_after_commit_only() {
        let (p, mut rx) = processor();
        let mut events = p.outbox().bus().subscribe();

        let _ = p.execute::<(), _>(Some("fail"), "order", |txn, fx| {
            fx.audit(
                txn,
                crate::audit::PendingAudit::new(shared::models::AuditAction::OrderCreated, "order", "o1", None),
            )?;
            fx.emit(
                shared::event::EdgeEvent::OrderCreated {
                    order_id: "o1".into(),
                    display_number: 1,
                },
                vec![],
            );
            Err(AppError::invalid_state("rolled back"))
        });
        assert!(rx.try_recv().is_err());
        assert!(events.try_recv().is_err());

        p.execute::<(), _>(Some("ok"), "order", |txn, fx| {
            fx.audit(
                txn,
                crate::audit::PendingAudit::new(shared::models::AuditAction::OrderCreated, "order", "o2", None),
            )?;
            fx.emit(
                shared::event::EdgeEvent::OrderCreated {
                    order_id: "o2".into(),
                    display_number: 2,
                },
                vec![],
            );
            Ok(())
        })
        .unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(events.try_recv().is_ok());
    }
}
