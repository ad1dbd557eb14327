//! 审计日志 redb 存储层
//!
//! Append-only 设计，`audit_log` 没有任何删除/更新接口。
//! SHA256 哈希链确保防篡改。
//!
//! Writes arrive in two steps: the command transaction drops a
//! [`PendingAudit`] into `audit_outbox`, then [`AuditStorage::append_pending`]
//! moves the head of the outbox onto the chain in its own transaction.

use redb::{ReadableTable, WriteTransaction};
use sha2::{Digest, Sha256};
use shared::models::{AuditAction, AuditLogEntry};

use super::types::{
    AuditChainBreak, AuditChainVerification, AuditQuery, ChainBreakReason, DeadLetterAudit,
    PendingAudit,
};
use crate::db::storage::{
    AUDIT_DEAD_LETTER, AUDIT_LOG, AUDIT_OUTBOX, Storage, StorageResult, next_counter,
};

const GENESIS_HASH: &str = "genesis";
const OUTBOX_COUNTER: &str = "audit_outbox";

/// 审计日志存储
#[derive(Debug, Clone)]
pub struct AuditStorage {
    storage: Storage,
}

impl AuditStorage {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Write an audit intent into the caller's transaction.
    ///
    /// Rolls back together with the command.
    pub fn enqueue(txn: &WriteTransaction, entry: &PendingAudit) -> StorageResult<u64> {
        let id = next_counter(txn, OUTBOX_COUNTER)?;
        let bytes = serde_json::to_vec(entry)?;
        let mut table = txn.open_table(AUDIT_OUTBOX)?;
        table.insert(id, bytes.as_slice())?;
        Ok(id)
    }

    /// Outbox ids waiting to be chained, oldest first
    pub fn pending_ids(&self) -> StorageResult<Vec<u64>> {
        let txn = self.storage.begin_read()?;
        let table = txn.open_table(AUDIT_OUTBOX)?;
        let mut ids = Vec::new();
        for item in table.iter()? {
            let (key, _) = item?;
            ids.push(key.value());
        }
        Ok(ids)
    }

    /// Chain one outbox row.
    ///
    /// Returns `None` when the row is already gone (chained by an earlier
    /// flush), so calling it twice for the same id is harmless.
    pub fn append_pending(&self, outbox_id: u64) -> StorageResult<Option<AuditLogEntry>> {
        let txn = self.storage.begin_write()?;

        let raw = {
            let table = txn.open_table(AUDIT_OUTBOX)?;
            table.get(outbox_id)?.map(|guard| guard.value().to_vec())
        };
        let Some(raw) = raw else {
            return Ok(None);
        };
        let pending: PendingAudit = serde_json::from_slice(&raw)?;

        // 1. 读取当前最大序列号和 last_hash
        let (sequence, prev_hash) = {
            let table = txn.open_table(AUDIT_LOG)?;
            match table.last()? {
                Some((key, value)) => {
                    let last: AuditLogEntry = serde_json::from_slice(value.value())?;
                    (key.value() + 1, last.curr_hash)
                }
                None => (1, GENESIS_HASH.to_string()),
            }
        };

        // 2. 计算哈希（所有存储字段参与）
        let mut entry = AuditLogEntry {
            sequence,
            timestamp: pending.occurred_at,
            action: pending.action,
            entity_type: pending.entity_type,
            entity_id: pending.entity_id,
            actor_id: pending.actor_id,
            before: pending.before,
            after: pending.after,
            prev_hash,
            curr_hash: String::new(),
        };
        entry.curr_hash = compute_audit_hash(&entry);

        // 3. 写入并移出 outbox
        {
            let bytes = serde_json::to_vec(&entry)?;
            let mut log = txn.open_table(AUDIT_LOG)?;
            log.insert(sequence, bytes.as_slice())?;
        }
        {
            let mut outbox = txn.open_table(AUDIT_OUTBOX)?;
            outbox.remove(outbox_id)?;
        }
        txn.commit()?;

        Ok(Some(entry))
    }

    /// Chain every pending row without retries. Returns the number chained.
    pub fn drain_outbox(&self) -> StorageResult<usize> {
        let mut appended = 0;
        for id in self.pending_ids()? {
            if self.append_pending(id)?.is_some() {
                appended += 1;
            }
        }
        Ok(appended)
    }

    /// Move an outbox row to `audit_dead_letter`
    pub fn dead_letter(&self, outbox_id: u64, attempts: u32, error: &str) -> StorageResult<()> {
        let txn = self.storage.begin_write()?;
        let raw = {
            let mut outbox = txn.open_table(AUDIT_OUTBOX)?;
            outbox.remove(outbox_id)?.map(|guard| guard.value().to_vec())
        };
        if let Some(raw) = raw {
            let letter = DeadLetterAudit {
                outbox_id,
                payload: String::from_utf8_lossy(&raw).into_owned(),
                attempts,
                last_error: error.to_string(),
                failed_at: shared::util::now_millis(),
            };
            let bytes = serde_json::to_vec(&letter)?;
            let mut table = txn.open_table(AUDIT_DEAD_LETTER)?;
            table.insert(outbox_id, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn dead_letters(&self) -> StorageResult<Vec<DeadLetterAudit>> {
        let txn = self.storage.begin_read()?;
        let table = txn.open_table(AUDIT_DEAD_LETTER)?;
        let mut out = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    /// 查询审计日志（按序列号升序）
    pub fn query(&self, q: &AuditQuery) -> StorageResult<Vec<AuditLogEntry>> {
        Ok(self
            .all_entries()?
            .into_iter()
            .filter(|e| q.entity_type.as_deref().is_none_or(|t| e.entity_type == t))
            .filter(|e| q.entity_id.as_deref().is_none_or(|id| e.entity_id == id))
            .collect())
    }

    /// Entries for one entity
    pub fn entries_for(&self, entity_type: &str, entity_id: &str) -> StorageResult<Vec<AuditLogEntry>> {
        self.query(&AuditQuery {
            entity_type: Some(entity_type.to_string()),
            entity_id: Some(entity_id.to_string()),
        })
    }

    pub fn all_entries(&self) -> StorageResult<Vec<AuditLogEntry>> {
        let txn = self.storage.begin_read()?;
        let table = txn.open_table(AUDIT_LOG)?;
        let mut out = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    /// Actions in chain order, convenient for assertions
    pub fn actions(&self) -> StorageResult<Vec<AuditAction>> {
        Ok(self.all_entries()?.into_iter().map(|e| e.action).collect())
    }

    /// 验证整条哈希链
    pub fn verify_chain(&self) -> StorageResult<AuditChainVerification> {
        let entries = self.all_entries()?;
        let mut breaks = Vec::new();
        let mut expected_prev = GENESIS_HASH.to_string();
        let mut expected_seq = 1u64;

        for entry in &entries {
            if entry.sequence != expected_seq {
                breaks.push(AuditChainBreak {
                    sequence: entry.sequence,
                    reason: ChainBreakReason::MissingEntry,
                });
            }
            if entry.prev_hash != expected_prev {
                breaks.push(AuditChainBreak {
                    sequence: entry.sequence,
                    reason: ChainBreakReason::BrokenLink,
                });
            }
            if compute_audit_hash(entry) != entry.curr_hash {
                breaks.push(AuditChainBreak {
                    sequence: entry.sequence,
                    reason: ChainBreakReason::HashMismatch,
                });
            }
            expected_prev = entry.curr_hash.clone();
            expected_seq = entry.sequence + 1;
        }

        Ok(AuditChainVerification {
            total_entries: entries.len() as u64,
            chain_intact: breaks.is_empty(),
            breaks,
        })
    }
}

/// 计算审计条目的 SHA256 哈希
///
/// 所有存储字段（除 curr_hash）参与哈希，任何修改都会导致不匹配。
///
/// - 变长字段间用 `\x00` 分隔，防止 `("ab","cd")` 与 `("abc","d")` 碰撞
/// - 定长字段（u64/i64）用 LE 字节序，无需分隔
/// - Optional 字段用 `\x00`=None / `\x01`+bytes=Some 区分
/// - action 使用 serde 序列化（snake_case，跨版本稳定）
fn compute_audit_hash(entry: &AuditLogEntry) -> String {
    let mut hasher = Sha256::new();

    // 链接前一条哈希
    hasher.update(entry.prev_hash.as_bytes());
    hasher.update(b"\x00");

    // 定长字段
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.timestamp.to_le_bytes());

    let action_str = serde_json::to_string(&entry.action).unwrap_or_default();
    hasher.update(action_str.as_bytes());
    hasher.update(b"\x00");

    hasher.update(entry.entity_type.as_bytes());
    hasher.update(b"\x00");
    hasher.update(entry.entity_id.as_bytes());
    hasher.update(b"\x00");

    hash_optional(&mut hasher, entry.actor_id.as_deref());

    // serde_json::Value 对象键有序 (BTreeMap)，序列化结果稳定
    for snapshot in [&entry.before, &entry.after] {
        let json = serde_json::to_string(snapshot).unwrap_or_default();
        hasher.update(json.as_bytes());
        hasher.update(b"\x00");
    }

    hex::encode(hasher.finalize())
}

/// Optional 字段哈希：`\x00` = None, `\x01` + bytes + `\x00` = Some
fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update(b"\x01");
            hasher.update(v.as_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
    hasher.update(b"\x00");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enqueue(storage: &Storage, action: AuditAction, id: &str) -> u64 {
        let txn = storage.begin_write().unwrap();
        let pending = PendingAudit::new(action, "order", id, Some("staff-1"))
            .after(&serde_json::json!({ "status": "pending" }));
        let outbox_id = AuditStorage::enqueue(&txn, &pending).unwrap();
        txn.commit().unwrap();
        outbox_id
    }

    #[test]
    fn test_chain_links_entries() {
        let storage = Storage::open_in_memory().unwrap();
        let audit = AuditStorage::new(storage.clone());
        enqueue(&storage, AuditAction::OrderCreated, "o1");
        enqueue(&storage, AuditAction::OrderSubmitted, "o1");
        enqueue(&storage, AuditAction::OrderCreated, "o2");

        assert_eq!(audit.drain_outbox().unwrap(), 3);
        assert!(audit.pending_ids().unwrap().is_empty());

        let entries = audit.all_entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].prev_hash, GENESIS_HASH);
        assert_eq!(entries[1].prev_hash, entries[0].curr_hash);
        assert_eq!(entries[2].sequence, 3);

        let v = audit.verify_chain().unwrap();
        assert!(v.chain_intact);
        assert_eq!(v.total_entries, 3);

        assert_eq!(audit.entries_for("order", "o1").unwrap().len(), 2);
    }

    #[test]
    fn test_rolled_back_command_leaves_no_audit() {
        let storage = Storage::open_in_memory().unwrap();
        let audit = AuditStorage::new(storage.clone());
        {
            let txn = storage.begin_write().unwrap();
            AuditStorage::enqueue(
                &txn,
                &PendingAudit::new(AuditAction::OrderCreated, "order", "o1", None),
            )
            .unwrap();
            // dropped without commit
        }
        assert!(audit.pending_ids().unwrap().is_empty());
        assert_eq!(audit.drain_outbox().unwrap(), 0);
    }

    #[test]
    fn test_append_pending_twice_is_noop() {
        let storage = Storage::open_in_memory().unwrap();
        let audit = AuditStorage::new(storage.clone());
        let id = enqueue(&storage, AuditAction::OrderCreated, "o1");
        assert!(audit.append_pending(id).unwrap().is_some());
        assert!(audit.append_pending(id).unwrap().is_none());
        assert_eq!(audit.all_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_tampered_entry_is_detected() {
        let storage = Storage::open_in_memory().unwrap();
        let audit = AuditStorage::new(storage.clone());
        enqueue(&storage, AuditAction::OrderCreated, "o1");
        enqueue(&storage, AuditAction::OrderCheckedOut, "o1");
        audit.drain_outbox().unwrap();

        // Rewrite entry 1 behind the storage layer's back
        let mut first = audit.all_entries().unwrap().remove(0);
        first.after = serde_json::json!({ "status": "served" });
        let txn = storage.begin_write().unwrap();
        {
            let mut table = txn.open_table(AUDIT_LOG).unwrap();
            let bytes = serde_json::to_vec(&first).unwrap();
            table.insert(1u64, bytes.as_slice()).unwrap();
        }
        txn.commit().unwrap();

        let v = audit.verify_chain().unwrap();
        assert!(!v.chain_intact);
        assert_eq!(v.breaks.len(), 1);
        assert_eq!(v.breaks[0].sequence, 1);
        assert_eq!(v.breaks[0].reason, ChainBreakReason::HashMismatch);
    }

    #[test]
    fn test_dead_letter_moves_row() {
        let storage = Storage::open_in_memory().unwrap();
        let audit = AuditStorage::new(storage.clone());
        let id = enqueue(&storage, AuditAction::OrderCreated, "o1");

        audit.dead_letter(id, 3, "boom").unwrap();

        assert!(audit.pending_ids().unwrap().is_empty());
        let letters = audit.dead_letters().unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].outbox_id, id);
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].payload.contains("order_created"));
    }
}
