//! Terminal registry
//!
//! Terminals register by their stable code. Registration is idempotent so a
//! reconnecting client can re-register before every drain.

use redb::{ReadableTable, WriteTransaction};
use shared::error::{AppError, AppResult};
use shared::models::Terminal;

use crate::db::Storage;
use crate::db::storage::{self, TERMINAL_CODES, TERMINALS};
use crate::utils::validation::{MAX_NAME_LEN, validate_required_text};

#[derive(Debug, Clone)]
pub struct TerminalRegistry {
    storage: Storage,
}

impl TerminalRegistry {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Register a terminal, or return the existing one for a known code
    pub fn register(&self, code: &str) -> AppResult<Terminal> {
        validate_required_text(code, "terminal code", MAX_NAME_LEN)?;
        let code = code.trim();

        let txn = self.storage.begin_write()?;
        let existing = {
            let codes = txn.open_table(TERMINAL_CODES)?;
            codes.get(code)?.map(|guard| guard.value().to_string())
        };
        if let Some(id) = existing {
            let terminal: Option<Terminal> = storage::get_json(&txn, TERMINALS, &id)?;
            return terminal.ok_or_else(|| AppError::internal(format!("terminal index points at missing row {id}")));
        }

        let terminal = Terminal {
            id: shared::util::new_id(),
            code: code.to_string(),
            registered_at: shared::util::now_millis(),
        };
        {
            let mut codes = txn.open_table(TERMINAL_CODES)?;
            codes.insert(code, terminal.id.as_str())?;
        }
        storage::put_json(&txn, TERMINALS, &terminal.id, &terminal)?;
        txn.commit()?;

        tracing::info!(terminal_id = %terminal.id, code, "Terminal registered");
        Ok(terminal)
    }

    pub fn get(&self, terminal_id: &str) -> AppResult<Terminal> {
        self.storage
            .read_json(TERMINALS, terminal_id)?
            .ok_or_else(|| AppError::not_found("terminal", terminal_id))
    }

    /// Registered terminal inside a command transaction
    pub fn require(txn: &WriteTransaction, terminal_id: &str) -> AppResult<Terminal> {
        storage::get_json(txn, TERMINALS, terminal_id)?
            .ok_or_else(|| AppError::not_found("terminal", terminal_id))
    }
}
