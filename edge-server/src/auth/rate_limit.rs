//! Login rate limiting
//!
//! Counter per username stored in `login_attempts`, so every process sharing
//! the store sees the same window. An expired window is discarded when read.

use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};

use crate::db::Storage;
use crate::db::storage::{self, LOGIN_ATTEMPTS};
use crate::utils::validation::normalize_username;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoginAttempts {
    count: u32,
    window_start: i64,
}

#[derive(Debug, Clone)]
pub struct LoginRateLimiter {
    storage: Storage,
    max_attempts: u32,
    window_ms: i64,
}

impl LoginRateLimiter {
    pub fn new(storage: Storage, max_attempts: u32, window_secs: u64) -> Self {
        Self {
            storage,
            max_attempts: max_attempts.max(1),
            window_ms: (window_secs.max(1) * 1000) as i64,
        }
    }

    /// Count an attempt; `RateLimited` once the window is exhausted
    pub fn check(&self, username: &str) -> AppResult<()> {
        self.check_at(username, shared::util::now_millis())
    }

    pub fn check_at(&self, username: &str, now: i64) -> AppResult<()> {
        let key = normalize_username(username);
        let txn = self.storage.begin_write()?;
        let current: Option<LoginAttempts> = storage::get_json(&txn, LOGIN_ATTEMPTS, &key)?;

        // Reset window if expired
        let mut entry = match current {
            Some(e) if now - e.window_start < self.window_ms => e,
            _ => LoginAttempts {
                count: 0,
                window_start: now,
            },
        };

        if entry.count >= self.max_attempts {
            let remaining_ms = self.window_ms - (now - entry.window_start);
            let retry_after_secs = (remaining_ms.max(0) as u64).div_ceil(1000);
            tracing::warn!(username = %key, attempts = entry.count, "Login rate limited");
            return Err(AppError::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        storage::put_json(&txn, LOGIN_ATTEMPTS, &key, &entry)?;
        txn.commit()?;
        Ok(())
    }

    /// Clear the counter after a successful login
    pub fn reset(&self, username: &str) -> AppResult<()> {
        let txn = self.storage.begin_write()?;
        storage::remove_key(&txn, LOGIN_ATTEMPTS, &normalize_username(username))?;
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_limits_and_expires() {
        let limiter = LoginRateLimiter::new(Storage::open_in_memory().unwrap(), 3, 60);
        let t0 = 1_000_000;

        for i in 0..3 {
            assert!(limiter.check_at("Alice", t0 + i).is_ok());
        }
        let err = limiter.check_at("alice", t0 + 10_000).unwrap_err();
        assert_eq!(err, AppError::RateLimited { retry_after_secs: 50 });

        // other usernames are independent
        assert!(limiter.check_at("bob", t0).is_ok());

        // same bucket regardless of padding
        assert!(limiter.check_at(" ALICE ", t0 + 10_001).is_err());

        // window expired on read
        assert!(limiter.check_at("alice", t0 + 60_000).is_ok());
    }

    #[test]
    fn test_reset_clears_counter() {
        let limiter = LoginRateLimiter::new(Storage::open_in_memory().unwrap(), 1, 60);
        limiter.check_at("carol", 0).unwrap();
        assert!(limiter.check_at("carol", 1).is_err());
        limiter.reset("carol").unwrap();
        assert!(limiter.check_at("carol", 2).is_ok());
    }
}
