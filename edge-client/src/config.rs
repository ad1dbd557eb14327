//! Sync engine configuration

use std::path::PathBuf;
use std::time::Duration;

/// Offline sync configuration for one terminal
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server base URL (e.g., "http://192.168.1.10:3000")
    pub base_url: String,

    /// Stable terminal code, re-registered before each drain
    pub terminal_code: String,

    /// redb file holding the offline queue
    pub queue_path: PathBuf,

    /// Retry tick while items are queued
    pub tick_interval: Duration,

    /// Per-request HTTP timeout
    pub http_timeout: Duration,

    /// 5xx answers tolerated for one queued command before it is dead-lettered
    pub max_server_errors: u32,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>, terminal_code: impl Into<String>, queue_path: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            terminal_code: terminal_code.into(),
            queue_path: queue_path.into(),
            tick_interval: Duration::from_secs(5),
            http_timeout: Duration::from_secs(10),
            max_server_errors: 3,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_max_server_errors(mut self, max: u32) -> Self {
        self.max_server_errors = max.max(1);
        self
    }
}
