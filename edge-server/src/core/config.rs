use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

/// 边缘节点配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (edge.redb, logs/) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | LOG_LEVEL | info | tracing filter |
/// | LOG_JSON | false | JSON 日志 |
/// | VARIANCE_THRESHOLD | 5.00 | 超出需经理审批的现金差额 |
/// | IDEMPOTENCY_KEY_MAX_LEN | 128 | client request id 最大长度 |
/// | AUDIT_BUFFER_SIZE | 1024 | 审计通道容量 |
/// | AUDIT_MAX_RETRIES | 3 | 进入死信前的重试次数 |
/// | OCCUPANCY_SWEEP_INTERVAL_SECS | 300 | 桌台锁清扫周期 |
/// | LOGIN_MAX_ATTEMPTS | 5 | 每窗口每用户名的登录次数 |
/// | LOGIN_WINDOW_SECS | 60 | 登录限流窗口 |
/// | EVENT_CHANNEL_CAPACITY | 4096 | 事件广播容量 |
/// | BOOTSTRAP_ADMIN_USERNAME / BOOTSTRAP_ADMIN_PASSWORD | - | 员工表为空时创建管理员 |
///
/// ```ignore
/// WORK_DIR=/data/edge HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub variance_threshold: Decimal,
    pub idempotency_key_max_len: usize,
    pub audit_buffer_size: usize,
    pub audit_max_retries: u32,
    pub occupancy_sweep_interval_secs: u64,
    pub login_max_attempts: u32,
    pub login_window_secs: u64,
    pub event_channel_capacity: usize,
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    /// 从环境变量加载配置（先读取 `.env`）
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        let bootstrap_admin = match (
            std::env::var("BOOTSTRAP_ADMIN_USERNAME"),
            std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(u), Ok(p)) if !u.trim().is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        };

        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 3000),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            variance_threshold: env_or("VARIANCE_THRESHOLD", Decimal::new(500, 2)),
            idempotency_key_max_len: env_or("IDEMPOTENCY_KEY_MAX_LEN", 128),
            audit_buffer_size: env_or("AUDIT_BUFFER_SIZE", 1024),
            audit_max_retries: env_or("AUDIT_MAX_RETRIES", 3),
            occupancy_sweep_interval_secs: env_or("OCCUPANCY_SWEEP_INTERVAL_SECS", 300),
            login_max_attempts: env_or("LOGIN_MAX_ATTEMPTS", 5),
            login_window_secs: env_or("LOGIN_WINDOW_SECS", 60),
            event_channel_capacity: env_or("EVENT_CHANNEL_CAPACITY", 4096),
            bootstrap_admin,
        }
    }

    /// 测试用配置：默认值 + 指定工作目录，不读取环境
    pub fn for_work_dir(work_dir: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port: 0,
            log_level: "info".into(),
            log_json: false,
            variance_threshold: Decimal::new(500, 2),
            idempotency_key_max_len: 128,
            audit_buffer_size: 1024,
            audit_max_retries: 3,
            occupancy_sweep_interval_secs: 300,
            login_max_attempts: 5,
            login_window_secs: 60,
            event_channel_capacity: 4096,
            bootstrap_admin: None,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("edge.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.occupancy_sweep_interval_secs.max(1))
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Invalid config value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_work_dir() {
        let config = Config::for_work_dir("/tmp/edge");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/edge/edge.redb"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/edge/logs"));
        assert_eq!(config.variance_threshold.to_string(), "5.00");
    }
}
