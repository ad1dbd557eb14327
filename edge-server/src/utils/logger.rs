//! Logging Infrastructure
//!
//! - Console: pretty or JSON lines, filtered by `RUST_LOG` or the configured level
//! - `logs/app/`: daily rotation, deleted after [`APP_LOG_RETENTION_DAYS`]
//! - `logs/security/`: `target: "security"` events (logins), never deleted

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter, fmt, prelude::*};

pub const SECURITY_TARGET: &str = "security";
pub const APP_LOG_RETENTION_DAYS: i64 = 14;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the logging system (console only)
pub fn init_logger(level: &str, json_format: bool) -> anyhow::Result<()> {
    init_logger_with_file(level, json_format, None)
}

/// Initialize the logging system with daily rotating files under `log_dir`
///
/// Must run inside the tokio runtime when `log_dir` is set (spawns the cleanup task).
pub fn init_logger_with_file(level: &str, json_format: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console: BoxedLayer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(false).boxed()
    };
    let mut layers = vec![console];

    if let Some(dir) = log_dir {
        let app_dir = dir.join("app");
        let security_dir = dir.join(SECURITY_TARGET);
        fs::create_dir_all(&app_dir)?;
        fs::create_dir_all(&security_dir)?;

        layers.push(file_layer(
            RollingFileAppender::new(Rotation::DAILY, app_dir, "app"),
            json_format,
            |target| target != SECURITY_TARGET,
        ));
        layers.push(file_layer(
            RollingFileAppender::new(Rotation::DAILY, security_dir, SECURITY_TARGET),
            json_format,
            |target| target == SECURITY_TARGET,
        ));

        tokio::spawn(periodic_cleanup(dir.to_path_buf()));
    }

    tracing_subscriber::registry().with(layers).with(env_filter).try_init()?;
    Ok(())
}

fn file_layer(appender: RollingFileAppender, json_format: bool, keep: fn(&str) -> bool) -> BoxedLayer {
    let writer = std::sync::Mutex::new(appender);
    let only = filter::filter_fn(move |meta| keep(meta.target()));
    if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_writer(writer)
            .with_filter(only)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(only)
            .boxed()
    }
}

/// Delete `app.YYYY-MM-DD` files older than the retention window
pub fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<usize> {
    let app_dir = log_dir.join("app");
    if !app_dir.exists() {
        return Ok(0);
    }
    let cutoff = chrono::Local::now().date_naive() - chrono::Duration::days(APP_LOG_RETENTION_DAYS);

    let mut removed = 0;
    for entry in fs::read_dir(app_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(date) = name.strip_prefix("app.")
            && let Ok(day) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            && day < cutoff
        {
            fs::remove_file(&path)?;
            tracing::info!(file = %name, "Deleted old log file");
            removed += 1;
        }
    }
    Ok(removed)
}

async fn periodic_cleanup(log_dir: PathBuf) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
    loop {
        interval.tick().await;
        if let Err(e) = cleanup_old_logs(&log_dir) {
            tracing::error!(error = %e, "Failed to cleanup old logs");
        }
    }
}
