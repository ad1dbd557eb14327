//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`commands`] - 命令入口 (所有写操作)
//! - [`terminals`] - 终端注册
//! - [`orders`] / [`shifts`] / [`tables`] - 只读查询
//! - [`audit_log`] - 审计日志查询、链验证
//! - [`events`] - SSE 实时事件
//! - [`auth`] - 登录
//! - [`admin`] - 员工与商品初始化

pub mod admin;
pub mod audit_log;
pub mod auth;
pub mod commands;
pub mod events;
pub mod health;
pub mod orders;
pub mod shifts;
pub mod tables;
pub mod terminals;

use axum::Router;
use shared::error::{AppError, AppResult};
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Full HTTP router with state applied
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(commands::router())
        .merge(terminals::router())
        .merge(orders::router())
        .merge(shifts::router())
        .merge(tables::router())
        .merge(audit_log::router())
        .merge(events::router())
        .merge(auth::router())
        .merge(admin::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run blocking storage work off the async runtime
pub(crate) async fn blocking<T, F>(f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::internal(format!("Blocking task failed: {e}")))?
}
