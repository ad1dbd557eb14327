//! 认证路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/auth/login | POST | 用户名密码登录（按用户名限流） |

use axum::{Json, Router, extract::State, routing::post};
use shared::error::AppResult;
use shared::models::{LoginRequest, Staff};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/auth/login", post(login))
}

/// 限流检查在密码校验之前；成功登录清零计数
async fn login(State(state): State<ServerState>, Json(req): Json<LoginRequest>) -> AppResult<Json<Staff>> {
    let limiter = state.login_limiter.clone();
    let staff = state.staff.clone();

    let user = super::blocking(move || {
        limiter.check(&req.username)?;
        let user = staff.authenticate(&req.username, &req.password)?;
        limiter.reset(&req.username)?;
        Ok(user)
    })
    .await
    .inspect_err(|e| tracing::info!(target: "security", error = %e, "Login rejected"))?;

    tracing::info!(target: "security", staff_id = %user.id, username = %user.username, "Login succeeded");
    Ok(Json(user.public()))
}
