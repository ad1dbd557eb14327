//! Terminal API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/terminals | POST | 注册终端（按 code 幂等） |

use axum::{Json, Router, extract::State, routing::post};
use shared::error::AppResult;
use shared::models::{Terminal, TerminalRegister};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/terminals", post(register))
}

async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<TerminalRegister>,
) -> AppResult<Json<Terminal>> {
    let terminals = state.terminals.clone();
    let terminal = super::blocking(move || terminals.register(&payload.code)).await?;
    Ok(Json(terminal))
}
