//! Command API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/commands | POST | 执行 `CommandEnvelope`，返回 `CommandOutcome` |

use axum::{Json, Router, extract::State, routing::post};
use shared::command::{CommandEnvelope, CommandOutcome};
use shared::error::AppResult;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/commands", post(execute))
}

/// POST /api/commands
async fn execute(
    State(state): State<ServerState>,
    Json(envelope): Json<CommandEnvelope>,
) -> AppResult<Json<CommandOutcome>> {
    let gateway = state.gateway.clone();
    let outcome = super::blocking(move || gateway.execute(envelope)).await?;
    Ok(Json(outcome))
}
