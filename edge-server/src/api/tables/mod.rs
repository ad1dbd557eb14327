//! Table occupancy API
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/tables/{id}/occupancy | GET | 当前占用（空闲时 `null`） |

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use shared::error::AppResult;
use shared::models::TableOccupancy;

use crate::core::ServerState;
use crate::tables::TableLock;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/tables/{id}/occupancy", get(occupancy))
}

async fn occupancy(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Option<TableOccupancy>>> {
    Ok(Json(TableLock::get(&state.storage, &id)?))
}
