//! Shift API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::error::AppResult;
use shared::models::{Shift, ShiftLedger};

use crate::core::ServerState;
use crate::shifts::ShiftManager;

/// GET /api/shifts/{id}
pub async fn get_by_id(State(state): State<ServerState>, Path(id): Path<String>) -> AppResult<Json<Shift>> {
    Ok(Json(ShiftManager::get_shift(&state.storage, &id)?))
}

/// GET /api/shifts/{id}/ledger - running totals and expected cash
pub async fn ledger(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ShiftLedger>> {
    Ok(Json(ShiftManager::get_ledger(&state.storage, &id)?))
}
