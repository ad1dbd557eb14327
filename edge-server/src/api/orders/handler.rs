//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::error::AppResult;
use shared::models::{Order, Payment};

use crate::core::ServerState;
use crate::orders::OrdersManager;

/// GET /api/orders/{id}
pub async fn get_by_id(State(state): State<ServerState>, Path(id): Path<String>) -> AppResult<Json<Order>> {
    Ok(Json(OrdersManager::get(&state.storage, &id)?))
}

/// GET /api/orders/{id}/payments
pub async fn payments(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Payment>>> {
    OrdersManager::get(&state.storage, &id)?;
    Ok(Json(OrdersManager::payments_for(&state.storage, &id)?))
}
