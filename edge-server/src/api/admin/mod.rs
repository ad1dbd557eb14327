//! Back-office seeding
//!
//! | 路径 | 方法 | 角色 |
//! |------|------|------|
//! | /api/staff | POST | admin |
//! | /api/products | PUT | manager, admin |
//!
//! The acting staff id travels in the body like a command envelope.

use axum::{
    Json, Router,
    extract::State,
    routing::{post, put},
};
use serde::Deserialize;
use shared::error::AppResult;
use shared::models::{Product, Role, Staff, StaffCreate};

use crate::auth::RoleService;
use crate::core::ServerState;
use crate::orders::Catalog;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/staff", post(create_staff))
        .route("/api/products", put(upsert_product))
}

#[derive(Debug, Deserialize)]
pub struct AdminRequest<T> {
    pub actor_id: String,
    pub data: T,
}

async fn create_staff(
    State(state): State<ServerState>,
    Json(req): Json<AdminRequest<StaffCreate>>,
) -> AppResult<Json<Staff>> {
    let staff = state.staff.clone();
    let created = super::blocking(move || {
        staff.assert_role(&req.actor_id, &[Role::Admin])?;
        staff.create(req.data)
    })
    .await?;
    tracing::info!(staff_id = %created.id, role = created.role.as_str(), "Staff created");
    Ok(Json(created.public()))
}

async fn upsert_product(
    State(state): State<ServerState>,
    Json(req): Json<AdminRequest<Product>>,
) -> AppResult<Json<Product>> {
    let staff = state.staff.clone();
    let storage = state.storage.clone();
    let product = super::blocking(move || {
        staff.assert_role(&req.actor_id, &[Role::Manager, Role::Admin])?;
        Catalog::upsert(&storage, &req.data)?;
        Ok(req.data)
    })
    .await?;
    Ok(Json(product))
}
