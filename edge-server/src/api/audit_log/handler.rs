//! Audit Log API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use shared::error::AppResult;
use shared::models::AuditLogEntry;

use crate::audit::{AuditChainVerification, AuditQuery};
use crate::core::ServerState;

/// GET /api/audit?entity_type=&entity_id= — 查询审计日志（按序号）
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<Vec<AuditLogEntry>>> {
    Ok(Json(state.audit().query(&query)?))
}

/// GET /api/audit/verify — 验证审计链完整性
pub async fn verify_chain(State(state): State<ServerState>) -> AppResult<Json<AuditChainVerification>> {
    Ok(Json(state.audit().verify_chain()?))
}
