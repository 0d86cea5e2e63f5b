/*
 * Responsibility
 * - /productions 系の読み取り handler
 * - tenant は AuthPrincipal からのみ取る (path/query/body からは受け取らない)
 */
use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use tracing::debug;

use crate::api::dto::productions::ProductionResponse;
use crate::api::extractors::AuthPrincipal;
use crate::error::AppError;
use crate::services::storage::StoragePrefix;
use crate::state::AppState;

pub async fn list_productions(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
) -> Result<Json<Vec<ProductionResponse>>, AppError> {
    let rows = state.productions.list_for_tenant(&principal.tenant).await?;

    debug!(tenant = %principal.tenant, count = rows.len(), "listed productions");
    Ok(Json(rows.into_iter().map(ProductionResponse::from).collect()))
}

/// Object keys stored for one of the caller's productions.
pub async fn list_production_files(
    State(state): State<AppState>,
    AuthPrincipal(principal): AuthPrincipal,
    production_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<String>>, AppError> {
    let Path(production_id) = production_id.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    // Another tenant's production is indistinguishable from a missing one.
    let production = state
        .productions
        .find_for_tenant(&principal.tenant, production_id)
        .await?
        .ok_or(AppError::NotFound("production"))?;

    let prefix = StoragePrefix::for_production(&principal.tenant, production.id);
    let keys = state.storage.list_keys(&prefix).await?;

    Ok(Json(keys))
}

pub async fn route_not_found() -> AppError {
    AppError::NotFound("route")
}
