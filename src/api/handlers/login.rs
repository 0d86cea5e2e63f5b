/*
 * Responsibility
 * - POST /login (self-issued mode のみ mount される)
 * - body の形式チェックは dto、照合と署名は LoginService
 */
use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use tracing::info;

use crate::api::dto::login::{LoginRequest, LoginResponse};
use crate::error::AppError;
use crate::services::auth::login::LoginService;

/// Only routed when a `LoginService` exists, so it is extracted directly.
pub async fn login(
    State(service): State<Arc<LoginService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let (identity, password) = req.into_parts()?;

    let issued = service.login(identity, password).await?;

    info!(expires_in = issued.expires_in, "issued access token");
    Ok(Json(LoginResponse::bearer(issued)))
}
