/*
 * Responsibility
 * - GET /health (疎通 + DB 到達確認)
 * - 状態はリクエストごとに probe する (グローバルな状態は持たない)
 */
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::warn;

use crate::api::dto::health::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.health.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "up",
            }),
        ),
        Err(e) => {
            warn!(error = ?e, "database health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    database: "down",
                }),
            )
        }
    }
}
