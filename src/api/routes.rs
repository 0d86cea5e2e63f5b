/*
 * Responsibility
 * - URL 構造を定義
 * - /health, /login は認証なし、それ以外 (fallback 含む) は Bearer 必須
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{
    health::health,
    login::login,
    productions::{list_production_files, list_productions, route_not_found},
};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let mut public = Router::new().route("/health", get(health));

    // Delegated mode has no password exchange.
    if let Some(service) = state.login.clone() {
        public = public.merge(Router::new().route("/login", post(login)).with_state(service));
    }

    // The fallback sits behind the access middleware too, so unknown paths
    // answer 401 before they answer 404.
    let protected = Router::new()
        .route("/productions", get(list_productions))
        .route("/productions/{production_id}", get(list_production_files))
        .fallback(route_not_found);
    let protected = middleware::auth::access::apply(protected, state);

    public.merge(protected)
}
