//! Bearer credential verification → `Principal` in request extensions.
//!
//! - No `Authorization` header (or an empty bearer) → 401
//! - Any other rejection → 403, key discovery outage → 503
//! - Tenant claim missing or unusable → 403 `TENANT_RESOLUTION_FAILED`

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::verifier::VerifyError;
use crate::state::AppState;

/// Require a verified credential on every route (and the fallback) of `router`.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = bearer_token(req.headers()).map(|t| t.map(str::to_owned));

    let verified = match bearer {
        Ok(token) => state.verifier.verify(token.as_deref()).await,
        Err(err) => Err(err),
    };

    let claims = match verified {
        Ok(claims) => claims,
        Err(VerifyError::Missing) => return Err(AppError::Unauthenticated),
        Err(err) => {
            tracing::warn!(error = %err, path = %req.uri().path(), "credential rejected");
            return Err(err.into());
        }
    };

    let principal = state.scoper.principal(&claims).map_err(|err| {
        tracing::warn!(
            error = %err,
            tenant_claim = state.scoper.tenant_claim(),
            "could not resolve tenant from verified credential"
        );
        AppError::from(err)
    })?;

    tracing::debug!(principal = %principal.id, tenant = %principal.tenant, "authenticated");

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// The bearer token of `Authorization`, if the request carries one.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, VerifyError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| VerifyError::Malformed("authorization header is not ascii".into()))?
        .trim();

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(VerifyError::Malformed("authorization scheme is not Bearer".into()));
    }

    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }

    Ok(Some(token))
}
