/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - 検証エラー / tenant エラー / repo・storage エラーを統一的に変換
 *   (内部の詳細はログにだけ残し、レスポンスには出さない)
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::repos::error::RepoError;
use crate::services::auth::tenant::TenantError;
use crate::services::auth::verifier::{KeyLookupError, Rejection, VerifyError};
use crate::services::storage::StorageError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Same response for unknown user and wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthenticated,

    #[error("{}", .0.message())]
    Unauthorized(Rejection),

    #[error("tenant identification failed")]
    TenantResolutionFailed,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("upstream service unavailable")]
    UpstreamUnavailable(&'static str),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) | AppError::TenantResolutionFailed => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "BAD_REQUEST",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::Unauthorized(rejection) => rejection.code(),
            AppError::TenantResolutionFailed => "TENANT_RESOLUTION_FAILED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            AppError::Internal => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<VerifyError> for AppError {
    fn from(e: VerifyError) -> Self {
        match e {
            VerifyError::Missing => AppError::Unauthenticated,
            // The authority being down is not the caller's fault.
            VerifyError::KeyLookupFailed(KeyLookupError::Unavailable(_)) => {
                AppError::UpstreamUnavailable("key discovery")
            }
            other => AppError::Unauthorized(other.rejection()),
        }
    }
}

impl From<TenantError> for AppError {
    fn from(e: TenantError) -> Self {
        match e {
            TenantError::MissingSubject(_) => AppError::Unauthorized(Rejection::Malformed),
            _ => AppError::TenantResolutionFailed,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        error!(error = ?e, "datastore failure");
        AppError::UpstreamUnavailable("datastore")
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            // Misconfigured storage credentials are an operator problem, not an outage.
            StorageError::Credentials(_) => {
                error!(error = %e, "object storage credentials unusable");
                AppError::Internal
            }
            _ => {
                warn!(error = %e, "object storage failure");
                AppError::UpstreamUnavailable("object storage")
            }
        }
    }
}
