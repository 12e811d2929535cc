//! Error types for aidea-tracker

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::upstream::UpstreamError;

/// Error returned by services and HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Request body in a content type we do not accept (415)
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Day-file failure; missing file or row maps to 404, the rest to 500
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote collaborator failure (502 / 503)
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// aidea-common error
    #[error("Common error: {0}")]
    Common(#[from] aidea_common::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(aidea_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Store(StoreError::FileNotFound { .. }) => "DAY_NOT_FOUND",
            ApiError::Store(StoreError::RecordNotFound { .. }) => "NOT_FOUND",
            ApiError::Store(_) => "STORAGE_ERROR",
            ApiError::Upstream(UpstreamError::Unavailable { .. }) => "UPSTREAM_UNAVAILABLE",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Common(_) => "COMMON_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for services and API handlers
pub type ApiResult<T> = Result<T, ApiError>;
