use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tubeblog_pipeline::PipelineError;

use crate::store::StoreError;

/// Every handler failure, rendered as `{ "detail": ... }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            ApiError::Unauthorized(d) => (StatusCode::UNAUTHORIZED, d),
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, d),
            ApiError::Conflict(d) => (StatusCode::CONFLICT, d),
            ApiError::Internal(d) => {
                tracing::error!("request failed: {}", d);
                (StatusCode::INTERNAL_SERVER_ERROR, d)
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        if e.is_client_error() {
            ApiError::BadRequest(e.to_string())
        } else {
            ApiError::Internal(format!("Generation failed: {}", e))
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(d) => ApiError::BadRequest(d),
            StoreError::NotFound => ApiError::NotFound("Not found.".to_string()),
            StoreError::Duplicate => ApiError::Conflict("Article already exists.".to_string()),
            StoreError::Database(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}
