//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{InstanceError, LifecycleError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Timeout(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<InstanceError> for ApiError {
    fn from(err: InstanceError) -> Self {
        match err {
            InstanceError::OrganizationNotFound(_) => ApiError::NotFound(err.to_string()),
            InstanceError::AlreadyExists(_) => ApiError::Conflict(err.to_string()),
            InstanceError::OwnerNotFound(_) | InstanceError::InvalidConfig(_) => {
                ApiError::BadRequest(err.to_string())
            }
            InstanceError::Database(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Instance(err) => err.into(),
            LifecycleError::StartupTimeout { .. } => ApiError::Timeout(err.to_string()),
            LifecycleError::Render(_) => ApiError::BadRequest(err.to_string()),
            LifecycleError::Runtime(err) => ApiError::InternalError(format!("{:#}", err)),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
