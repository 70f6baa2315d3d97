//! JSON error body shared by all API handlers.

use crate::error::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    /// Error code (e.g., "not_found", "conflict")
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, description: Option<String>) -> Self {
        Self {
            status,
            error: error.to_string(),
            error_description: description,
        }
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", Some(description.into()))
    }

    pub fn conflict(description: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", Some(description.into()))
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", Some(description.into()))
    }

    pub fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(id) => {
                ApiError::not_found(format!("No user with telegram id {id}"))
            }
            StoreError::UniqueViolation(_) => {
                ApiError::conflict("Preference already exists for this notification type")
            }
            StoreError::ForeignKeyViolation(_) => {
                ApiError::bad_request("Referenced user or child does not exist")
            }
            StoreError::NotNullViolation(msg) => ApiError::bad_request(msg),
            StoreError::Database(e) => {
                tracing::error!("Database error: {}", e);
                ApiError::server_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
