use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Body shared by every 404 the service produces
pub const NOT_FOUND_BODY: &str = "404 Not Found";

/// Error type for the record endpoints
///
/// Every variant ends the request; bodies are plain text.
#[derive(Debug)]
pub enum ApiError {
    /// Missing index, unknown record, unsupported method or missing asset
    NotFound,
    /// Write body is not JSON or lacks a usable `index`/`data`
    InvalidBody(String),
    /// Backing store failed
    Storage(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_BODY.to_string()),
            ApiError::InvalidBody(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON request body: {}", msg),
            ),
            ApiError::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Storage error: {:#}", err),
            ),
        };

        (status, message).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Storage(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidBody(err.to_string())
    }
}
