use crate::error::ApiError;
use crate::models::WriteRequest;
use crate::routes;
use crate::state::AppState;
use axum::{body::Bytes, extract::State, http::StatusCode};

pub const WRITE_OK_BODY: &str = "Record saved";

/// POST {mount} handler - Store a record
///
/// The body is read as JSON regardless of its content type. Any value
/// previously stored under the index is replaced.
#[utoipa::path(
    post,
    path = routes::DEFAULT_MOUNT_PATH,
    request_body = WriteRequest,
    responses(
        (status = 200, description = "Record stored", body = String, content_type = "text/plain"),
        (status = 400, description = "Malformed JSON, or missing index/data", body = String, content_type = "text/plain"),
        (status = 500, description = "Store error", body = String, content_type = "text/plain")
    ),
    tag = "records"
)]
pub async fn write_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, &'static str), ApiError> {
    let (key, data) = WriteRequest::from_body(&body)
        .and_then(WriteRequest::into_record)
        .inspect_err(|err| tracing::debug!("Rejected write: {:?}", err))?;

    if let Err(err) = state.store.set(&key, data).await {
        tracing::error!("Failed to store record {}: {:#}", key, err);
        return Err(ApiError::Storage(err));
    }

    tracing::info!("Successfully stored record {}", key);
    Ok((StatusCode::OK, WRITE_OK_BODY))
}
