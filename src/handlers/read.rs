use crate::error::ApiError;
use crate::models::ReadQuery;
use crate::routes;
use crate::state::AppState;
use crate::store::RecordKey;
use axum::extract::rejection::QueryRejection;
use axum::{extract::Query, extract::State, Json};
use serde_json::Value as JsonValue;

/// GET {mount} handler - Read a record
///
/// A missing index and a missing record produce the same 404 so callers
/// cannot tell them apart.
#[utoipa::path(
    get,
    path = routes::DEFAULT_MOUNT_PATH,
    params(ReadQuery),
    responses(
        (status = 200, description = "Stored document, exactly as written", body = serde_json::Value),
        (status = 404, description = "No index given, or nothing stored under it", body = String, content_type = "text/plain"),
        (status = 500, description = "Store error", body = String, content_type = "text/plain")
    ),
    tag = "records"
)]
pub async fn read_handler(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<JsonValue>, ApiError> {
    let index = query
        .ok()
        .and_then(|Query(pairs)| ReadQuery::from_pairs(pairs).index);
    let Some(key) = index.and_then(RecordKey::new) else {
        tracing::debug!("Read without an index");
        return Err(ApiError::NotFound);
    };

    match state.store.get(&key).await {
        Ok(Some(data)) => {
            tracing::info!("Successfully read record {}", key);
            Ok(Json(data))
        }
        Ok(None) => {
            tracing::debug!("Record not found: {}", key);
            Err(ApiError::NotFound)
        }
        Err(err) => {
            tracing::error!("Failed to read record {}: {:#}", key, err);
            Err(ApiError::Storage(err))
        }
    }
}
