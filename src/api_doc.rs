use utoipa::OpenApi;

use crate::error::{HealthResponse, UnhealthyResponse};
use crate::handlers;
use crate::models::WriteRequest;
use crate::routes;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "zst-records API",
        version = "1.0.0",
        description = "JSON records stored by index, plus the static pages that read them"
    ),
    paths(
        handlers::health::health_handler,
        handlers::read::read_handler,
        handlers::write::write_handler
    ),
    components(
        schemas(
            WriteRequest,
            HealthResponse,
            UnhealthyResponse
        )
    ),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "records", description = "Record read and write operations")
    )
)]
pub struct ApiDoc;

/// The OpenAPI document with the record operations listed under `mount_path`
pub fn openapi_for(mount_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if mount_path != routes::DEFAULT_MOUNT_PATH {
        if let Some(item) = doc.paths.paths.remove(routes::DEFAULT_MOUNT_PATH) {
            doc.paths.paths.insert(mount_path.to_string(), item);
        }
    }
    doc
}
