use axum::{handler::HandlerWithoutStateExt, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc;
use crate::handlers::{health_handler, not_found, read_handler, write_handler};
use crate::state::AppState;

// Route path constants - the record service path itself comes from config

pub const HEALTH: &str = "/health";
pub const DEFAULT_MOUNT_PATH: &str = "/zst";
pub const SWAGGER_UI: &str = "/swagger-ui";
pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";

/// Build the application router
///
/// The mount path and everything below it belong to the record service: GET
/// reads, POST writes, any other method gets a 404. Every other path is
/// served from the static root.
pub fn build_router(state: AppState) -> Router {
    let mount_path = state.config.mount_path.clone();

    let records = get(read_handler)
        .post(write_handler)
        .fallback(not_found);

    let assets = ServeDir::new(&state.config.static_root)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(not_found.into_service());

    Router::new()
        .route(HEALTH, get(health_handler))
        .route(&mount_path, records.clone())
        .route(&format!("{}/{{*rest}}", mount_path), records)
        .merge(SwaggerUi::new(SWAGGER_UI).url(OPENAPI_JSON, api_doc::openapi_for(&mount_path)))
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
