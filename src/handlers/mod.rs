pub mod health;
pub mod read;
pub mod write;

pub use health::health_handler;
pub use read::read_handler;
pub use write::write_handler;

use crate::error::ApiError;

/// Unsupported methods on the mount path and missing static assets
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
