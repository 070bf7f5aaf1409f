pub mod auth;
pub mod health;
pub mod home;
pub mod sessions;

// Re-export common types
pub use auth::ErrorResponse;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Generic server error: logged with detail, surfaced without any.
pub(crate) fn internal_error<E: std::fmt::Display>(err: E) -> Response {
    tracing::error!("Request failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("internal_error", "Internal server error")),
    )
        .into_response()
}
