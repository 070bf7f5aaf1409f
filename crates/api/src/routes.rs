use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    body::Body,
    http::{Response, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .route("/user/signup", post(handlers::auth::signup))
        .route("/user/login", post(handlers::auth::login));

    let protected = Router::new()
        .route("/", get(handlers::home::index))
        .route("/user/logout", post(handlers::auth::logout))
        .route("/user/settings", get(handlers::sessions::settings))
        .route("/user/sessions/:id/delete", post(handlers::sessions::delete))
        .route_layer(from_fn(middleware::require_auth));

    // Pipeline order is fixed: session resolution, then forgery
    // protection, then flash, then (for protected routes) the
    // authentication requirement, then the handler.
    let session_aware = Router::new()
        .merge(public)
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), middleware::load_flash))
        .layer(from_fn(middleware::csrf_protect))
        .layer(from_fn_with_state(state.clone(), middleware::resolve_session));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(session_aware)
        .layer(from_fn(middleware::common_headers))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Request-level panic containment: log and convert to a generic server
/// error without taking down the worker or the process.
fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");

    let body = serde_json::to_string(&handlers::ErrorResponse::new(
        "internal_error",
        "Internal server error",
    ))
    .expect("error response serializes");

    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("error response builds")
}
