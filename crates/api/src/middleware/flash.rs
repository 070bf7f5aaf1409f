use crate::cookies::{clear_cookie, read_cookie, FLASH_COOKIE};
use crate::handlers::ErrorResponse;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One-shot messages decoded from the flash cookie, empty for most
/// requests.
#[derive(Debug, Clone, Default)]
pub struct Flash(pub BTreeMap<String, String>);

/// Read the flash cookie and immediately retire it, so a message is shown
/// at most once. A handler that sets a fresh flash on this same response
/// wins over the retirement.
pub async fn load_flash(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let flash = match read_cookie(request.headers(), FLASH_COOKIE) {
        None => Flash::default(),
        Some(value) => match state.codec.decode(FLASH_COOKIE, &value) {
            Ok(values) => Flash(values),
            Err(e) => {
                tracing::error!(%method, %uri, error = %e, "Flash cookie failed verification");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::new("internal_error", "Internal server error")),
                )
                    .into_response();
            }
        },
    };

    let had_flash = !flash.0.is_empty();
    request.extensions_mut().insert(flash);

    let mut response = next.run(request).await;

    if had_flash && !sets_flash_cookie(response.headers()) {
        response
            .headers_mut()
            .append(header::SET_COOKIE, clear_cookie(FLASH_COOKIE));
    }

    response
}

fn sets_flash_cookie(headers: &HeaderMap) -> bool {
    headers.get_all(header::SET_COOKIE).iter().any(|value| {
        value
            .to_str()
            .map(|s| s.starts_with("flash="))
            .unwrap_or(false)
    })
}
