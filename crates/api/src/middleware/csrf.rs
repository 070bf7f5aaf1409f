use crate::cookies::{build_cookie, read_cookie, CSRF_COOKIE};
use crate::handlers::ErrorResponse;
use axum::{
    extract::Request,
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

/// Header carrying the anti-forgery token on state-changing requests.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The anti-forgery token scoped to this browser session, exposed to
/// handlers that need to hand it to a client.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

/// Stage 3: anti-forgery protection.
///
/// Safe requests ensure a per-browser-session token cookie exists and
/// expose it to the request. State-changing requests must echo that token
/// in `x-csrf-token`; a mismatch is a client error that reveals nothing
/// about whether the session itself was valid.
pub async fn csrf_protect(mut request: Request, next: Next) -> Response {
    let existing = read_cookie(request.headers(), CSRF_COOKIE);

    if is_safe(request.method()) {
        let (token, issue) = match existing {
            Some(token) => (token, false),
            None => (beacon_auth::token::generate(), true),
        };

        request.extensions_mut().insert(CsrfToken(token.clone()));
        let mut response = next.run(request).await;

        if issue {
            response
                .headers_mut()
                .append(header::SET_COOKIE, build_cookie(CSRF_COOKIE, &token, None));
        }

        return response;
    }

    let provided = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok());

    match (existing, provided) {
        (Some(expected), Some(provided)) if !expected.is_empty() && expected == provided => {
            request.extensions_mut().insert(CsrfToken(expected));
            next.run(request).await
        }
        _ => forbidden(),
    }
}

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorResponse::new("invalid_csrf_token", "Forbidden")),
    )
        .into_response()
}
