use crate::cookies::{read_cookie, SESSION_COOKIE};
use crate::handlers::ErrorResponse;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use beacon_models::{Session, User};
use std::sync::Arc;

/// The identity resolved for this request: the live session and its owning
/// user. Constructed once by `resolve_session` and read-only thereafter.
#[derive(Debug, Clone)]
pub struct Identity {
    pub session: Session,
    pub user: User,
}

/// Stage 1 of the pipeline: establish identity from the session cookie.
///
/// Missing cookie, empty token, and unknown/expired token all proceed
/// anonymously. A cookie that fails verification aborts the request; a
/// tampered value is never downgraded to "absent". After the downstream
/// handler runs, a resolved session gets its freshness marker touched.
pub async fn resolve_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let Some(cookie_value) = read_cookie(request.headers(), SESSION_COOKIE) else {
        return next.run(request).await;
    };

    let payload = match state.codec.decode(SESSION_COOKIE, &cookie_value) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(%method, %uri, error = %e, "Session cookie failed verification");
            return server_error();
        }
    };

    let raw_token = match payload.get("token") {
        Some(token) if !token.is_empty() => token.clone(),
        _ => return next.run(request).await,
    };

    let resolved = match state.auth_service.resolve_session(&raw_token).await {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::error!(%method, %uri, error = %e, "Session lookup failed");
            return server_error();
        }
    };

    let Some((session, user)) = resolved else {
        // Unknown or expired token: anonymous, not an error.
        return next.run(request).await;
    };

    request.extensions_mut().insert(Identity {
        session: session.clone(),
        user,
    });

    let response = next.run(request).await;

    // The response is already built; a failed refresh indicates a broken
    // durability layer and is reported loudly, but never alters what the
    // client receives.
    if let Err(e) = state.auth_service.touch_session(&session).await {
        tracing::error!(%method, %uri, error = %e, "Failed to touch session after request");
    }

    response
}

/// Stage 2: protected routes redirect anonymous requests to the login
/// entry point and mark their responses non-cacheable.
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<Identity>().is_none() {
        return Redirect::to("/user/login").into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("internal_error", "Internal server error")),
    )
        .into_response()
}

/// Extractor for handlers behind `require_auth`. Reaching one of those
/// handlers without a resolved identity is a programming-contract
/// violation (a route escaped the middleware stack), reported as a server
/// error rather than unwound.
#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Identity>().cloned().ok_or_else(|| {
            tracing::error!(
                uri = %parts.uri,
                "Handler requires an identity but none was resolved; route is missing require_auth"
            );
            server_error()
        })
    }
}
