use crate::middleware::Identity;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use beacon_auth::AuthError;
use beacon_database::DatabaseError;
use beacon_models::SessionSummary;
use serde::Serialize;
use std::sync::Arc;

use super::{internal_error, ErrorResponse};

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub sessions: Vec<SessionSummary>,
}

/// The current user's sessions, most recently used first, with the one
/// serving this request marked.
pub async fn settings(State(state): State<Arc<AppState>>, identity: Identity) -> Response {
    let sessions = match state.auth_service.list_sessions(&identity.user).await {
        Ok(sessions) => sessions,
        Err(e) => return internal_error(e),
    };

    let sessions = sessions
        .into_iter()
        .map(|session| {
            let current = session.id == identity.session.id;
            SessionSummary::from_session(session, current)
        })
        .collect();

    Json(SettingsResponse { sessions }).into_response()
}

/// Delete one of the current user's sessions. Sessions belonging to other
/// users are indistinguishable from nonexistent ones.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(id): Path<i64>,
) -> Response {
    match state
        .auth_service
        .delete_session_by_id(&identity.user, id)
        .await
    {
        Ok(()) => Redirect::to("/user/settings").into_response(),
        Err(AuthError::Database(DatabaseError::NotFound)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("not_found", "Session not found")),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}
