use crate::cookies::{self, SESSION_COOKIE};
use crate::middleware::Identity;
use crate::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use beacon_auth::{AuthError, SessionContext};
use beacon_database::DatabaseError;
use beacon_models::NewUser;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::internal_error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrorResponse {
    pub fn single(field: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        Self {
            error: "validation_failed".to_string(),
            fields,
        }
    }
}

impl From<validator::ValidationErrors> for ValidationErrorResponse {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        Self {
            error: "validation_failed".to_string(),
            fields,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Request facts captured on new session records. The proxy-supplied
/// forwarding headers win over nothing at all; an empty IP is acceptable.
fn session_context(headers: &HeaderMap) -> SessionContext {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        })
        .unwrap_or_default();

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    SessionContext {
        ip_address,
        user_agent,
    }
}

/// Issue a session for the user and build the post-auth redirect: session
/// cookie carrying the raw token, a greeting flash, and a 303 to `/`.
async fn establish_session(
    state: &AppState,
    user_id: i64,
    email: &str,
    greeting: String,
    headers: &HeaderMap,
) -> Response {
    let ctx = session_context(headers);

    let (session, raw_token) = match state.auth_service.create_session(user_id, &ctx).await {
        Ok(issued) => issued,
        Err(e) => return internal_error(e),
    };

    let mut values = BTreeMap::new();
    values.insert("token".to_string(), raw_token);
    let max_age = (session.expires_at - Utc::now()).num_seconds();

    let session_cookie =
        match cookies::sealed_cookie(&state.codec, SESSION_COOKIE, &values, Some(max_age)) {
            Ok(cookie) => cookie,
            Err(e) => return internal_error(e),
        };

    let flash_cookie = match cookies::flash_cookie(&state.codec, "info", &greeting) {
        Ok(cookie) => cookie,
        Err(e) => return internal_error(e),
    };

    tracing::info!(user_id, email, "Session issued");

    let mut response = Redirect::to("/").into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, session_cookie);
    response
        .headers_mut()
        .append(header::SET_COOKIE, flash_cookie);
    response
}

/// Register a new user and log them straight in.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<SignupForm>,
) -> Response {
    let new_user = NewUser {
        email: form.email,
        password: form.password,
        timezone: form.timezone,
    };

    let user = match state.auth_service.signup(&new_user).await {
        Ok(user) => user,
        Err(AuthError::Validation(errors)) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorResponse::from(errors)),
            )
                .into_response();
        }
        Err(AuthError::Database(DatabaseError::DuplicateEmail)) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorResponse::single(
                    "email",
                    "Email address is already in use",
                )),
            )
                .into_response();
        }
        Err(e) => return internal_error(e),
    };

    let email = user.email.clone();
    establish_session(&state, user.id, &email, "Welcome!".to_string(), &headers).await
}

/// Login with email and password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let user = match state.auth_service.login(&form.email, &form.password).await {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            // Never distinguishes unknown email from wrong password.
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse::new(
                    "invalid_credentials",
                    "Email or password is incorrect",
                )),
            )
                .into_response();
        }
        Err(e) => return internal_error(e),
    };

    let username = user.email.split('@').next().unwrap_or("there").to_string();
    let email = user.email.clone();
    establish_session(&state, user.id, &email, format!("Hi, {}!", username), &headers).await
}

/// Logout: retire the session record and overwrite the session cookie
/// with an immediately-expiring empty payload.
pub async fn logout(State(state): State<Arc<AppState>>, identity: Identity) -> Response {
    if let Err(e) = state.auth_service.delete_session(&identity.session).await {
        return internal_error(e);
    }

    let mut values = BTreeMap::new();
    values.insert("token".to_string(), String::new());
    let session_cookie =
        match cookies::expired_sealed_cookie(&state.codec, SESSION_COOKIE, &values) {
            Ok(cookie) => cookie,
            Err(e) => return internal_error(e),
        };

    let flash_cookie = match cookies::flash_cookie(
        &state.codec,
        "info",
        "You've been logged out successfully!",
    ) {
        Ok(cookie) => cookie,
        Err(e) => return internal_error(e),
    };

    tracing::info!(user_id = identity.user.id, "Session retired");

    let mut response = Redirect::to("/user/login").into_response();
    response
        .headers_mut()
        .append(header::SET_COOKIE, session_cookie);
    response
        .headers_mut()
        .append(header::SET_COOKIE, flash_cookie);
    response
}
