use crate::middleware::{CsrfToken, Flash, Identity};
use axum::{Extension, Json};
use beacon_models::UserProfile;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub user: UserProfile,
    pub flash: BTreeMap<String, String>,
    pub csrf_token: String,
}

/// Authenticated landing payload: who you are, any one-shot messages, and
/// the token to attach to state-changing requests.
pub async fn index(
    identity: Identity,
    Extension(flash): Extension<Flash>,
    Extension(csrf): Extension<CsrfToken>,
) -> Json<HomeResponse> {
    Json(HomeResponse {
        user: identity.user.into(),
        flash: flash.0,
        csrf_token: csrf.0,
    })
}
