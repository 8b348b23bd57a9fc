// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    auth::{Auth, Principal},
    error::ApiError,
    models::{ProfileResponse, ProfileSource, UserProfile},
    state::AppState,
    store::UserDirectory,
};

/// Profile derived from token claims alone.
fn profile_from_principal(principal: &Principal) -> UserProfile {
    UserProfile {
        id: principal.subject_id().to_string(),
        email: principal.email().map(str::to_string),
        phone: principal.phone_number().map(str::to_string),
        first_name: principal.given_name().map(str::to_string),
        last_name: principal.family_name().map(str::to_string),
        user_group: Some(principal.primary_group().to_string()),
        status: None,
        created_at: None,
        last_modified_at: None,
    }
}

/// The caller's own profile.
///
/// Served from the user directory when it has a record for the caller,
/// otherwise built from the verified token.
#[utoipa::path(
    get,
    path = "/v1/profile",
    tag = "Profile",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 401, description = "No authenticated principal")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<ProfileResponse>, ApiError> {
    let record = state.store.read().await.user(principal.subject_id());
    let (profile, source) = match record {
        Some(profile) => (profile, ProfileSource::Directory),
        None => (profile_from_principal(&principal), ProfileSource::Token),
    };

    Ok(Json(ProfileResponse {
        profile,
        authorities: principal.authorities().clone(),
        source,
    }))
}
