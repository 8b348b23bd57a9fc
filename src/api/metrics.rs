// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    auth::{AdminOnly, AuthMetricsSnapshot},
    state::AppState,
};

/// Authentication outcome counters since startup.
#[utoipa::path(
    get,
    path = "/v1/auth/metrics",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = AuthMetricsSnapshot),
        (status = 401, description = "No authenticated principal"),
        (status = 403, description = "Caller lacks ROLE_ADMIN")
    )
)]
pub async fn auth_metrics(
    State(state): State<AppState>,
    AdminOnly(_admin): AdminOnly,
) -> Json<AuthMetricsSnapshot> {
    Json(state.auth.metrics().snapshot())
}
