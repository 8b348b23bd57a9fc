// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{middleware::authenticate_request, AuthMetricsSnapshot, Principal},
    models::{CreateLessonRequest, Lesson, ProfileResponse, ProfileSource, UserProfile, UserStatus},
    state::AppState,
};

pub mod health;
pub mod lessons;
pub mod metrics;
pub mod profile;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/profile", get(profile::get_profile))
        .route(
            "/lessons",
            get(lessons::list_lessons).post(lessons::create_lesson),
        )
        .route("/auth/metrics", get(metrics::auth_metrics));

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);
    let http_layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .layer(from_fn_with_state(state.auth.clone(), authenticate_request))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(http_layers)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        profile::get_profile,
        lessons::list_lessons,
        lessons::create_lesson,
        metrics::auth_metrics
    ),
    components(
        schemas(
            Lesson,
            CreateLessonRequest,
            UserProfile,
            UserStatus,
            ProfileResponse,
            ProfileSource,
            Principal,
            AuthMetricsSnapshot,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Profile", description = "Caller profile"),
        (name = "Lessons", description = "Lesson booking"),
        (name = "Admin", description = "Operational endpoints")
    )
)]
struct ApiDoc;
