// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Runs the pipeline for every request and publishes the resulting
//! [`Principal`](super::Principal) into request extensions. The request always
//! continues: handlers that need a principal reject on their own through the
//! [`Auth`](super::Auth) extractor.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/v1/profile", get(get_profile))
//!     .layer(axum::middleware::from_fn_with_state(pipeline, authenticate_request));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::claims::Principal;
use super::pipeline::{AuthOutcome, AuthPipeline};

/// Publish the caller's principal, or nothing, then continue.
pub async fn authenticate_request(
    State(pipeline): State<AuthPipeline>,
    mut request: Request,
    next: Next,
) -> Response {
    // Only this middleware decides what principal a request carries.
    request.extensions_mut().remove::<Principal>();

    if let AuthOutcome::Authenticated(principal) = pipeline.authenticate(request.headers()).await {
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}
