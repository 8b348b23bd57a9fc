// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::{roles::INSTRUCTOR_AUTHORITY, Auth},
    error::ApiError,
    models::{CreateLessonRequest, Lesson, LessonRangeQuery},
    state::AppState,
    store::LessonStore,
};

/// Lessons starting in `[from, to)` for the caller.
///
/// Instructors see the lessons they teach; everyone else sees the lessons
/// they attend.
#[utoipa::path(
    get,
    path = "/v1/lessons",
    params(LessonRangeQuery),
    tag = "Lessons",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, body = [Lesson]),
        (status = 400, description = "Empty or inverted time window"),
        (status = 401, description = "No authenticated principal")
    )
)]
pub async fn list_lessons(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Query(range): Query<LessonRangeQuery>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
    if range.from >= range.to {
        return Err(ApiError::bad_request("`from` must be earlier than `to`"));
    }

    let store = state.store.read().await;
    let lessons = if principal.has_authority(INSTRUCTOR_AUTHORITY) {
        store.lessons_for_instructor(principal.subject_id(), range.from, range.to)
    } else {
        store.lessons_for_student(principal.subject_id(), range.from, range.to)
    };
    Ok(Json(lessons))
}

/// Book a lesson taught by the calling instructor.
#[utoipa::path(
    post,
    path = "/v1/lessons",
    request_body = CreateLessonRequest,
    tag = "Lessons",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, body = Lesson),
        (status = 400, description = "Lesson stops before it starts"),
        (status = 401, description = "No authenticated principal"),
        (status = 403, description = "Caller is not an instructor"),
        (status = 409, description = "Instructor or student already booked at that time")
    )
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(request): Json<CreateLessonRequest>,
) -> Result<(StatusCode, Json<Lesson>), ApiError> {
    principal.require_authority(INSTRUCTOR_AUTHORITY)?;

    let lesson = Lesson {
        instructor_id: principal.subject_id().to_string(),
        start_time: request.start_time,
        stop_time: request.stop_time,
        student_id: request.student_id,
        instructor_name: principal
            .display_name()
            .unwrap_or_else(|| principal.subject_id().to_string()),
        student_name: request.student_name,
    };

    state.store.write().await.put_lesson(lesson.clone())?;
    tracing::info!(
        instructor_id = %lesson.instructor_id,
        student_id = %lesson.student_id,
        start_time = %lesson.start_time,
        "Lesson booked"
    );

    Ok((StatusCode::CREATED, Json(lesson)))
}
