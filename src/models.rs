// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the booking API. All types derive
//! `Serialize`/`Deserialize` and `ToSchema` for JSON handling and OpenAPI
//! documentation. Field names are camelCase on the wire.
//!
//! ## Model Categories
//!
//! - **Lessons**: a lesson is keyed by instructor and start time, and indexed
//!   by student and start time
//! - **Profiles**: directory records for users of the identity provider

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// =============================================================================
// Lesson Models
// =============================================================================

/// A booked lesson between an instructor and a student.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Subject id of the instructor (primary key).
    pub instructor_id: String,
    /// Lesson start (primary and secondary range key).
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    /// Subject id of the student (secondary index key).
    pub student_id: String,
    pub instructor_name: String,
    pub student_name: String,
}

/// Request body for booking a lesson. The instructor is the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonRequest {
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    pub student_id: String,
    pub student_name: String,
}

/// Half-open time window `[from, to)` over lesson start times.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LessonRangeQuery {
    /// Inclusive lower bound (RFC 3339).
    pub from: DateTime<Utc>,
    /// Exclusive upper bound (RFC 3339).
    pub to: DateTime<Utc>,
}

// =============================================================================
// Profile Models
// =============================================================================

/// Account state as reported by the identity provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Confirmed,
    Unconfirmed,
    ForceChangePassword,
    Disabled,
}

/// Directory record for a user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// `None` until the user is added to a group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

/// Where a profile response came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    Directory,
    Token,
}

/// Response for `GET /v1/profile`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub profile: UserProfile,
    /// Authorities granted to the caller for this request.
    pub authorities: BTreeSet<String>,
    pub source: ProfileSource,
}
