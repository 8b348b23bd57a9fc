// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory lesson table and user directory.
//!
//! Lessons are addressed by `(instructor_id, start_time)` with a secondary
//! index on `(student_id, start_time)`. Both keys are unique; nothing else is
//! enforced.
//!
//! The user directory mirrors the identity provider's admin surface: list a
//! group, invite by email, delete, and move a user into a group.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Lesson, UserProfile, UserStatus};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("instructor {instructor_id} already has a lesson starting at {start_time}")]
    InstructorSlotTaken {
        instructor_id: String,
        start_time: DateTime<Utc>,
    },

    #[error("student {student_id} already has a lesson starting at {start_time}")]
    StudentSlotTaken {
        student_id: String,
        start_time: DateTime<Utc>,
    },

    #[error("lesson must stop after it starts")]
    InvalidTimeRange,

    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),

    #[error("a user with email {0} already exists")]
    UserExists(String),

    #[error("user {0} not found")]
    UserNotFound(String),
}

/// Keyed lesson storage.
pub trait LessonStore {
    /// Insert a lesson. Fails if either key is already taken.
    fn put_lesson(&mut self, lesson: Lesson) -> Result<(), StoreError>;

    /// Lessons taught by `instructor_id` starting in `[from, to)`.
    fn lessons_for_instructor(
        &self,
        instructor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Lesson>;

    /// Lessons attended by `student_id` starting in `[from, to)`.
    fn lessons_for_student(
        &self,
        student_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Lesson>;
}

/// Identity-provider user records.
pub trait UserDirectory {
    fn user(&self, id: &str) -> Option<UserProfile>;

    /// Insert or replace a record.
    fn put_user(&mut self, profile: UserProfile);

    /// Members of `group`, ordered by id.
    fn users_in_group(&self, group: &str) -> Vec<UserProfile>;

    /// Create an account for `email` that must set a password on first
    /// sign-in. The new user belongs to no group.
    fn invite_user(&mut self, email: &str) -> Result<UserProfile, StoreError>;

    /// Remove a user and return the removed record.
    fn delete_user(&mut self, id: &str) -> Result<UserProfile, StoreError>;

    /// Put a user in `group`, replacing any previous group.
    fn add_user_to_group(&mut self, id: &str, group: &str) -> Result<UserProfile, StoreError>;
}

type LessonKey = (String, DateTime<Utc>);

#[derive(Default)]
pub struct InMemoryStore {
    lessons: BTreeMap<LessonKey, Lesson>,
    /// `(student_id, start_time)` → primary key
    by_student: BTreeMap<LessonKey, LessonKey>,
    users: HashMap<String, UserProfile>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }
}

type LessonWindow = (Bound<LessonKey>, Bound<LessonKey>);

fn window(id: &str, from: DateTime<Utc>, to: DateTime<Utc>) -> LessonWindow {
    (
        Bound::Included((id.to_string(), from)),
        Bound::Excluded((id.to_string(), to)),
    )
}

impl LessonStore for InMemoryStore {
    fn put_lesson(&mut self, lesson: Lesson) -> Result<(), StoreError> {
        if lesson.stop_time <= lesson.start_time {
            return Err(StoreError::InvalidTimeRange);
        }

        let primary = (lesson.instructor_id.clone(), lesson.start_time);
        let secondary = (lesson.student_id.clone(), lesson.start_time);
        if self.lessons.contains_key(&primary) {
            return Err(StoreError::InstructorSlotTaken {
                instructor_id: lesson.instructor_id,
                start_time: lesson.start_time,
            });
        }
        if self.by_student.contains_key(&secondary) {
            return Err(StoreError::StudentSlotTaken {
                student_id: lesson.student_id,
                start_time: lesson.start_time,
            });
        }

        self.by_student.insert(secondary, primary.clone());
        self.lessons.insert(primary, lesson);
        Ok(())
    }

    fn lessons_for_instructor(
        &self,
        instructor_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Lesson> {
        if from >= to {
            return Vec::new();
        }
        self.lessons
            .range(window(instructor_id, from, to))
            .map(|(_, lesson)| lesson.clone())
            .collect()
    }

    fn lessons_for_student(
        &self,
        student_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Lesson> {
        if from >= to {
            return Vec::new();
        }
        self.by_student
            .range(window(student_id, from, to))
            .filter_map(|(_, primary)| self.lessons.get(primary).cloned())
            .collect()
    }
}

impl UserDirectory for InMemoryStore {
    fn user(&self, id: &str) -> Option<UserProfile> {
        self.users.get(id).cloned()
    }

    fn put_user(&mut self, profile: UserProfile) {
        self.users.insert(profile.id.clone(), profile);
    }

    fn users_in_group(&self, group: &str) -> Vec<UserProfile> {
        let mut members: Vec<UserProfile> = self
            .users
            .values()
            .filter(|user| user.user_group.as_deref() == Some(group))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }

    fn invite_user(&mut self, email: &str) -> Result<UserProfile, StoreError> {
        let email = email.trim();
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(StoreError::InvalidEmail(email.to_string()));
        }
        let taken = self.users.values().any(|user| {
            user.email
                .as_deref()
                .is_some_and(|existing| existing.eq_ignore_ascii_case(email))
        });
        if taken {
            return Err(StoreError::UserExists(email.to_string()));
        }

        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            phone: None,
            first_name: None,
            last_name: None,
            user_group: None,
            status: Some(UserStatus::ForceChangePassword),
            created_at: Some(now),
            last_modified_at: Some(now),
        };
        self.users.insert(profile.id.clone(), profile.clone());
        tracing::info!(user_id = %profile.id, "User invited");
        Ok(profile)
    }

    fn delete_user(&mut self, id: &str) -> Result<UserProfile, StoreError> {
        self.users
            .remove(id)
            .ok_or_else(|| StoreError::UserNotFound(id.to_string()))
    }

    fn add_user_to_group(&mut self, id: &str, group: &str) -> Result<UserProfile, StoreError> {
        let user = self
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::UserNotFound(id.to_string()))?;
        user.user_group = Some(group.to_string());
        user.last_modified_at = Some(Utc::now());
        Ok(user.clone())
    }
}

#[cfg(test)]
pub(crate) fn lesson(instructor: &str, student: &str, hour: u32) -> Lesson {
    use chrono::TimeZone;

    Lesson {
        instructor_id: instructor.to_string(),
        start_time: Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap(),
        stop_time: Utc.with_ymd_and_hms(2026, 3, 2, hour + 1, 0, 0).unwrap(),
        student_id: student.to_string(),
        instructor_name: format!("Instructor {instructor}"),
        student_name: format!("Student {student}"),
    }
}
