// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Booking Server - Lesson Booking Backend
//!
//! Verifies bearer tokens issued by an external identity provider and serves
//! profile and lesson endpoints to the authenticated caller.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token verification pipeline and principal extraction
//! - `config` - Environment configuration
//! - `store` - In-memory lesson table and user directory

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;
