// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Verifies identity-provider bearer tokens for the booking API.
//!
//! ## Auth Flow
//!
//! 1. Client authenticates with the identity provider (user pool)
//! 2. Client sends `Authorization: Bearer <JWT>`
//! 3. Server:
//!    - Rejects tokens from any issuer but the configured one
//!    - Resolves the token's `kid` in the key ring (JWKS fetched over HTTPS)
//!    - Verifies signature, algorithm, expiry and not-before
//!    - Extracts:
//!      - `sub` → principal subject id
//!      - `cognito:groups` → authorities via the configured group/role table
//!
//! ## Security
//!
//! - Authentication is fail-open: a request without a valid token continues
//!   without a principal, and handlers decide whether that is acceptable
//! - Every failure is logged and counted at the pipeline boundary
//! - Concurrent key misses trigger a single JWKS fetch
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod roles;
pub mod token;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use claims::{IdentityClaims, Principal};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, OptionalAuth};
pub use jwks::{KeyRing, SigningKey};
pub use metrics::{AuthMetrics, AuthMetricsSnapshot};
pub use pipeline::{AuthOutcome, AuthPipeline};
pub use roles::GroupRoleMapping;
