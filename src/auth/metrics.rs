// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication outcome counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use utoipa::ToSchema;

use super::AuthError;

/// Pipeline failure codes, in counter order.
const FAILURE_CODES: [&str; 9] = [
    "malformed_token",
    "untrusted_issuer",
    "unknown_key_id",
    "key_source_unavailable",
    "signature_verification",
    "token_expired",
    "token_not_yet_valid",
    "missing_claim",
    "unmapped_group",
];

#[derive(Default)]
pub struct AuthMetrics {
    authenticated: AtomicU64,
    anonymous: AtomicU64,
    failures: [AtomicU64; FAILURE_CODES.len()],
}

/// Point-in-time copy of [`AuthMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AuthMetricsSnapshot {
    /// Requests that produced a principal
    pub authenticated: u64,
    /// Requests without a credential
    pub anonymous: u64,
    /// Failed pipeline runs by error code
    pub failures: BTreeMap<String, u64>,
}

impl AuthMetrics {
    pub fn record_authenticated(&self) {
        self.authenticated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_anonymous(&self) {
        self.anonymous.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: &AuthError) {
        let code = error.error_code();
        match FAILURE_CODES.iter().position(|c| *c == code) {
            Some(index) => {
                self.failures[index].fetch_add(1, Ordering::Relaxed);
            }
            None => tracing::warn!(error_code = code, "Not a pipeline failure; not counted"),
        }
    }

    /// Count for one error code.
    pub fn failures(&self, code: &str) -> u64 {
        FAILURE_CODES
            .iter()
            .position(|c| *c == code)
            .map(|index| self.failures[index].load(Ordering::Relaxed))
            .unwrap_or_default()
    }

    pub fn total_failures(&self) -> u64 {
        self.failures
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .sum()
    }

    pub fn snapshot(&self) -> AuthMetricsSnapshot {
        AuthMetricsSnapshot {
            authenticated: self.authenticated.load(Ordering::Relaxed),
            anonymous: self.anonymous.load(Ordering::Relaxed),
            failures: FAILURE_CODES
                .iter()
                .zip(&self.failures)
                .map(|(code, counter)| (code.to_string(), counter.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}
