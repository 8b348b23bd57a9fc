// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::Level;

/// Authentication error type.
///
/// Every variant up to `UnmappedGroup` is a pipeline failure: it is caught at
/// the pipeline boundary, recorded once and turned into an anonymous request.
/// `MissingPrincipal` and `InsufficientAuthority` are rejections raised later
/// by handlers that require a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Credential header or compact token structure is unusable
    MalformedToken(String),
    /// Token issuer is not the configured trusted issuer
    UntrustedIssuer,
    /// Key identifier is absent from the fetched key set
    UnknownKeyId(String),
    /// Remote key set could not be fetched
    KeySourceUnavailable(String),
    /// Signature or declared algorithm does not match the resolved key
    SignatureVerification,
    /// Token `exp` is in the past
    TokenExpired,
    /// Token `nbf` is in the future
    TokenNotYetValid,
    /// A mandatory claim is absent
    MissingClaim(String),
    /// Group has no configured role
    UnmappedGroup(String),
    /// Handler requires a principal and the request has none
    MissingPrincipal,
    /// Principal lacks the authority a handler requires
    InsufficientAuthority(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UntrustedIssuer => "untrusted_issuer",
            AuthError::UnknownKeyId(_) => "unknown_key_id",
            AuthError::KeySourceUnavailable(_) => "key_source_unavailable",
            AuthError::SignatureVerification => "signature_verification",
            AuthError::TokenExpired => "token_expired",
            AuthError::TokenNotYetValid => "token_not_yet_valid",
            AuthError::MissingClaim(_) => "missing_claim",
            AuthError::UnmappedGroup(_) => "unmapped_group",
            AuthError::MissingPrincipal => "missing_principal",
            AuthError::InsufficientAuthority(_) => "insufficient_authority",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InsufficientAuthority(_) => StatusCode::FORBIDDEN,
            AuthError::KeySourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Severity used when the pipeline boundary records this failure.
    ///
    /// An unmapped group is a gap in authorization intent, not a hostile
    /// token, so it is surfaced above routine verification failures.
    pub fn severity(&self) -> Level {
        match self {
            AuthError::UnmappedGroup(_) => Level::ERROR,
            AuthError::KeySourceUnavailable(_) => Level::WARN,
            _ => Level::INFO,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MalformedToken(reason) => write!(f, "Token is malformed: {reason}"),
            AuthError::UntrustedIssuer => write!(f, "Token issuer is not trusted"),
            AuthError::UnknownKeyId(kid) => write!(f, "No signing key with id '{kid}'"),
            AuthError::KeySourceUnavailable(msg) => {
                write!(f, "Signing key source unavailable: {msg}")
            }
            AuthError::SignatureVerification => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::TokenNotYetValid => write!(f, "Token is not yet valid"),
            AuthError::MissingClaim(claim) => write!(f, "Token is missing the '{claim}' claim"),
            AuthError::UnmappedGroup(group) => {
                write!(f, "Group '{group}' has no configured role")
            }
            AuthError::MissingPrincipal => write!(f, "Authentication is required"),
            AuthError::InsufficientAuthority(authority) => {
                write!(f, "Authority '{authority}' is required for this operation")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
