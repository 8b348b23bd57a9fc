// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signature and time-bound claim verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Validation};
use serde_json::{Map, Value};

use super::jwks::SigningKey;
use super::token::DecodedToken;
use super::AuthError;

/// Clock skew tolerance (60 seconds).
pub const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Verify `token` with `key` and return its now-trusted claims.
///
/// The algorithm is fixed by the key, never by the token: a header declaring
/// anything else is rejected before any cryptography runs. `exp` is required
/// and `nbf` is checked when present.
pub fn verify_signature(
    token: &DecodedToken<'_>,
    key: &SigningKey,
    trusted_issuer: &str,
) -> Result<Map<String, Value>, AuthError> {
    if token.header().alg != key.algorithm() {
        return Err(AuthError::SignatureVerification);
    }

    let mut validation = Validation::new(key.algorithm());
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.set_issuer(&[trusted_issuer]);

    let token_data = decode::<Map<String, Value>>(token.raw(), key.decoding_key(), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                AuthError::SignatureVerification
            }
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidIssuer => AuthError::UntrustedIssuer,
            ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
            other => AuthError::MalformedToken(format!("{other:?}")),
        })?;

    Ok(token_data.claims)
}
