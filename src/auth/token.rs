// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer credential extraction and unverified token decoding.
//!
//! Nothing produced here is trusted. [`DecodedToken`] exposes the header (for
//! the key id and declared algorithm) and the issuer claim (for the early
//! issuer gate). Every other claim is read only after signature verification.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::Header;
use serde_json::{Map, Value};

use super::AuthError;

/// Authorization scheme accepted in the `Authorization` header.
pub const BEARER_SCHEME: &str = "Bearer";

/// Pull the raw compact token out of the request headers.
///
/// `Ok(None)` means no credential was offered, which is the legitimate
/// anonymous path. A header that is present but unusable is malformed.
pub fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedToken("authorization header is not ASCII".into()))?
        .trim();

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::MalformedToken("expected 'Bearer <token>'".into()))?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AuthError::MalformedToken(format!(
            "unsupported authorization scheme '{scheme}'"
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedToken("empty bearer token".into()));
    }

    Ok(Some(token))
}

/// A compact token split into its parts, signature not yet checked.
#[derive(Debug)]
pub struct DecodedToken<'a> {
    raw: &'a str,
    header: Header,
    claims: Map<String, Value>,
    signature: Vec<u8>,
}

impl<'a> DecodedToken<'a> {
    /// Split and decode `header.payload.signature`.
    pub fn decode(raw: &'a str) -> Result<Self, AuthError> {
        let mut segments = raw.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".into(),
            ));
        };

        let header: Header = serde_json::from_slice(&decode_segment(header, "header")?)
            .map_err(|e| AuthError::MalformedToken(format!("header is not valid JSON: {e}")))?;

        let claims = match serde_json::from_slice::<Value>(&decode_segment(payload, "payload")?) {
            Ok(Value::Object(claims)) => claims,
            Ok(_) => {
                return Err(AuthError::MalformedToken(
                    "payload is not a JSON object".into(),
                ))
            }
            Err(e) => {
                return Err(AuthError::MalformedToken(format!(
                    "payload is not valid JSON: {e}"
                )))
            }
        };

        let signature = decode_segment(signature, "signature")?;
        if signature.is_empty() {
            return Err(AuthError::MalformedToken("signature segment is empty".into()));
        }

        Ok(Self {
            raw,
            header,
            claims,
            signature,
        })
    }

    /// The compact token as presented.
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Unverified claims. Only the issuer may be read before verification.
    pub(crate) fn unverified_claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The key identifier the token asks to be verified with.
    pub fn key_id(&self) -> Result<&str, AuthError> {
        self.header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::UnknownKeyId(String::new()))
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, AuthError> {
    Base64UrlUnpadded::decode_vec(segment)
        .map_err(|_| AuthError::MalformedToken(format!("{name} is not base64url")))
}

/// Reject tokens whose `iss` is not exactly the trusted issuer.
///
/// Runs before any key lookup so tokens from unrelated issuers never cause a
/// fetch against our key endpoint.
pub fn check_issuer(token: &DecodedToken<'_>, trusted_issuer: &str) -> Result<(), AuthError> {
    match token.unverified_claims().get("iss") {
        Some(Value::String(issuer)) if issuer == trusted_issuer => Ok(()),
        _ => Err(AuthError::UntrustedIssuer),
    }
}
