// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request authentication pipeline.
//!
//! ```text
//! extract → decode → issuer gate → key ring → verify → claims → roles → principal
//! ```
//!
//! Every stage returns a typed `Result`. [`AuthPipeline::authenticate`] is the
//! only place that turns a failure into an anonymous request, and the only
//! place that logs and counts it.

use std::sync::Arc;

use axum::http::HeaderMap;
use tracing::Level;

use super::claims::{IdentityClaims, Principal};
use super::jwks::KeyRing;
use super::metrics::AuthMetrics;
use super::token::{check_issuer, extract_bearer, DecodedToken};
use super::verifier::verify_signature;
use super::AuthError;
use crate::config::AuthConfig;

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Principal),
    Anonymous,
}

impl AuthOutcome {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthOutcome::Authenticated(principal) => Some(principal),
            AuthOutcome::Anonymous => None,
        }
    }

    pub fn into_principal(self) -> Option<Principal> {
        match self {
            AuthOutcome::Authenticated(principal) => Some(principal),
            AuthOutcome::Anonymous => None,
        }
    }
}

/// Shared, cheaply cloneable pipeline.
#[derive(Clone)]
pub struct AuthPipeline {
    config: Arc<AuthConfig>,
    key_ring: KeyRing,
    metrics: Arc<AuthMetrics>,
}

impl AuthPipeline {
    pub fn new(config: AuthConfig, key_ring: KeyRing) -> Self {
        Self {
            config: Arc::new(config),
            key_ring,
            metrics: Arc::new(AuthMetrics::default()),
        }
    }

    pub fn key_ring(&self) -> &KeyRing {
        &self.key_ring
    }

    pub fn metrics(&self) -> &AuthMetrics {
        &self.metrics
    }

    /// Run the pipeline and make the fail-open decision.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        match self.verify(headers).await {
            Ok(Some(principal)) => {
                self.metrics.record_authenticated();
                tracing::debug!(
                    subject = principal.subject_id(),
                    primary_group = principal.primary_group(),
                    expires_at = principal.expires_at(),
                    "Request authenticated"
                );
                AuthOutcome::Authenticated(principal)
            }
            Ok(None) => {
                self.metrics.record_anonymous();
                AuthOutcome::Anonymous
            }
            Err(error) => {
                self.record_failure(&error);
                AuthOutcome::Anonymous
            }
        }
    }

    /// Run every stage. `Ok(None)` means no credential was presented.
    pub async fn verify(&self, headers: &HeaderMap) -> Result<Option<Principal>, AuthError> {
        let Some(raw) = extract_bearer(headers)? else {
            return Ok(None);
        };

        let token = DecodedToken::decode(raw)?;
        check_issuer(&token, &self.config.issuer)?;

        let key = self.key_ring.resolve(token.key_id()?).await?;
        let claims = verify_signature(&token, &key, &self.config.issuer)?;

        let identity = IdentityClaims::extract(&claims, &self.config.group_claim)?;
        let roles = self.config.group_roles.resolve(&identity.groups)?;

        Principal::new(identity, roles).map(Some)
    }

    fn record_failure(&self, error: &AuthError) {
        self.metrics.record_failure(error);

        let error_code = error.error_code();
        let severity = error.severity();
        if severity == Level::ERROR {
            tracing::error!(
                error_code,
                error = %error,
                "Authentication failed: identity provider group has no configured role"
            );
        } else if severity == Level::WARN {
            tracing::warn!(error_code, error = %error, "Authentication failed");
        } else {
            tracing::info!(error_code, error = %error, "Authentication failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::roles::GroupRoleMapping;
    use crate::auth::test_support::{
        claims, mint, now, rsa_jwk, JwksServer, ISSUER, KEY_1, KEY_2, ROGUE_KEY,
    };
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use base64ct::{Base64UrlUnpadded, Encoding};
    use jsonwebtoken::Algorithm;
    use serde_json::json;
    use std::collections::{BTreeSet, HashMap};
    use std::time::Duration;

    async fn pipeline(roles: &[(&str, &str)]) -> (JwksServer, AuthPipeline) {
        let server = JwksServer::start(json!({ "keys": [rsa_jwk(&KEY_1), rsa_jwk(&KEY_2)] })).await;
        let mapping = GroupRoleMapping::new(
            roles
                .iter()
                .map(|(group, role)| (group.to_string(), role.to_string()))
                .collect::<HashMap<_, _>>(),
        );
        let config = AuthConfig::new(ISSUER, "/.well-known/jwks.json", mapping).unwrap();
        let ring = KeyRing::new(server.url(), Algorithm::RS256, Duration::from_secs(2)).unwrap();
        (server, AuthPipeline::new(config, ring))
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn scenario_a_trusted_admin_is_authenticated() {
        let (_server, pipeline) = pipeline(&[("admins", "ROLE_ADMIN")]).await;
        let token = mint(&KEY_1, &claims(ISSUER, &["admins"]));

        let outcome = pipeline.authenticate(&bearer(&token)).await;
        let principal = outcome.principal().expect("authenticated");
        assert_eq!(principal.subject_id(), "6b1f6c2e-0d4e-4a53-9a55-1f2d3c4b5a69");
        assert_eq!(principal.email(), Some("jana@example.com"));
        assert_eq!(principal.phone_number(), Some("+421900123456"));
        assert_eq!(principal.given_name(), Some("Jana"));
        assert_eq!(principal.family_name(), Some("Novakova"));
        assert_eq!(principal.primary_group(), "admins");
        assert_eq!(
            principal.authorities(),
            &BTreeSet::from(["ROLE_ADMIN".to_string()])
        );
        assert_eq!(pipeline.metrics().snapshot().authenticated, 1);
        assert_eq!(pipeline.metrics().total_failures(), 0);
    }

    #[tokio::test]
    async fn scenario_b_other_issuer_is_anonymous_without_key_fetch() {
        let (server, pipeline) = pipeline(&[("admins", "ROLE_ADMIN")]).await;
        let token = mint(&KEY_1, &claims("https://idp.example/other", &["admins"]));

        let outcome = pipeline.authenticate(&bearer(&token)).await;
        assert_eq!(outcome, AuthOutcome::Anonymous);
        assert_eq!(pipeline.metrics().failures("untrusted_issuer"), 1);
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn scenario_c_unmapped_group_yields_no_partial_principal() {
        let (_server, pipeline) = pipeline(&[("students", "ROLE_STUDENT")]).await;
        let token = mint(&KEY_1, &claims(ISSUER, &["students", "unknown_group"]));

        assert_eq!(
            pipeline.verify(&bearer(&token)).await,
            Err(AuthError::UnmappedGroup("unknown_group".into()))
        );
        let outcome = pipeline.authenticate(&bearer(&token)).await;
        assert_eq!(outcome, AuthOutcome::Anonymous);
        assert_eq!(pipeline.metrics().failures("unmapped_group"), 1);
    }

    #[tokio::test]
    async fn scenario_d_no_header_is_anonymous_and_unrecorded() {
        let (server, pipeline) = pipeline(&[("admins", "ROLE_ADMIN")]).await;

        let outcome = pipeline.authenticate(&HeaderMap::new()).await;
        assert_eq!(outcome, AuthOutcome::Anonymous);
        assert_eq!(pipeline.metrics().total_failures(), 0);
        assert_eq!(pipeline.metrics().snapshot().anonymous, 1);
        assert_eq!(server.hits(), 0);
    }

    #[tokio::test]
    async fn every_mapped_group_contributes_an_authority() {
        let (_server, pipeline) =
            pipeline(&[("instructors", "ROLE_INSTRUCTOR"), ("admins", "ROLE_ADMIN")]).await;
        let token = mint(&KEY_2, &claims(ISSUER, &["instructors", "admins"]));

        let principal = pipeline
            .authenticate(&bearer(&token))
            .await
            .into_principal()
            .expect("authenticated");
        assert_eq!(principal.primary_group(), "instructors");
        assert_eq!(
            principal.authorities(),
            &BTreeSet::from(["ROLE_ADMIN".to_string(), "ROLE_INSTRUCTOR".to_string()])
        );
    }

    #[tokio::test]
    async fn single_stage_failures_are_anonymous_and_recorded() {
        let (_server, pipeline) = pipeline(&[("admins", "ROLE_ADMIN")]).await;

        let mut no_subject = claims(ISSUER, &["admins"]);
        no_subject.as_object_mut().unwrap().remove("sub");
        let mut expired = claims(ISSUER, &["admins"]);
        expired["exp"] = json!(now() - 7200);
        let mut unknown_kid = KEY_1;
        unknown_kid.kid = "retired-key";

        let cases = [
            ("not-a-token".to_string(), "malformed_token"),
            (mint(&ROGUE_KEY, &claims(ISSUER, &["admins"])), "signature_verification"),
            (mint(&unknown_kid, &claims(ISSUER, &["admins"])), "unknown_key_id"),
            (mint(&KEY_1, &no_subject), "missing_claim"),
            (mint(&KEY_1, &expired), "token_expired"),
        ];

        for (token, code) in cases {
            let outcome = pipeline.authenticate(&bearer(&token)).await;
            assert_eq!(outcome, AuthOutcome::Anonymous, "{code}");
            assert_eq!(pipeline.metrics().failures(code), 1, "{code}");
        }
    }

    #[tokio::test]
    async fn tampering_turns_authenticated_into_anonymous() {
        let (_server, pipeline) = pipeline(&[("admins", "ROLE_ADMIN")]).await;
        let token = mint(&KEY_1, &claims(ISSUER, &["admins"]));
        assert!(pipeline.authenticate(&bearer(&token)).await.principal().is_some());

        let (signing_input, signature) = token.rsplit_once('.').unwrap();
        let mut signature = Base64UrlUnpadded::decode_vec(signature).unwrap();
        let last = signature.len() - 1;
        signature[last] ^= 0x80;
        let forged = format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        );

        assert_eq!(
            pipeline.authenticate(&bearer(&forged)).await,
            AuthOutcome::Anonymous
        );
        assert_eq!(pipeline.metrics().failures("signature_verification"), 1);
    }

    #[tokio::test]
    async fn key_source_outage_is_distinct_from_unknown_key() {
        let (server, pipeline) = pipeline(&[("admins", "ROLE_ADMIN")]).await;
        server.set_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
        let token = mint(&KEY_1, &claims(ISSUER, &["admins"]));

        assert!(matches!(
            pipeline.verify(&bearer(&token)).await,
            Err(AuthError::KeySourceUnavailable(_))
        ));

        server.set_status(axum::http::StatusCode::OK);
        assert!(pipeline.verify(&bearer(&token)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn token_without_kid_is_unknown_key_without_fetch() {
        let (server, pipeline) = pipeline(&[("admins", "ROLE_ADMIN")]).await;
        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(KEY_1.pem.as_bytes()).unwrap();
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::RS256),
            &claims(ISSUER, &["admins"]),
            &encoding_key,
        )
        .unwrap();

        assert_eq!(
            pipeline.verify(&bearer(&token)).await,
            Err(AuthError::UnknownKeyId(String::new()))
        );
        let outcome = pipeline.authenticate(&bearer(&token)).await;
        assert_eq!(outcome, AuthOutcome::Anonymous);
        assert_eq!(pipeline.metrics().failures("unknown_key_id"), 1);
        assert_eq!(server.hits(), 0);
    }
}
