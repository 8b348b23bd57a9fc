// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verified claims and the authenticated principal.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::roles::ResolvedRoles;
use super::AuthError;

/// Default name of the group-membership claim.
pub const DEFAULT_GROUP_CLAIM: &str = "cognito:groups";

type ClaimSetter = fn(&mut IdentityClaims, String);

/// Optional identity claims and where each one lands.
///
/// Values that are not strings are ignored. Add a row to pick up another
/// provider attribute.
const OPTIONAL_CLAIMS: &[(&str, ClaimSetter)] = &[
    ("email", |c, v| c.email = Some(v)),
    ("phone_number", |c, v| c.phone_number = Some(v)),
    ("given_name", |c, v| c.given_name = Some(v)),
    ("family_name", |c, v| c.family_name = Some(v)),
];

/// Identity attributes pulled out of verified claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityClaims {
    pub subject: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Group memberships in the order the token presents them
    pub groups: Vec<String>,
    /// `exp`, Unix seconds
    pub expires_at: i64,
}

impl IdentityClaims {
    /// Extract identity attributes from claims that passed verification.
    pub fn extract(claims: &Map<String, Value>, group_claim: &str) -> Result<Self, AuthError> {
        let subject = match claims.get("sub") {
            Some(Value::String(sub)) if !sub.is_empty() => sub.clone(),
            _ => return Err(AuthError::MissingClaim("sub".to_string())),
        };

        let mut identity = IdentityClaims {
            subject,
            expires_at: claims.get("exp").and_then(Value::as_i64).unwrap_or_default(),
            ..Default::default()
        };

        for (name, set) in OPTIONAL_CLAIMS {
            if let Some(Value::String(value)) = claims.get(*name) {
                set(&mut identity, value.clone());
            }
        }

        identity.groups = match claims.get(group_claim) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(group) => Ok(group.clone()),
                    _ => Err(AuthError::MalformedToken(format!(
                        "'{group_claim}' must contain only strings"
                    ))),
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(AuthError::MalformedToken(format!(
                    "'{group_claim}' must be an array"
                )))
            }
        };

        Ok(identity)
    }
}

/// Authenticated caller, immutable once built.
///
/// Only [`Principal::new`] creates one, so a principal always carries a
/// subject and at least one authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    family_name: Option<String>,
    primary_group: String,
    authorities: BTreeSet<String>,
    #[serde(skip)]
    expires_at: i64,
}

impl Principal {
    /// Assemble a principal from extracted claims and resolved roles.
    pub fn new(identity: IdentityClaims, roles: ResolvedRoles) -> Result<Self, AuthError> {
        if identity.subject.is_empty() {
            return Err(AuthError::MissingClaim("sub".to_string()));
        }
        if roles.authorities.is_empty() {
            return Err(AuthError::MissingClaim("groups".to_string()));
        }

        Ok(Self {
            subject_id: identity.subject,
            email: identity.email,
            phone_number: identity.phone_number,
            given_name: identity.given_name,
            family_name: identity.family_name,
            primary_group: roles.primary_group,
            authorities: roles.authorities,
            expires_at: identity.expires_at,
        })
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn given_name(&self) -> Option<&str> {
        self.given_name.as_deref()
    }

    pub fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
    }

    pub fn primary_group(&self) -> &str {
        &self.primary_group
    }

    pub fn authorities(&self) -> &BTreeSet<String> {
        &self.authorities
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// "Given Family", falling back to whichever part is present.
    pub fn display_name(&self) -> Option<String> {
        match (self.given_name(), self.family_name()) {
            (Some(given), Some(family)) => Some(format!("{given} {family}")),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }

    /// Reject with 403 unless the principal holds `authority`.
    pub fn require_authority(&self, authority: &str) -> Result<(), AuthError> {
        if self.has_authority(authority) {
            Ok(())
        } else {
            Err(AuthError::InsufficientAuthority(authority.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_principal(authorities: &[&str]) -> Principal {
    Principal::new(
        IdentityClaims {
            subject: "user-123".to_string(),
            email: Some("jana@example.com".to_string()),
            given_name: Some("Jana".to_string()),
            family_name: Some("Novakova".to_string()),
            groups: vec!["group".to_string()],
            ..Default::default()
        },
        ResolvedRoles {
            primary_group: "group".to_string(),
            authorities: authorities.iter().map(|a| a.to_string()).collect(),
        },
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn extracts_identity_attributes() {
        let claims = claims(json!({
            "sub": "user-123",
            "email": "jana@example.com",
            "phone_number": "+421900123456",
            "given_name": "Jana",
            "family_name": "Novakova",
            "cognito:groups": ["admins", "students"],
            "exp": 1_900_000_000,
        }));

        let identity = IdentityClaims::extract(&claims, DEFAULT_GROUP_CLAIM).unwrap();
        assert_eq!(identity.subject, "user-123");
        assert_eq!(identity.email.as_deref(), Some("jana@example.com"));
        assert_eq!(identity.phone_number.as_deref(), Some("+421900123456"));
        assert_eq!(identity.given_name.as_deref(), Some("Jana"));
        assert_eq!(identity.family_name.as_deref(), Some("Novakova"));
        assert_eq!(identity.groups, vec!["admins", "students"]);
        assert_eq!(identity.expires_at, 1_900_000_000);
    }

    #[test]
    fn missing_subject_is_missing_claim() {
        let claims = claims(json!({ "email": "jana@example.com" }));
        assert_eq!(
            IdentityClaims::extract(&claims, DEFAULT_GROUP_CLAIM),
            Err(AuthError::MissingClaim("sub".into()))
        );
    }

    #[test]
    fn optional_attributes_may_be_absent() {
        let claims = claims(json!({ "sub": "user-123", "email": 42 }));
        let identity = IdentityClaims::extract(&claims, DEFAULT_GROUP_CLAIM).unwrap();
        assert_eq!(identity.email, None);
        assert_eq!(identity.given_name, None);
        assert!(identity.groups.is_empty());
    }

    #[test]
    fn group_claim_name_is_configurable() {
        let claims = claims(json!({ "sub": "user-123", "groups": ["staff"] }));
        let identity = IdentityClaims::extract(&claims, "groups").unwrap();
        assert_eq!(identity.groups, vec!["staff"]);
    }

    #[test]
    fn non_array_group_claim_is_malformed() {
        let claims = claims(json!({ "sub": "user-123", "cognito:groups": "admins" }));
        assert!(matches!(
            IdentityClaims::extract(&claims, DEFAULT_GROUP_CLAIM),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn principal_requires_authorities() {
        let identity = IdentityClaims {
            subject: "user-123".into(),
            ..Default::default()
        };
        let roles = ResolvedRoles {
            primary_group: "admins".into(),
            authorities: BTreeSet::new(),
        };
        assert!(matches!(
            Principal::new(identity, roles),
            Err(AuthError::MissingClaim(_))
        ));
    }

    #[test]
    fn authority_checks() {
        let principal = sample_principal(&["ROLE_ADMIN"]);
        assert!(principal.has_authority("ROLE_ADMIN"));
        assert!(principal.require_authority("ROLE_ADMIN").is_ok());
        assert_eq!(
            principal.require_authority("ROLE_INSTRUCTOR"),
            Err(AuthError::InsufficientAuthority("ROLE_INSTRUCTOR".into()))
        );
    }

    #[test]
    fn display_name_joins_names() {
        let principal = sample_principal(&["ROLE_ADMIN"]);
        assert_eq!(principal.display_name().as_deref(), Some("Jana Novakova"));
    }

    #[test]
    fn serializes_without_expiry() {
        let principal = sample_principal(&["ROLE_ADMIN"]);
        let json = serde_json::to_value(&principal).unwrap();
        assert_eq!(json["subjectId"], "user-123");
        assert_eq!(json["authorities"], json!(["ROLE_ADMIN"]));
        assert!(json.get("expiresAt").is_none());
        assert!(json.get("phoneNumber").is_none());
    }
}
