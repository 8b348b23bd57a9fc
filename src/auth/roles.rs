// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Group to authority mapping.
//!
//! ## Authorities
//!
//! Authorities are plain strings taken from configuration. The handlers in
//! this crate check for:
//!
//! - `ROLE_ADMIN` - operational endpoints (auth metrics)
//! - `ROLE_INSTRUCTOR` - creating lessons, listing lessons taught

use std::collections::{BTreeSet, HashMap};

use super::AuthError;

/// Authority granted to administrators.
pub const ADMIN_AUTHORITY: &str = "ROLE_ADMIN";

/// Authority granted to instructors.
pub const INSTRUCTOR_AUTHORITY: &str = "ROLE_INSTRUCTOR";

/// Roles resolved from a token's group claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoles {
    pub primary_group: String,
    pub authorities: BTreeSet<String>,
}

/// Static group → role table loaded at startup.
///
/// `precedence` is an explicit total order over groups used to pick the
/// primary group. Groups it does not list rank after the listed ones, in the
/// order the token presents them.
#[derive(Debug, Clone, Default)]
pub struct GroupRoleMapping {
    roles: HashMap<String, String>,
    precedence: Vec<String>,
}

impl GroupRoleMapping {
    pub fn new(roles: HashMap<String, String>) -> Self {
        Self {
            roles,
            precedence: Vec::new(),
        }
    }

    /// Set the group precedence, highest first.
    pub fn with_precedence(mut self, precedence: Vec<String>) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn role_for(&self, group: &str) -> Option<&str> {
        self.roles.get(group).map(String::as_str)
    }

    pub fn precedence(&self) -> &[String] {
        &self.precedence
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Map every claimed group to its role.
    ///
    /// Any unmapped group fails the whole resolution; there are no partial
    /// authority sets. A token without groups cannot yield a principal.
    pub fn resolve(&self, groups: &[String]) -> Result<ResolvedRoles, AuthError> {
        let mut authorities = BTreeSet::new();
        for group in groups {
            let role = self
                .role_for(group)
                .ok_or_else(|| AuthError::UnmappedGroup(group.clone()))?;
            authorities.insert(role.to_string());
        }

        let primary_group = self
            .primary_group(groups)
            .ok_or_else(|| AuthError::MissingClaim("groups".to_string()))?;

        Ok(ResolvedRoles {
            primary_group: primary_group.to_string(),
            authorities,
        })
    }

    fn primary_group<'a>(&self, groups: &'a [String]) -> Option<&'a str> {
        groups
            .iter()
            .enumerate()
            .min_by_key(|(claim_position, group)| {
                let rank = self
                    .precedence
                    .iter()
                    .position(|ranked| ranked == *group)
                    .unwrap_or(self.precedence.len());
                (rank, *claim_position)
            })
            .map(|(_, group)| group.as_str())
    }
}
