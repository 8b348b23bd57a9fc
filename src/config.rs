// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and is
//! immutable afterwards. Any error here is fatal: the server does not start.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_ISSUER` | Trusted token issuer (user pool URL) | Required |
//! | `AUTH_KEY_STORE_PATH` | JWKS path appended to the issuer | Required |
//! | `AUTH_GROUP_ROLES` | `group=ROLE` pairs, comma separated | empty |
//! | `AUTH_GROUP_PRECEDENCE` | Groups highest precedence first, comma separated | claim order |
//! | `AUTH_GROUP_CLAIM` | Claim holding group memberships | `cognito:groups` |
//! | `AUTH_SIGNING_ALGORITHM` | Asymmetric algorithm keys must use | `RS256` |
//! | `AUTH_KEY_FETCH_TIMEOUT_SECS` | JWKS fetch timeout, at least 1 | `5` |
//! | `AUTH_KEY_MIN_REFRESH_SECS` | Minimum gap between JWKS fetches on `kid` misses | `10` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate and key; both set enables HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::auth::claims::DEFAULT_GROUP_CLAIM;
use crate::auth::jwks::{DEFAULT_FETCH_TIMEOUT, DEFAULT_MIN_REFRESH_INTERVAL};
use crate::auth::roles::GroupRoleMapping;

pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_KEY_STORE_PATH_ENV: &str = "AUTH_KEY_STORE_PATH";
pub const AUTH_GROUP_ROLES_ENV: &str = "AUTH_GROUP_ROLES";
pub const AUTH_GROUP_PRECEDENCE_ENV: &str = "AUTH_GROUP_PRECEDENCE";
pub const AUTH_GROUP_CLAIM_ENV: &str = "AUTH_GROUP_CLAIM";
pub const AUTH_SIGNING_ALGORITHM_ENV: &str = "AUTH_SIGNING_ALGORITHM";
pub const AUTH_KEY_FETCH_TIMEOUT_ENV: &str = "AUTH_KEY_FETCH_TIMEOUT_SECS";
pub const AUTH_KEY_MIN_REFRESH_ENV: &str = "AUTH_KEY_MIN_REFRESH_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{var}: invalid entry '{entry}' (expected group=ROLE)")]
    InvalidMapping { var: &'static str, entry: String },

    #[error("{var}: group '{group}' is listed more than once")]
    DuplicateGroup { var: &'static str, group: String },

    #[error(
        "{var} names group '{0}' which has no configured role",
        var = AUTH_GROUP_PRECEDENCE_ENV
    )]
    UnknownPrecedenceGroup(String),

    #[error("{var}: '{value}' is not a valid number")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("key store URL '{url}' is invalid: {reason}")]
    InvalidKeyStoreUrl { url: String, reason: String },

    #[error(
        "{var}: '{0}' is not an asymmetric signing algorithm",
        var = AUTH_SIGNING_ALGORITHM_ENV
    )]
    UnsupportedAlgorithm(String),

    #[error(
        "{cert} and {key} must be set together",
        cert = TLS_CERT_PATH_ENV,
        key = TLS_KEY_PATH_ENV
    )]
    IncompleteTls,
}

/// Trusted issuer and everything needed to turn its tokens into principals.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub key_store_path: String,
    /// `issuer + key_store_path`
    pub jwks_url: Url,
    pub algorithm: Algorithm,
    pub group_claim: String,
    pub group_roles: GroupRoleMapping,
    pub key_fetch_timeout: Duration,
    /// Zero disables the limit.
    pub key_min_refresh_interval: Duration,
}

impl AuthConfig {
    /// Build with defaults for everything but issuer, key path and roles.
    pub fn new(
        issuer: impl Into<String>,
        key_store_path: impl Into<String>,
        group_roles: GroupRoleMapping,
    ) -> Result<Self, ConfigError> {
        let issuer = issuer.into();
        let key_store_path = key_store_path.into();
        if issuer.trim().is_empty() {
            return Err(ConfigError::Empty(AUTH_ISSUER_ENV));
        }
        if key_store_path.trim().is_empty() {
            return Err(ConfigError::Empty(AUTH_KEY_STORE_PATH_ENV));
        }

        let url = format!("{issuer}{key_store_path}");
        let jwks_url = Url::parse(&url).map_err(|e| ConfigError::InvalidKeyStoreUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            issuer,
            key_store_path,
            jwks_url,
            algorithm: Algorithm::RS256,
            group_claim: DEFAULT_GROUP_CLAIM.to_string(),
            group_roles,
            key_fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            key_min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// Read `LOG_FORMAT`. Anything but `json` means pretty.
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| match lookup(name) {
            None => Err(ConfigError::Missing(name)),
            Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(name)),
            Some(value) => Ok(value.trim().to_string()),
        };
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let issuer = required(AUTH_ISSUER_ENV)?;
        let key_store_path = required(AUTH_KEY_STORE_PATH_ENV)?;

        let roles = parse_group_roles(optional(AUTH_GROUP_ROLES_ENV).as_deref().unwrap_or(""))?;
        let precedence =
            parse_precedence(optional(AUTH_GROUP_PRECEDENCE_ENV).as_deref().unwrap_or(""), &roles)?;
        let group_roles = GroupRoleMapping::new(roles).with_precedence(precedence);

        let mut auth = AuthConfig::new(issuer, key_store_path, group_roles)?;
        if let Some(claim) = optional(AUTH_GROUP_CLAIM_ENV) {
            auth.group_claim = claim.trim().to_string();
        }
        if let Some(algorithm) = optional(AUTH_SIGNING_ALGORITHM_ENV) {
            auth.algorithm = parse_algorithm(algorithm.trim())?;
        }
        if let Some(secs) = optional(AUTH_KEY_FETCH_TIMEOUT_ENV) {
            let secs: u64 = parse_number(AUTH_KEY_FETCH_TIMEOUT_ENV, &secs)?;
            if secs == 0 {
                return Err(ConfigError::Zero(AUTH_KEY_FETCH_TIMEOUT_ENV));
            }
            auth.key_fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = optional(AUTH_KEY_MIN_REFRESH_ENV) {
            auth.key_min_refresh_interval =
                Duration::from_secs(parse_number(AUTH_KEY_MIN_REFRESH_ENV, &secs)?);
        }

        let port = match optional(PORT_ENV) {
            Some(port) => parse_number(PORT_ENV, &port)?,
            None => DEFAULT_PORT,
        };
        let tls = match (optional(TLS_CERT_PATH_ENV), optional(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteTls),
        };
        let server = ServerConfig {
            host: optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            tls,
        };

        Ok(Self { server, auth })
    }
}

/// Parse `admins=ROLE_ADMIN, students=ROLE_STUDENT`.
fn parse_group_roles(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut roles = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (group, role) = entry
            .split_once('=')
            .map(|(g, r)| (g.trim(), r.trim()))
            .filter(|(g, r)| !g.is_empty() && !r.is_empty())
            .ok_or_else(|| ConfigError::InvalidMapping {
                var: AUTH_GROUP_ROLES_ENV,
                entry: entry.to_string(),
            })?;
        if roles.insert(group.to_string(), role.to_string()).is_some() {
            return Err(ConfigError::DuplicateGroup {
                var: AUTH_GROUP_ROLES_ENV,
                group: group.to_string(),
            });
        }
    }
    Ok(roles)
}

fn parse_precedence(
    raw: &str,
    roles: &HashMap<String, String>,
) -> Result<Vec<String>, ConfigError> {
    let mut precedence: Vec<String> = Vec::new();
    for group in raw.split(',').map(str::trim).filter(|g| !g.is_empty()) {
        if !roles.contains_key(group) {
            return Err(ConfigError::UnknownPrecedenceGroup(group.to_string()));
        }
        if precedence.iter().any(|g| g == group) {
            return Err(ConfigError::DuplicateGroup {
                var: AUTH_GROUP_PRECEDENCE_ENV,
                group: group.to_string(),
            });
        }
        precedence.push(group.to_string());
    }
    Ok(precedence)
}

fn parse_algorithm(raw: &str) -> Result<Algorithm, ConfigError> {
    match raw.parse::<Algorithm>() {
        Ok(Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) | Err(_) => {
            Err(ConfigError::UnsupportedAlgorithm(raw.to_string()))
        }
        Ok(algorithm) => Ok(algorithm),
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}
