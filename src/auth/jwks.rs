// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key ring: signing keys fetched from the issuer's JWKS endpoint.
//!
//! ## Behaviour
//!
//! - Keys are cached by `kid` for the process lifetime
//! - A `kid` miss triggers a fetch of the whole key set, which replaces the
//!   cache wholesale; a failed fetch leaves the previous set in place
//! - Concurrent misses share a single in-flight fetch and all observe its
//!   outcome
//! - The fetch runs on its own task, so a cancelled request never strands
//!   the callers waiting on it
//! - Misses start at most one fetch per minimum refresh interval; inside the
//!   interval an unknown `kid` is rejected without a fetch
//!
//! Construct one `KeyRing` at startup and share clones of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{broadcast, Mutex, RwLock};

use super::error::AuthError;

/// Default timeout for a key set fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default minimum time between fetches started by cache misses.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Verification key resolved from the key set.
#[derive(Clone)]
pub struct SigningKey {
    key_id: String,
    algorithm: Algorithm,
    decoding_key: DecodingKey,
}

impl SigningKey {
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// The only algorithm a token verified with this key may declare.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Outcome of one fetch, shared with every caller waiting on it.
type FetchOutcome = Result<usize, AuthError>;

/// Fetch bookkeeping, guarded by one lock.
#[derive(Default)]
struct FetchSlot {
    /// Sender for the fetch currently in flight, if any
    sender: Option<broadcast::Sender<FetchOutcome>>,
    /// When the last fetch was started, successful or not
    last_started: Option<Instant>,
}

/// Raw key set. Entries are parsed one by one so a single unsupported key
/// does not make the whole set unusable.
#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<serde_json::Value>,
}

/// Process-wide cache of signing keys with single-flight refresh.
#[derive(Clone)]
pub struct KeyRing {
    /// Key set URL (issuer + key store path)
    jwks_url: String,
    /// Algorithm every accepted key must use
    algorithm: Algorithm,
    /// Cached keys by `kid`
    keys: Arc<RwLock<HashMap<String, Arc<SigningKey>>>>,
    /// Number of successful fetches so far
    generation: Arc<AtomicU64>,
    in_flight: Arc<Mutex<FetchSlot>>,
    /// Minimum time between miss-triggered fetches
    min_refresh_interval: Duration,
    /// HTTP client
    client: reqwest::Client,
}

impl KeyRing {
    /// Create a key ring for the given key set URL.
    ///
    /// No fetch happens here; call [`KeyRing::warm`] once the runtime is up.
    /// Misses are not rate limited until
    /// [`KeyRing::with_min_refresh_interval`] sets an interval.
    pub fn new(
        jwks_url: impl Into<String>,
        algorithm: Algorithm,
        fetch_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .connect_timeout(fetch_timeout)
            .build()?;

        Ok(Self {
            jwks_url: jwks_url.into(),
            algorithm,
            keys: Arc::new(RwLock::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(FetchSlot::default())),
            min_refresh_interval: Duration::ZERO,
            client,
        })
    }

    /// Limit how often cache misses may start a fetch.
    ///
    /// [`KeyRing::refresh`] is not limited.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Get the key set URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Resolve a key identifier, fetching the key set on a cache miss.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        let seen = self.generation.load(Ordering::Acquire);
        if let Some(key) = self.cached(kid).await {
            return Ok(key);
        }

        self.coalesced_fetch(Some(seen)).await?;

        self.cached(kid)
            .await
            .ok_or_else(|| AuthError::UnknownKeyId(kid.to_string()))
    }

    /// Force a fetch, joining one already in flight.
    ///
    /// Returns the number of usable keys now cached.
    pub async fn refresh(&self) -> Result<usize, AuthError> {
        self.coalesced_fetch(None).await
    }

    /// Best-effort fetch at startup. Failure is logged, never fatal.
    pub async fn warm(&self) {
        match self.refresh().await {
            Ok(count) => {
                tracing::info!(jwks_url = %self.jwks_url, key_count = count, "Signing keys cached")
            }
            Err(e) => tracing::warn!(
                jwks_url = %self.jwks_url,
                error = %e,
                "Failed to fetch signing keys at startup (will retry on first token)"
            ),
        }
    }

    /// Check if any keys are currently cached.
    pub async fn is_loaded(&self) -> bool {
        !self.keys.read().await.is_empty()
    }

    /// Number of cached keys.
    pub async fn len(&self) -> usize {
        self.keys.read().await.len()
    }

    async fn cached(&self, kid: &str) -> Option<Arc<SigningKey>> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Join the in-flight fetch or start one.
    ///
    /// With `seen` set (a cache miss), no fetch is started when a successful
    /// fetch completed after the caller last looked at the cache, or when the
    /// last fetch started less than the minimum refresh interval ago. The
    /// caller re-checks the cache instead.
    async fn coalesced_fetch(&self, seen: Option<u64>) -> FetchOutcome {
        let mut rx = {
            let mut slot = self.in_flight.lock().await;
            match slot.sender.as_ref() {
                Some(tx) => tx.subscribe(),
                None => {
                    if let Some(seen) = seen {
                        if self.generation.load(Ordering::Acquire) != seen {
                            return Ok(self.len().await);
                        }
                        if let Some(started) = slot.last_started {
                            if started.elapsed() < self.min_refresh_interval {
                                tracing::debug!(
                                    jwks_url = %self.jwks_url,
                                    "Key set fetched recently; not refetching on miss"
                                );
                                return Ok(self.len().await);
                            }
                        }
                    }
                    let (tx, rx) = broadcast::channel(1);
                    slot.sender = Some(tx);
                    slot.last_started = Some(Instant::now());
                    let ring = self.clone();
                    tokio::spawn(async move { ring.run_fetch().await });
                    rx
                }
            }
        };

        rx.recv().await.unwrap_or_else(|_| {
            Err(AuthError::KeySourceUnavailable(
                "key set fetch was abandoned".to_string(),
            ))
        })
    }

    async fn run_fetch(&self) {
        let outcome = match self.fetch_keys().await {
            Ok(keys) => {
                let count = keys.len();
                *self.keys.write().await = keys;
                self.generation.fetch_add(1, Ordering::AcqRel);
                tracing::debug!(
                    jwks_url = %self.jwks_url,
                    key_count = count,
                    "Signing keys refreshed"
                );
                Ok(count)
            }
            Err(e) => Err(e),
        };

        let tx = self.in_flight.lock().await.sender.take();
        if let Some(tx) = tx {
            // No receivers left is fine: everyone who asked gave up.
            let _ = tx.send(outcome);
        }
    }

    /// Fetch the key set from the endpoint.
    async fn fetch_keys(&self) -> Result<HashMap<String, Arc<SigningKey>>, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeySourceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeySourceUnavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let raw: RawKeySet = response
            .json()
            .await
            .map_err(|e| AuthError::KeySourceUnavailable(e.to_string()))?;

        let mut keys = HashMap::with_capacity(raw.keys.len());
        for value in raw.keys {
            let jwk: Jwk = match serde_json::from_value(value) {
                Ok(jwk) => jwk,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unparseable JWKS entry");
                    continue;
                }
            };
            match signing_key_from_jwk(&jwk, self.algorithm) {
                Ok(key) => {
                    keys.insert(key.key_id.clone(), Arc::new(key));
                }
                Err(reason) => {
                    tracing::debug!(kid = ?jwk.common.key_id, reason, "Skipping JWKS entry");
                }
            }
        }

        Ok(keys)
    }
}

/// Convert a JWK to a signing key usable with `algorithm`.
fn signing_key_from_jwk(jwk: &Jwk, algorithm: Algorithm) -> Result<SigningKey, &'static str> {
    let key_id = jwk.common.key_id.clone().ok_or("missing kid")?;

    if matches!(
        jwk.common.public_key_use,
        Some(PublicKeyUse::Encryption) | Some(PublicKeyUse::Other(_))
    ) {
        return Err("not a signature key");
    }

    if let Some(declared) = jwk.common.key_algorithm {
        if key_algorithm(declared) != Some(algorithm) {
            return Err("algorithm does not match configured algorithm");
        }
    }

    let decoding_key = match (&jwk.algorithm, algorithm) {
        (
            AlgorithmParameters::RSA(rsa),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e).map_err(|_| "invalid RSA key")?,
        (AlgorithmParameters::EllipticCurve(ec), Algorithm::ES256 | Algorithm::ES384) => {
            DecodingKey::from_ec_components(&ec.x, &ec.y).map_err(|_| "invalid EC key")?
        }
        (AlgorithmParameters::OctetKeyPair(okp), Algorithm::EdDSA) => {
            DecodingKey::from_ed_components(&okp.x).map_err(|_| "invalid OKP key")?
        }
        _ => return Err("key type does not fit configured algorithm"),
    };

    Ok(SigningKey {
        key_id,
        algorithm,
        decoding_key,
    })
}

fn key_algorithm(alg: KeyAlgorithm) -> Option<Algorithm> {
    match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
