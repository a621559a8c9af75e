//! Cached RSA verification keys fetched from the identity provider's JWKS endpoint.
//!
//! The key set is held behind a single `RwLock`. Lookups that hit a fresh
//! cache only take the read lock. A miss or a stale set takes the write
//! lock and re-checks the state before fetching, so a burst of concurrent
//! misses produces one network call. Requests that queued behind a failed
//! attempt share its outcome instead of fetching again.
//!
//! # Security
//!
//! - Only `kty: RSA`, `use: sig` keys with an RS256/RS384/RS512 (or absent) `alg` are kept
//! - RSA moduli shorter than 2048 bits are rejected
//! - A failed refresh keeps the previous key set; it is never cleared by an outage
//!   and keys it contains are still served
//! - Unknown-kid refreshes are rate limited by `min_refresh_interval`

use crate::errors::AuthError;
use crate::http_client::{guarded, FetchError, HttpFetch, DEFAULT_HTTP_TIMEOUT_SECS};
use crate::observability::metrics;
use common::jwt::decode_rsa_public_key_jwk;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Default freshness window in seconds (5 minutes).
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum spacing between refreshes triggered by unknown key IDs.
pub const DEFAULT_MIN_REFRESH_INTERVAL_SECONDS: u64 = 5;

/// JSON Web Key as published by the identity provider.
///
/// Only the members needed for RSA signature keys are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for keys we accept).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Declared algorithm, if any.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (must be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url, unpadded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url, unpadded).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS document. Entries are kept as raw JSON so one malformed key
/// cannot fail the whole document.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// A decoded RSA verification key.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    alg: Option<Algorithm>,
    key: DecodingKey,
}

impl VerificationKey {
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm declared by the JWK, if it declared one.
    pub fn alg(&self) -> Option<Algorithm> {
        self.alg
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// Cached key set state. The key map is replaced in one assignment on every
/// successful refresh.
#[derive(Default)]
struct CachedKeySet {
    keys_by_id: HashMap<String, VerificationKey>,

    /// `None` until the first successful refresh.
    last_refreshed_at: Option<Instant>,

    /// Error of the most recent completed attempt, cleared on success.
    last_failure: Option<FetchError>,
}

impl CachedKeySet {
    fn is_fresh(&self, freshness_window: Duration, now: Instant) -> bool {
        self.last_refreshed_at
            .is_some_and(|at| now.saturating_duration_since(at) < freshness_window)
    }

    fn refreshed_within(&self, interval: Duration, now: Instant) -> bool {
        self.last_refreshed_at
            .is_some_and(|at| now.saturating_duration_since(at) < interval)
    }
}

/// Thread-safe cache of identity-provider signing keys.
pub struct KeySetCache {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// Injected HTTP capability.
    fetcher: Arc<dyn HttpFetch>,

    state: RwLock<CachedKeySet>,

    /// Refresh attempts that ran to completion, successful or not.
    /// Bumped while the write lock is held; read before any lock is taken.
    completed_attempts: AtomicU64,

    /// How long a fetched key set is served without re-fetching.
    freshness_window: Duration,

    /// Minimum spacing between refreshes caused by unknown key IDs.
    min_refresh_interval: Duration,

    /// Upper bound on one JWKS fetch.
    fetch_timeout: Duration,
}

impl KeySetCache {
    /// Create a cache with default freshness window and timeouts.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the identity provider's JWKS endpoint
    /// * `fetcher` - HTTP capability used for the fetch
    pub fn new(jwks_url: impl Into<String>, fetcher: Arc<dyn HttpFetch>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            fetcher,
            state: RwLock::new(CachedKeySet::default()),
            completed_attempts: AtomicU64::new(0),
            freshness_window: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECONDS),
            fetch_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Override how long a fetched key set stays fresh.
    #[must_use]
    pub fn with_ttl(mut self, freshness_window: Duration) -> Self {
        self.freshness_window = freshness_window;
        self
    }

    /// Override the minimum spacing between unknown-kid refreshes.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Override the per-fetch timeout.
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Look up a verification key by key ID, refreshing the set if needed.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyFetchFailure` if a required refresh failed or was cancelled
    ///   and the key ID is not in the retained set
    /// - `AuthError::KeyNotFound` if the key ID is absent after refresh
    #[instrument(skip(self, cancel), fields(kid = %kid))]
    pub async fn get_key(
        &self,
        kid: &str,
        cancel: &CancellationToken,
    ) -> Result<VerificationKey, AuthError> {
        let seen_attempts = self.completed_attempts.load(Ordering::Acquire);

        // Hot path: shared lock only
        {
            let state = self.state.read().await;
            if state.is_fresh(self.freshness_window, Instant::now()) {
                if let Some(key) = state.keys_by_id.get(kid) {
                    tracing::debug!(target: "auth.jwks", kid = %kid, "JWKS cache hit");
                    metrics::record_jwks_lookup("hit");
                    return Ok(key.clone());
                }
            }
        }

        metrics::record_jwks_lookup("miss");
        let refreshed = self.refresh_for(kid, seen_attempts, cancel).await;
        if matches!(refreshed, Err(AuthError::KeyFetchFailure(FetchError::Cancelled))) {
            return Err(AuthError::KeyFetchFailure(FetchError::Cancelled));
        }

        let state = self.state.read().await;
        if let Some(key) = state.keys_by_id.get(kid) {
            if let Err(e) = &refreshed {
                tracing::warn!(
                    target: "auth.jwks",
                    kid = %kid,
                    error = %e,
                    "JWKS refresh failed, serving retained key"
                );
            }
            return Ok(key.clone());
        }

        refreshed?;
        tracing::warn!(target: "auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(AuthError::KeyNotFound(kid.to_string()))
    }

    /// Refresh on behalf of a lookup for `kid`, unless another task already did
    /// or finished an attempt after `seen_attempts` was read.
    async fn refresh_for(
        &self,
        kid: &str,
        seen_attempts: u64,
        cancel: &CancellationToken,
    ) -> Result<(), AuthError> {
        let mut state = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(AuthError::KeyFetchFailure(FetchError::Cancelled));
            }
            guard = self.state.write() => guard,
        };

        // Double-check under the exclusive lock
        let now = Instant::now();
        if state.is_fresh(self.freshness_window, now)
            && (state.keys_by_id.contains_key(kid)
                || state.refreshed_within(self.min_refresh_interval, now))
        {
            tracing::debug!(target: "auth.jwks", kid = %kid, "JWKS refreshed by another request, skipping fetch");
            return Ok(());
        }

        // Another request attempted a refresh while this one waited; share its outcome
        if self.completed_attempts.load(Ordering::Acquire) != seen_attempts {
            tracing::debug!(target: "auth.jwks", kid = %kid, "JWKS refresh attempted by another request, skipping fetch");
            return match &state.last_failure {
                Some(e) => Err(AuthError::KeyFetchFailure(e.clone())),
                None => Ok(()),
            };
        }

        self.refresh_locked(&mut state, cancel).await.map(|_| ())
    }

    /// Fetch unconditionally and replace the key set.
    ///
    /// Returns the number of keys loaded.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetchFailure` if the fetch fails. The previous
    /// key set is kept.
    pub async fn force_refresh(&self) -> Result<usize, AuthError> {
        let cancel = CancellationToken::new();
        let mut state = self.state.write().await;
        self.refresh_locked(&mut state, &cancel).await
    }

    /// Number of keys currently cached.
    pub async fn key_count(&self) -> usize {
        self.state.read().await.keys_by_id.len()
    }

    async fn refresh_locked(
        &self,
        state: &mut RwLockWriteGuard<'_, CachedKeySet>,
        cancel: &CancellationToken,
    ) -> Result<usize, AuthError> {
        tracing::debug!(target: "auth.jwks", url = %self.jwks_url, "Fetching JWKS");
        let started = std::time::Instant::now();

        let keys_by_id = match self.fetch_key_set(cancel).await {
            Ok(keys) => keys,
            // The caller gave up; waiters make their own attempt
            Err(FetchError::Cancelled) => {
                return Err(AuthError::KeyFetchFailure(FetchError::Cancelled));
            }
            Err(e) => {
                tracing::error!(
                    target: "auth.jwks",
                    error = %e,
                    retained_keys = state.keys_by_id.len(),
                    "JWKS refresh failed, keeping previous key set"
                );
                metrics::record_jwks_refresh("error", started.elapsed());
                state.last_failure = Some(e.clone());
                self.completed_attempts.fetch_add(1, Ordering::Release);
                return Err(AuthError::KeyFetchFailure(e));
            }
        };

        let key_count = keys_by_id.len();
        state.keys_by_id = keys_by_id;
        state.last_refreshed_at = Some(Instant::now());
        state.last_failure = None;
        self.completed_attempts.fetch_add(1, Ordering::Release);

        tracing::info!(target: "auth.jwks", key_count = key_count, "JWKS cache refreshed");
        metrics::record_jwks_refresh("success", started.elapsed());
        metrics::set_jwks_keys_loaded(key_count);

        Ok(key_count)
    }

    async fn fetch_key_set(
        &self,
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, VerificationKey>, FetchError> {
        let response = guarded(self.fetcher.get(&self.jwks_url), self.fetch_timeout, cancel).await?;

        if response.status != 200 {
            return Err(FetchError::UnexpectedStatus(response.status));
        }

        let document: JwksDocument = serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::InvalidBody(e.to_string()))?;

        Ok(parse_key_set(document.keys))
    }
}

/// Decode every usable signing key; entries that do not qualify are skipped.
fn parse_key_set(entries: Vec<serde_json::Value>) -> HashMap<String, VerificationKey> {
    let mut keys = HashMap::new();

    for entry in entries {
        let jwk = match serde_json::from_value::<Jwk>(entry) {
            Ok(jwk) => jwk,
            Err(e) => {
                tracing::warn!(target: "auth.jwks", error = %e, "Skipping unparseable JWK");
                continue;
            }
        };

        match decode_verification_key(&jwk) {
            Ok(key) => {
                if keys.contains_key(&key.kid) {
                    tracing::warn!(target: "auth.jwks", kid = %key.kid, "Skipping duplicate JWK kid");
                    continue;
                }
                keys.insert(key.kid.clone(), key);
            }
            Err(reason) => {
                tracing::debug!(
                    target: "auth.jwks",
                    kid = jwk.kid.as_deref().unwrap_or(""),
                    kty = %jwk.kty,
                    reason = reason,
                    "Skipping JWK"
                );
            }
        }
    }

    keys
}

fn decode_verification_key(jwk: &Jwk) -> Result<VerificationKey, &'static str> {
    if jwk.kty != "RSA" {
        return Err("not an RSA key");
    }
    if jwk.key_use.as_deref() != Some("sig") {
        return Err("not a signing key");
    }

    let kid = jwk
        .kid
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or("missing kid")?;

    let alg = match jwk.alg.as_deref() {
        None => None,
        Some(name) => match Algorithm::from_str(name) {
            Ok(alg @ (Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512)) => Some(alg),
            _ => return Err("unsupported alg"),
        },
    };

    let n = jwk.n.as_deref().unwrap_or("");
    let e = jwk.e.as_deref().unwrap_or("");
    let components = decode_rsa_public_key_jwk(n, e).map_err(|err| {
        tracing::warn!(target: "auth.jwks", kid = %kid, error = %err, "Invalid RSA key material");
        "invalid key material"
    })?;

    Ok(VerificationKey {
        kid: kid.to_string(),
        alg,
        key: DecodingKey::from_rsa_raw_components(&components.modulus, &components.exponent),
    })
}
