//! Issuer JWKS fetching and caching.
//!
//! Keys are cached per JWKS URI. The TTL follows the provider's
//! `Cache-Control: max-age`, clamped to configured bounds. An unknown `kid`
//! forces one refetch so key rotation at the issuer is picked up without
//! waiting for expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use reqwest::header::{CACHE_CONTROL, HeaderMap};
use tokio::sync::RwLock;
use url::Url;

use super::fetch::{FetchError, cache_key, ensure_scheme, fetch_json};

/// A verification key together with the algorithm its JWK declares.
pub type VerificationKey = (DecodingKey, Option<Algorithm>);

/// Configuration for the JWKS cache.
#[derive(Debug, Clone)]
pub struct JwksCacheConfig {
    /// TTL when the provider sends no `max-age` (default: 1 hour).
    pub default_ttl: Duration,

    /// Lower bound on the TTL (default: 5 minutes).
    pub min_ttl: Duration,

    /// Upper bound on the TTL (default: 24 hours).
    pub max_ttl: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Whether to allow HTTP (non-HTTPS) JWKS URIs. Testing only.
    pub allow_http: bool,
}

impl Default for JwksCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            min_ttl: Duration::from_secs(300),
            max_ttl: Duration::from_secs(86400),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

impl JwksCacheConfig {
    /// Sets the TTL bounds.
    #[must_use]
    pub fn with_ttls(mut self, default_ttl: Duration, min_ttl: Duration, max_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self.min_ttl = min_ttl;
        self.max_ttl = max_ttl;
        self
    }

    /// Allows HTTP (non-HTTPS) JWKS URIs.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Errors that can occur during JWKS operations.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// The key set could not be fetched or decoded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// No usable key carries the requested `kid`.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The key set contains no usable signing keys.
    #[error("No signing keys found in JWKS")]
    NoSigningKeys,
}

struct CachedKeys {
    keys: JwkSet,
    expires_at: Instant,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Per-URI cache of issuer signing keys.
pub struct JwksCache {
    http_client: reqwest::Client,
    entries: RwLock<HashMap<String, CachedKeys>>,
    config: JwksCacheConfig,
}

impl JwksCache {
    /// Creates a cache that fetches through `http_client`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: JwksCacheConfig) -> Self {
        Self {
            http_client,
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the verification keys to try for a token.
    ///
    /// With a `kid`, exactly the matching key is returned (refetching once on
    /// a miss). Without one, every signing key in the set is returned;
    /// encryption keys are skipped.
    pub async fn keys_for(
        &self,
        jwks_uri: &Url,
        kid: Option<&str>,
    ) -> Result<Vec<VerificationKey>, JwksError> {
        match kid {
            Some(kid) => {
                if let Some(key) = self.cached_key(jwks_uri, kid).await {
                    tracing::trace!(%jwks_uri, kid, "JWKS cache hit");
                    return Ok(vec![key]);
                }

                tracing::debug!(%jwks_uri, kid, "JWKS cache miss");
                self.refresh(jwks_uri).await?;

                self.cached_key(jwks_uri, kid)
                    .await
                    .map(|key| vec![key])
                    .ok_or_else(|| JwksError::KeyNotFound(kid.to_string()))
            }
            None => {
                if !self.is_cached(jwks_uri).await {
                    self.refresh(jwks_uri).await?;
                }

                let entries = self.entries.read().await;
                let keys: Vec<_> = entries
                    .get(&cache_key(jwks_uri))
                    .map(|cached| {
                        cached
                            .keys
                            .keys
                            .iter()
                            .filter(|jwk| is_signing_key(jwk))
                            .filter_map(verification_key)
                            .collect()
                    })
                    .unwrap_or_default();

                if keys.is_empty() {
                    Err(JwksError::NoSigningKeys)
                } else {
                    Ok(keys)
                }
            }
        }
    }

    /// Fetches the key set and replaces the cached entry.
    pub async fn refresh(&self, jwks_uri: &Url) -> Result<(), JwksError> {
        ensure_scheme(jwks_uri, self.config.allow_http)?;

        tracing::debug!(%jwks_uri, "Fetching JWKS");
        let (keys, headers): (JwkSet, _) =
            fetch_json(&self.http_client, jwks_uri, self.config.max_response_size).await?;

        let ttl = self.ttl_from_headers(&headers);
        tracing::debug!(%jwks_uri, keys = keys.keys.len(), ttl = ?ttl, "Cached JWKS");

        self.entries.write().await.insert(
            cache_key(jwks_uri),
            CachedKeys {
                keys,
                expires_at: Instant::now() + ttl,
            },
        );

        Ok(())
    }

    /// Drops the cached key set for `jwks_uri`.
    pub async fn invalidate(&self, jwks_uri: &Url) {
        self.entries.write().await.remove(&cache_key(jwks_uri));
    }

    /// Removes expired entries.
    pub async fn cleanup(&self) {
        self.entries.write().await.retain(|_, cached| cached.is_fresh());
    }

    /// Returns the number of cached key sets.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn is_cached(&self, jwks_uri: &Url) -> bool {
        self.entries
            .read()
            .await
            .get(&cache_key(jwks_uri))
            .is_some_and(CachedKeys::is_fresh)
    }

    async fn cached_key(&self, jwks_uri: &Url, kid: &str) -> Option<VerificationKey> {
        let entries = self.entries.read().await;
        let cached = entries.get(&cache_key(jwks_uri))?;
        if !cached.is_fresh() {
            return None;
        }

        cached
            .keys
            .keys
            .iter()
            .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
            .and_then(verification_key)
    }

    /// Reads `max-age` from `Cache-Control` and clamps it to the configured bounds.
    fn ttl_from_headers(&self, headers: &HeaderMap) -> Duration {
        headers
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| {
                value.split(',').find_map(|directive| {
                    directive
                        .trim()
                        .strip_prefix("max-age=")
                        .and_then(|secs| secs.parse::<u64>().ok())
                })
            })
            .map(Duration::from_secs)
            .unwrap_or(self.config.default_ttl)
            .clamp(self.config.min_ttl, self.config.max_ttl)
    }
}

fn is_signing_key(jwk: &Jwk) -> bool {
    !matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption))
}

fn verification_key(jwk: &Jwk) -> Option<VerificationKey> {
    DecodingKey::from_jwk(jwk)
        .ok()
        .map(|key| (key, jwk_algorithm(jwk)))
}

fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    match jwk.common.key_algorithm? {
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
