//! OpenID Connect discovery with per-issuer caching.
//!
//! Provider metadata is fetched from `{issuer}/.well-known/openid-configuration`
//! and kept for a configurable TTL. The `issuer` value in the document must be
//! identical to the issuer it was fetched for (OIDC Discovery 1.0, section 4.3).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use super::fetch::{FetchError, cache_key, ensure_scheme, fetch_json};

/// Provider metadata used by the callback.
///
/// Only the fields the code exchange and ID token validation rely on are
/// modeled; unknown members are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// URL that the OP asserts as its Issuer Identifier.
    pub issuer: String,

    /// URL of the OP's Authorization Endpoint.
    pub authorization_endpoint: String,

    /// URL of the OP's Token Endpoint.
    pub token_endpoint: String,

    /// URL of the OP's JSON Web Key Set document.
    pub jwks_uri: String,

    /// URL of the OP's UserInfo Endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    /// JWS algorithms the OP may use to sign ID tokens.
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// PKCE code challenge methods supported by the OP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,
}

/// Configuration for the discovery cache.
#[derive(Debug, Clone)]
pub struct DiscoveryCacheConfig {
    /// Time-to-live for cached documents (default: 1 hour).
    pub ttl: Duration,

    /// Maximum response size in bytes (default: 1 MB).
    pub max_response_size: usize,

    /// Whether to allow HTTP (non-HTTPS) issuer URLs. Testing only.
    pub allow_http: bool,
}

impl Default for DiscoveryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_response_size: 1024 * 1024,
            allow_http: false,
        }
    }
}

impl DiscoveryCacheConfig {
    /// Sets the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Allows HTTP (non-HTTPS) issuer URLs.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// Errors that can occur during OIDC discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The document could not be fetched or decoded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The issuer inside the document is not a valid URL.
    #[error("Invalid issuer URL: {0}")]
    InvalidIssuer(String),

    /// The issuer inside the document does not match the expected issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The issuer the document was fetched for.
        expected: String,
        /// The issuer stated by the document.
        actual: String,
    },
}

struct CachedMetadata {
    metadata: ProviderMetadata,
    fetched_at: Instant,
}

/// Per-issuer cache of provider metadata.
pub struct DiscoveryCache {
    http_client: reqwest::Client,
    entries: RwLock<HashMap<String, CachedMetadata>>,
    config: DiscoveryCacheConfig,
}

impl DiscoveryCache {
    /// Creates a cache that fetches through `http_client`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: DiscoveryCacheConfig) -> Self {
        Self {
            http_client,
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Returns the metadata for `issuer`, fetching it on a miss or after expiry.
    pub async fn get(&self, issuer: &Url) -> Result<ProviderMetadata, DiscoveryError> {
        let key = cache_key(issuer);

        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(&key)
                && cached.fetched_at.elapsed() < self.config.ttl
            {
                tracing::trace!(%issuer, "Discovery cache hit");
                return Ok(cached.metadata.clone());
            }
        }

        let metadata = self.discover(issuer).await?;

        self.entries.write().await.insert(
            key,
            CachedMetadata {
                metadata: metadata.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(metadata)
    }

    /// Drops the cached metadata for `issuer`.
    pub async fn invalidate(&self, issuer: &Url) {
        self.entries.write().await.remove(&cache_key(issuer));
        tracing::debug!(%issuer, "Invalidated discovery cache entry");
    }

    /// Removes expired entries.
    pub async fn cleanup(&self) {
        let ttl = self.config.ttl;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.fetched_at.elapsed() < ttl);

        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Cleaned up expired discovery cache entries");
        }
    }

    /// Returns the number of cached documents.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn discover(&self, issuer: &Url) -> Result<ProviderMetadata, DiscoveryError> {
        ensure_scheme(issuer, self.config.allow_http)?;

        let url = discovery_url(issuer);
        tracing::debug!(%issuer, "Fetching OIDC discovery document");

        let (metadata, _): (ProviderMetadata, _) =
            fetch_json(&self.http_client, &url, self.config.max_response_size).await?;

        check_issuer(&metadata, issuer)?;
        Ok(metadata)
    }
}

/// Builds `{issuer}/.well-known/openid-configuration`, keeping any issuer path.
fn discovery_url(issuer: &Url) -> Url {
    let mut url = issuer.clone();
    let path = issuer.path().trim_end_matches('/');
    url.set_path(&format!("{path}/.well-known/openid-configuration"));
    url.set_query(None);
    url
}

fn check_issuer(metadata: &ProviderMetadata, expected: &Url) -> Result<(), DiscoveryError> {
    let stated = Url::parse(&metadata.issuer)
        .map_err(|e| DiscoveryError::InvalidIssuer(format!("{}: {e}", metadata.issuer)))?;

    let expected = cache_key(expected);
    let actual = cache_key(&stated);
    if expected != actual {
        return Err(DiscoveryError::IssuerMismatch { expected, actual });
    }

    Ok(())
}
