//! OpenID Connect response validation.
//!
//! [`OidcResponseValidator`] checks the redirect against the pending
//! authorization in the session, redeems the code at the provider's token
//! endpoint, and verifies the returned ID token.
//!
//! # Checks, in order
//!
//! 1. OAuth `error` parameter on the redirect
//! 2. Pending authorization present, issued for this issuer, `state` matches
//! 3. Redirect URI lies under the relying party's server URI
//! 4. Code not presented before
//! 5. Token exchange (`authorization_code` grant, PKCE verifier if any)
//! 6. Refresh token present (configurable)
//! 7. ID token signature, `iss`, `aud`, `exp`, `nonce`
//!
//! Checks 1 to 4 need no network access.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Validation, decode_header};
use url::Url;

use super::ResponseValidator;
use super::consumed::ConsumedCodes;
use super::discovery::{DiscoveryCache, DiscoveryCacheConfig, ProviderMetadata};
use super::error::ValidationError;
use super::fetch::{ensure_scheme, read_bounded};
use super::jwks::{JwksCache, JwksCacheConfig};
use super::token::{AuthResponse, IdTokenClaims, OAuthErrorResponse, TokenParams};
use crate::registry::{RpClient, normalize_issuer};
use crate::request::CallbackRequest;
use crate::session::{PendingAuthorization, Session};

/// Configuration for [`OidcResponseValidator`].
#[derive(Debug, Clone)]
pub struct OidcValidatorConfig {
    /// HTTP request timeout (default: 30 seconds).
    pub request_timeout: Duration,

    /// Clock skew tolerance for token validation (default: 60 seconds).
    pub clock_skew_tolerance: Duration,

    /// Whether to allow HTTP endpoints (for testing only).
    pub allow_http: bool,

    /// Discovery cache TTL (default: 1 hour).
    pub discovery_ttl: Duration,

    /// JWKS cache TTL when the provider sends no `max-age` (default: 1 hour).
    pub jwks_default_ttl: Duration,

    /// Lower bound on the JWKS cache TTL (default: 5 minutes).
    pub jwks_min_ttl: Duration,

    /// Upper bound on the JWKS cache TTL (default: 24 hours).
    pub jwks_max_ttl: Duration,

    /// How long presented codes are remembered (default: 10 minutes).
    pub consumed_code_ttl: Duration,

    /// Largest accepted body from discovery, JWKS and token endpoints
    /// (default: 1 MiB).
    pub max_response_size: usize,

    /// Reject token responses without a refresh token (default: true).
    ///
    /// Only affects the validator on its own. [`CallbackPipeline`] refuses
    /// to bind a response without a refresh token either way.
    ///
    /// [`CallbackPipeline`]: crate::pipeline::CallbackPipeline
    pub require_refresh_token: bool,
}

impl Default for OidcValidatorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            clock_skew_tolerance: Duration::from_secs(60),
            allow_http: false,
            discovery_ttl: Duration::from_secs(3600),
            jwks_default_ttl: Duration::from_secs(3600),
            jwks_min_ttl: Duration::from_secs(300),
            jwks_max_ttl: Duration::from_secs(86400),
            consumed_code_ttl: Duration::from_secs(600),
            max_response_size: 1024 * 1024,
            require_refresh_token: true,
        }
    }
}

impl OidcValidatorConfig {
    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the clock skew tolerance for token validation.
    #[must_use]
    pub fn with_clock_skew_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_skew_tolerance = tolerance;
        self
    }

    /// Allows HTTP endpoints (for testing only).
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }

    /// Sets the largest accepted response body.
    #[must_use]
    pub fn with_max_response_size(mut self, max_size: usize) -> Self {
        self.max_response_size = max_size;
        self
    }

    /// Sets whether a refresh token is required.
    #[must_use]
    pub fn with_require_refresh_token(mut self, require: bool) -> Self {
        self.require_refresh_token = require;
        self
    }
}

/// Validator that performs the OIDC code exchange against the issuer.
pub struct OidcResponseValidator {
    discovery_cache: Arc<DiscoveryCache>,
    jwks_cache: Arc<JwksCache>,
    consumed_codes: ConsumedCodes,
    http_client: reqwest::Client,
    config: OidcValidatorConfig,
}

impl OidcResponseValidator {
    /// Creates a validator with its own HTTP client and caches.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OidcValidatorConfig) -> Result<Self, ValidationError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self::with_http_client(http_client, config))
    }

    /// Creates a validator that shares `http_client` between discovery, JWKS
    /// and token requests.
    #[must_use]
    pub fn with_http_client(http_client: reqwest::Client, config: OidcValidatorConfig) -> Self {
        let discovery_config = DiscoveryCacheConfig {
            max_response_size: config.max_response_size,
            ..DiscoveryCacheConfig::default()
        }
        .with_ttl(config.discovery_ttl)
        .with_allow_http(config.allow_http);

        let jwks_config = JwksCacheConfig {
            max_response_size: config.max_response_size,
            ..JwksCacheConfig::default()
        }
        .with_ttls(
            config.jwks_default_ttl,
            config.jwks_min_ttl,
            config.jwks_max_ttl,
        )
        .with_allow_http(config.allow_http);

        Self {
            discovery_cache: Arc::new(DiscoveryCache::new(http_client.clone(), discovery_config)),
            jwks_cache: Arc::new(JwksCache::new(http_client.clone(), jwks_config)),
            consumed_codes: ConsumedCodes::new(config.consumed_code_ttl),
            http_client,
            config,
        }
    }

    /// Returns the discovery cache.
    #[must_use]
    pub fn discovery_cache(&self) -> &Arc<DiscoveryCache> {
        &self.discovery_cache
    }

    /// Returns the JWKS cache.
    #[must_use]
    pub fn jwks_cache(&self) -> &Arc<JwksCache> {
        &self.jwks_cache
    }

    /// Checks everything about the redirect that needs no network access and
    /// returns the authorization code.
    fn check_redirect(
        &self,
        client: &RpClient,
        request: &CallbackRequest,
        pending: &PendingAuthorization,
    ) -> Result<String, ValidationError> {
        let started_with = normalize_issuer(&pending.issuer);
        let returned_from = client.issuer_key();
        if started_with != returned_from {
            return Err(ValidationError::IssuerMismatch {
                expected: started_with,
                actual: returned_from,
            });
        }

        let state = request
            .query_param("state")
            .ok_or_else(|| ValidationError::MissingParameter("state".to_string()))?;
        if state != pending.state {
            return Err(ValidationError::StateMismatch);
        }

        let code = request
            .query_param("code")
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ValidationError::MissingParameter("code".to_string()))?;

        let redirect_uri = request.redirect_uri();
        if !is_under(&redirect_uri, &request.server_uri) {
            return Err(ValidationError::RedirectMismatch(redirect_uri.to_string()));
        }

        Ok(code)
    }

    /// Fetches provider metadata unless the registration overrides every
    /// endpoint the exchange needs.
    async fn metadata(&self, client: &RpClient) -> Result<Option<ProviderMetadata>, ValidationError> {
        if client.token_endpoint.is_some() && client.jwks_uri.is_some() {
            return Ok(None);
        }
        Ok(Some(self.discovery_cache.get(&client.issuer).await?))
    }

    fn endpoint(
        &self,
        configured: Option<&String>,
        discovered: Option<&String>,
    ) -> Result<Url, ValidationError> {
        let raw = configured
            .or(discovered)
            .ok_or_else(|| ValidationError::TokenExchangeFailed("No endpoint available".to_string()))?;
        let url = Url::parse(raw)?;
        ensure_scheme(&url, self.config.allow_http)
            .map_err(|e| ValidationError::TokenExchangeFailed(e.to_string()))?;
        Ok(url)
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        client: &RpClient,
        token_endpoint: &Url,
        code: &str,
        redirect_uri: &Url,
        code_verifier: Option<&str>,
    ) -> Result<TokenParams, ValidationError> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", client.client_id.as_str()),
        ];

        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        if let Some(secret) = &client.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        tracing::debug!(%token_endpoint, "Exchanging authorization code");

        let response = self
            .http_client
            .post(token_endpoint.as_str())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = read_bounded(response, self.config.max_response_size)
            .await
            .map_err(|e| ValidationError::TokenExchangeFailed(e.to_string()))?;

        if !status.is_success() {
            if let Ok(oauth_error) = serde_json::from_slice::<OAuthErrorResponse>(&body) {
                return Err(ValidationError::TokenExchangeFailed(format!(
                    "{}: {}",
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default()
                )));
            }

            return Err(ValidationError::TokenExchangeFailed(format!("HTTP {status}")));
        }

        serde_json::from_slice(&body).map_err(|e| {
            ValidationError::TokenExchangeFailed(format!("Failed to parse token response: {e}"))
        })
    }

    /// Verifies an ID token and returns its claims.
    async fn validate_id_token(
        &self,
        client: &RpClient,
        jwks_uri: &Url,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<IdTokenClaims, ValidationError> {
        let header = decode_header(id_token)?;
        let keys = self
            .jwks_cache
            .keys_for(jwks_uri, header.kid.as_deref())
            .await?;

        let issuer = client.issuer_key();
        let issuers = [issuer.clone(), format!("{issuer}/")];

        let mut claims = None;
        for (key, key_alg) in &keys {
            let mut validation = Validation::new(key_alg.unwrap_or(header.alg));
            validation.set_audience(&[&client.client_id]);
            validation.set_issuer(&issuers);
            validation.leeway = self.config.clock_skew_tolerance.as_secs();

            match jsonwebtoken::decode::<IdTokenClaims>(id_token, key, &validation) {
                Ok(data) => {
                    claims = Some(data.claims);
                    break;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm
                    ) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let claims = claims.ok_or(ValidationError::InvalidSignature)?;

        if claims.nonce.as_deref() != Some(expected_nonce) {
            return Err(ValidationError::NonceMismatch);
        }

        tracing::debug!(issuer = %claims.iss, "Validated ID token");
        Ok(claims)
    }
}

#[async_trait]
impl ResponseValidator for OidcResponseValidator {
    async fn validate_response(
        &self,
        client: &RpClient,
        request: &CallbackRequest,
        session: &Session,
    ) -> Result<AuthResponse, ValidationError> {
        if let Some(error) = request.query_param("error") {
            let description = request.query_param("error_description").unwrap_or_default();
            return Err(ValidationError::provider(error, description));
        }

        let pending = session
            .pending
            .as_ref()
            .ok_or(ValidationError::NoPendingAuthorization)?;

        let code = self.check_redirect(client, request, pending)?;

        let issuer = client.issuer_key();
        if !self.consumed_codes.mark_used(&issuer, &code).await {
            tracing::warn!(%issuer, "Authorization code presented twice");
            return Err(ValidationError::CodeReused);
        }

        let metadata = self.metadata(client).await?;
        let token_endpoint = self.endpoint(
            client.token_endpoint.as_ref(),
            metadata.as_ref().map(|m| &m.token_endpoint),
        )?;
        let jwks_uri = self.endpoint(
            client.jwks_uri.as_ref(),
            metadata.as_ref().map(|m| &m.jwks_uri),
        )?;

        let token_params = self
            .exchange_code(
                client,
                &token_endpoint,
                &code,
                &request.redirect_uri(),
                pending.code_verifier.as_deref(),
            )
            .await?;

        if self.config.require_refresh_token && token_params.refresh_token.is_none() {
            return Err(ValidationError::MissingRefreshToken);
        }

        let id_token = token_params
            .id_token
            .as_deref()
            .ok_or(ValidationError::MissingIdToken)?;

        let claims = self
            .validate_id_token(client, &jwks_uri, id_token, &pending.nonce)
            .await?;

        Ok(AuthResponse {
            token_params,
            claims,
            issuer,
        })
    }
}

/// Returns `true` if `url` has the same origin as `base` and its path lies
/// at or below `base`'s path.
fn is_under(url: &Url, base: &Url) -> bool {
    if url.origin() != base.origin() {
        return false;
    }

    let prefix = base.path().trim_end_matches('/');
    let path = url.path();
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RpClient {
        RpClient::new(Url::parse("https://idp.example").unwrap(), "client-1")
            .with_token_endpoint("https://idp.example/token")
            .with_jwks_uri("https://idp.example/jwks")
    }

    fn request(query: &str) -> CallbackRequest {
        CallbackRequest::new(
            Url::parse(&format!(
                "https://rp.example/api/oidc/rp/https%3A%2F%2Fidp.example?{query}"
            ))
            .unwrap(),
            Some("https%3A%2F%2Fidp.example".to_string()),
            Url::parse("https://rp.example").unwrap(),
            "sid",
        )
    }

    fn session() -> Session {
        Session::new().with_pending(PendingAuthorization::new(
            "https://idp.example/",
            "state-1",
            "nonce-1",
        ))
    }

    fn validator() -> OidcResponseValidator {
        OidcResponseValidator::with_http_client(
            reqwest::Client::new(),
            OidcValidatorConfig::default(),
        )
    }

    #[test]
    fn test_is_under() {
        let base = Url::parse("https://rp.example/app/").unwrap();
        assert!(is_under(
            &Url::parse("https://rp.example/app/cb/x").unwrap(),
            &base
        ));
        assert!(is_under(&Url::parse("https://rp.example/app").unwrap(), &base));
        assert!(!is_under(
            &Url::parse("https://rp.example/application").unwrap(),
            &base
        ));
        assert!(!is_under(
            &Url::parse("https://evil.example/app/cb").unwrap(),
            &base
        ));
        assert!(!is_under(
            &Url::parse("http://rp.example/app/cb").unwrap(),
            &base
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = OidcValidatorConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.clock_skew_tolerance, Duration::from_secs(60));
        assert!(config.require_refresh_token);
        assert!(!config.allow_http);
    }

    #[tokio::test]
    async fn test_provider_error_short_circuits() {
        let err = validator()
            .validate_response(
                &client(),
                &request("error=access_denied&error_description=denied"),
                &session(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::Provider { ref error, .. } if error == "access_denied"));
    }

    #[tokio::test]
    async fn test_requires_pending_authorization() {
        let err = validator()
            .validate_response(&client(), &request("code=c&state=state-1"), &Session::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::NoPendingAuthorization));
    }

    #[tokio::test]
    async fn test_state_mismatch() {
        let err = validator()
            .validate_response(&client(), &request("code=c&state=forged"), &session())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::StateMismatch));
    }

    #[tokio::test]
    async fn test_missing_code() {
        let err = validator()
            .validate_response(&client(), &request("state=state-1"), &session())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingParameter(ref p) if p == "code"));
    }

    #[tokio::test]
    async fn test_pending_issuer_must_match_client() {
        let other = RpClient::new(Url::parse("https://other.example").unwrap(), "client-1");
        let err = validator()
            .validate_response(&other, &request("code=c&state=state-1"), &session())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::IssuerMismatch { .. }));
    }

    #[tokio::test]
    async fn test_redirect_outside_server_uri() {
        let mut req = request("code=c&state=state-1");
        req.server_uri = Url::parse("https://rp.example/other").unwrap();

        let err = validator()
            .validate_response(&client(), &req, &session())
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::RedirectMismatch(_)));
    }
}
