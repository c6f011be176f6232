//! Relying-party client registrations.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

/// The relying party's negotiated relationship with one issuer.
///
/// # Example
///
/// ```ignore
/// use rp_auth::registry::RpClient;
/// use url::Url;
///
/// let client = RpClient::new(Url::parse("https://idp.example")?, "client-123")
///     .with_client_secret("s3cret");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpClient {
    /// The OIDC issuer URL.
    pub issuer: Url,

    /// OAuth client ID registered with the issuer.
    pub client_id: String,

    /// OAuth client secret (None for public clients).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// When the registration stops being valid (`client_secret_expires_at`).
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at: Option<OffsetDateTime>,

    /// Optional override for the token endpoint.
    /// If not set, discovered from OIDC metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// Optional override for the JWKS URI.
    /// If not set, discovered from OIDC metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
}

impl RpClient {
    /// Creates a registration with the required fields.
    #[must_use]
    pub fn new(issuer: Url, client_id: impl Into<String>) -> Self {
        Self {
            issuer,
            client_id: client_id.into(),
            client_secret: None,
            expires_at: None,
            token_endpoint: None,
            jwks_uri: None,
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the registration expiry.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the token endpoint override.
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the JWKS URI override.
    #[must_use]
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Returns `true` if this is a confidential client (has a secret).
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_secret.is_some()
    }

    /// Returns `true` if the registration has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns the issuer without a trailing slash, as used for lookups and
    /// `iss` comparison.
    #[must_use]
    pub fn issuer_key(&self) -> String {
        normalize_issuer(self.issuer.as_str())
    }
}

/// Normalizes an issuer identifier for comparison.
///
/// URLs are canonicalized (lowercase scheme and host, default port dropped);
/// anything that does not parse is compared as given. A trailing slash is
/// ignored either way.
pub(crate) fn normalize_issuer(issuer: &str) -> String {
    let canonical = Url::parse(issuer)
        .map(String::from)
        .unwrap_or_else(|_| issuer.to_string());
    canonical.trim_end_matches('/').to_string()
}
