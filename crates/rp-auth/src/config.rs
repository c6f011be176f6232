//! Callback configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [callback]
//! server_uri = "https://rp.example"
//! route_prefix = "/api/oidc/rp"
//! request_timeout = "10s"
//!
//! [[callback.clients]]
//! issuer = "https://idp.example"
//! client_id = "rp-client"
//! client_secret = "s3cret"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::registry::RpClient;
use crate::validator::OidcValidatorConfig;

/// Configuration of the callback endpoint and the OIDC validator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// This relying party's public base URI.
    /// Redirect URIs must lie under it.
    pub server_uri: String,

    /// Path prefix of the callback route, e.g. `/api/oidc/rp`.
    pub route_prefix: String,

    /// Name of the cookie carrying the session id.
    pub session_cookie_name: String,

    /// HTTP timeout for discovery, JWKS and token requests.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Leeway applied to `exp` when validating ID tokens.
    #[serde(with = "humantime_serde")]
    pub clock_skew_tolerance: Duration,

    /// Allow plain-http issuers. Testing only.
    pub allow_http: bool,

    /// How long discovery documents are cached.
    #[serde(with = "humantime_serde")]
    pub discovery_ttl: Duration,

    /// JWKS TTL when the provider sends no `max-age`.
    #[serde(with = "humantime_serde")]
    pub jwks_default_ttl: Duration,

    /// Lower bound on the JWKS TTL.
    #[serde(with = "humantime_serde")]
    pub jwks_min_ttl: Duration,

    /// Upper bound on the JWKS TTL.
    #[serde(with = "humantime_serde")]
    pub jwks_max_ttl: Duration,

    /// How long redeemed authorization codes are remembered.
    #[serde(with = "humantime_serde")]
    pub consumed_code_ttl: Duration,

    /// Claim consulted before `sub` when resolving the user's WebID.
    pub user_id_claim: String,

    /// Static client registrations.
    pub clients: Vec<RpClient>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            server_uri: "http://localhost:8443".to_string(),
            route_prefix: "/api/oidc/rp".to_string(),
            session_cookie_name: "rp.sid".to_string(),
            request_timeout: Duration::from_secs(30),
            clock_skew_tolerance: Duration::from_secs(60),
            allow_http: false,
            discovery_ttl: Duration::from_secs(3600),
            jwks_default_ttl: Duration::from_secs(3600),
            jwks_min_ttl: Duration::from_secs(300), // 5 minutes
            jwks_max_ttl: Duration::from_secs(86400), // 24 hours
            consumed_code_ttl: Duration::from_secs(600), // 10 minutes
            user_id_claim: "webid".to_string(),
            clients: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl CallbackConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `server_uri` or the cookie name is
    /// empty, and `ConfigError::InvalidValue` if:
    /// - `server_uri` is not an absolute URL
    /// - `route_prefix` does not start with `/` or ends with `/`
    /// - a timeout is zero
    /// - `jwks_min_ttl` exceeds `jwks_max_ttl`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_uri.trim().is_empty() {
            return Err(ConfigError::Missing("server_uri".to_string()));
        }
        self.server_url()?;

        if !self.route_prefix.starts_with('/') || self.route_prefix.ends_with('/') {
            return Err(ConfigError::InvalidValue(format!(
                "route_prefix '{}' must start with '/' and must not end with '/'",
                self.route_prefix
            )));
        }

        if self.session_cookie_name.trim().is_empty() {
            return Err(ConfigError::Missing("session_cookie_name".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }

        if self.consumed_code_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "consumed_code_ttl must be > 0".to_string(),
            ));
        }

        if self.discovery_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "discovery_ttl must be > 0".to_string(),
            ));
        }

        if self.jwks_min_ttl > self.jwks_max_ttl {
            return Err(ConfigError::InvalidValue(format!(
                "jwks_min_ttl ({:?}) must not exceed jwks_max_ttl ({:?})",
                self.jwks_min_ttl, self.jwks_max_ttl
            )));
        }

        if self.user_id_claim.trim().is_empty() {
            return Err(ConfigError::Missing("user_id_claim".to_string()));
        }

        Ok(())
    }

    /// Parses `server_uri`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if it is not an absolute URL.
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.server_uri).map_err(|e| {
            ConfigError::InvalidValue(format!("server_uri '{}': {e}", self.server_uri))
        })
    }

    /// Returns the validator settings derived from this configuration.
    #[must_use]
    pub fn validator_config(&self) -> OidcValidatorConfig {
        OidcValidatorConfig {
            request_timeout: self.request_timeout,
            clock_skew_tolerance: self.clock_skew_tolerance,
            allow_http: self.allow_http,
            discovery_ttl: self.discovery_ttl,
            jwks_default_ttl: self.jwks_default_ttl,
            jwks_min_ttl: self.jwks_min_ttl,
            jwks_max_ttl: self.jwks_max_ttl,
            consumed_code_ttl: self.consumed_code_ttl,
            ..OidcValidatorConfig::default()
        }
    }
}

pub mod loader {
    //! Layered loading: optional TOML file, then `RP_AUTH__*` environment
    //! overrides (e.g. `RP_AUTH__CALLBACK__SERVER_URI`).

    use std::path::Path;

    use config::{Config, Environment, File};
    use serde::Deserialize;

    use super::{CallbackConfig, ConfigError};

    /// Default configuration file looked up when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "rp-auth.toml";

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Settings {
        callback: CallbackConfig,
    }

    /// Loads and validates the `[callback]` section.
    ///
    /// A missing file is not an error; defaults and environment overrides
    /// still apply.
    pub fn load_config(path: Option<&Path>) -> Result<CallbackConfig, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut builder = Config::builder();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix("RP_AUTH")
                .try_parsing(true)
                .separator("__"),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.callback.validate()?;

        tracing::debug!(
            server_uri = %settings.callback.server_uri,
            clients = settings.callback.clients.len(),
            "Loaded callback configuration"
        );
        Ok(settings.callback)
    }
}
