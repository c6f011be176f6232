//! Token endpoint responses and ID token claims.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Token parameters returned by the provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenParams {
    /// The access token.
    pub access_token: String,

    /// The token type (usually "Bearer" or "DPoP").
    #[serde(default)]
    pub token_type: String,

    /// Token expiration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// The ID token (JWT).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// OAuth error response from the provider.
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// OIDC ID token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer identifier.
    pub iss: String,

    /// Subject identifier.
    pub sub: String,

    /// Audience (a string or an array on the wire).
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at time (Unix timestamp).
    #[serde(default)]
    pub iat: i64,

    /// Nonce value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Authorized party.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Time of authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Claims not modeled above, e.g. `webid`.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl IdTokenClaims {
    /// Returns a string-valued claim by name, including `sub` and `iss`.
    #[must_use]
    pub fn string_claim(&self, name: &str) -> Option<&str> {
        match name {
            "sub" => Some(&self.sub),
            "iss" => Some(&self.iss),
            _ => self.extra.get(name).and_then(serde_json::Value::as_str),
        }
    }
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}

/// The validated result of a code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    /// Token parameters from the token endpoint.
    pub token_params: TokenParams,

    /// Verified ID token claims.
    pub claims: IdTokenClaims,

    /// Issuer the exchange was performed against.
    pub issuer: String,
}

impl AuthResponse {
    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.token_params.access_token
    }

    /// Returns the refresh token, if one was issued.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.token_params.refresh_token.as_deref()
    }
}
