//! Response validation errors.

use jsonwebtoken::errors::ErrorKind;

use super::discovery::DiscoveryError;
use super::jwks::JwksError;

/// Reasons a callback's authorization response was rejected.
///
/// The callback collapses all of these into a single
/// `ResponseValidationFailed` failure, keeping this value as the source.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The provider redirected back with an OAuth error.
    #[error("Provider returned error: {error} - {description}")]
    Provider {
        /// OAuth error code.
        error: String,
        /// Human-readable description.
        description: String,
    },

    /// A required query parameter is absent from the redirect.
    #[error("Missing callback parameter: {0}")]
    MissingParameter(String),

    /// The session carries no authorization request to complete.
    #[error("No pending authorization request in session")]
    NoPendingAuthorization,

    /// The `state` parameter does not match the pending request.
    #[error("State mismatch")]
    StateMismatch,

    /// The callback arrived for a different issuer than the one the user was sent to.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// Issuer recorded when the request was started.
        expected: String,
        /// Issuer resolved from the callback.
        actual: String,
    },

    /// The redirect URI is not one this relying party serves.
    #[error("Redirect URI not under server URI: {0}")]
    RedirectMismatch(String),

    /// The authorization code was already presented.
    #[error("Authorization code has already been used")]
    CodeReused,

    /// Provider metadata could not be obtained.
    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Provider signing keys could not be obtained.
    #[error("JWKS error: {0}")]
    Jwks(#[from] JwksError),

    /// The token endpoint rejected the exchange or answered with garbage.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The token response has no refresh token.
    #[error("Token response did not include a refresh token")]
    MissingRefreshToken,

    /// The token response has no ID token.
    #[error("Token response did not include an ID token")]
    MissingIdToken,

    /// The ID token nonce does not match the pending request.
    #[error("Nonce mismatch")]
    NonceMismatch,

    /// The ID token issuer is not the client's issuer.
    #[error("ID token issuer mismatch")]
    TokenIssuerMismatch,

    /// The ID token audience does not contain the client id.
    #[error("ID token audience mismatch")]
    AudienceMismatch,

    /// The ID token has expired.
    #[error("ID token has expired")]
    TokenExpired,

    /// No key verifies the ID token signature.
    #[error("ID token signature invalid")]
    InvalidSignature,

    /// The ID token is malformed or fails another check.
    #[error("Invalid ID token: {0}")]
    InvalidToken(String),

    /// Talking to the provider failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A provider endpoint is not a valid URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ValidationError {
    /// Creates a `Provider` error.
    #[must_use]
    pub fn provider(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Provider {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns `true` if the redirect itself was unacceptable (bad state,
    /// replay, tampering), as opposed to a failure talking to the provider.
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::MissingParameter(_)
                | Self::NoPendingAuthorization
                | Self::StateMismatch
                | Self::IssuerMismatch { .. }
                | Self::RedirectMismatch(_)
                | Self::CodeReused
        )
    }

    /// Returns `true` if the ID token or token response failed verification.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(
            self,
            Self::MissingRefreshToken
                | Self::MissingIdToken
                | Self::NonceMismatch
                | Self::TokenIssuerMismatch
                | Self::AudienceMismatch
                | Self::TokenExpired
                | Self::InvalidSignature
                | Self::InvalidToken(_)
        )
    }

    /// Returns `true` if the provider could not be reached or misbehaved.
    #[must_use]
    pub fn is_external_error(&self) -> bool {
        matches!(
            self,
            Self::Discovery(_)
                | Self::Jwks(_)
                | Self::TokenExchangeFailed(_)
                | Self::Network(_)
                | Self::Url(_)
        )
    }
}

impl From<jsonwebtoken::errors::Error> for ValidationError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        match error.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::InvalidAudience => Self::AudienceMismatch,
            ErrorKind::InvalidIssuer => Self::TokenIssuerMismatch,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::InvalidToken(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_error_mapping() {
        let err: ValidationError = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature).into();
        assert!(matches!(err, ValidationError::TokenExpired));

        let err: ValidationError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidAudience).into();
        assert!(matches!(err, ValidationError::AudienceMismatch));

        let err: ValidationError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(err, ValidationError::InvalidToken(_)));
    }

    #[test]
    fn test_predicates() {
        assert!(ValidationError::CodeReused.is_request_error());
        assert!(!ValidationError::CodeReused.is_external_error());

        assert!(ValidationError::NonceMismatch.is_token_error());
        assert!(!ValidationError::NonceMismatch.is_request_error());

        let err = ValidationError::TokenExchangeFailed("HTTP 500".to_string());
        assert!(err.is_external_error());
        assert!(!err.is_token_error());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ValidationError::provider("access_denied", "User cancelled");
        assert_eq!(
            err.to_string(),
            "Provider returned error: access_denied - User cancelled"
        );
    }
}
