//! Token exchange and response validation.
//!
//! The callback depends only on the [`ResponseValidator`] trait.
//! [`OidcResponseValidator`] is the OpenID Connect implementation, built from
//! a discovery cache, a JWKS cache, and a ledger of consumed codes.

mod consumed;
mod discovery;
mod error;
mod exchange;
mod fetch;
mod jwks;
mod token;

pub use consumed::ConsumedCodes;
pub use discovery::{DiscoveryCache, DiscoveryCacheConfig, DiscoveryError, ProviderMetadata};
pub use error::ValidationError;
pub use exchange::{OidcResponseValidator, OidcValidatorConfig};
pub use fetch::FetchError;
pub use jwks::{JwksCache, JwksCacheConfig, JwksError, VerificationKey};
pub use token::{AuthResponse, IdTokenClaims, TokenParams};

use async_trait::async_trait;

use crate::registry::RpClient;
use crate::request::CallbackRequest;
use crate::session::Session;

/// Performs the code-for-token exchange and validates the result.
///
/// Implementations read the session (for the pending `state`, `nonce` and
/// PKCE verifier) but never modify it. Every failure is terminal for the
/// callback; a code is never retried.
#[async_trait]
pub trait ResponseValidator: Send + Sync {
    /// Exchanges the code carried by `request` and validates the response.
    ///
    /// # Errors
    ///
    /// Fails on provider errors, state or nonce mismatch, code reuse, token
    /// signature/issuer/audience/expiry failures, and network failures.
    async fn validate_response(
        &self,
        client: &RpClient,
        request: &CallbackRequest,
        session: &Session,
    ) -> Result<AuthResponse, ValidationError>;
}
