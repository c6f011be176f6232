//! User session state touched by the callback.
//!
//! The session is owned by an external [`SessionStore`]; the callback only
//! reads and mutates fields of an existing session.

mod store;

pub use store::{InMemorySessionStore, SessionStore, SessionStoreError};

use serde::{Deserialize, Serialize};

/// Authorization request state written by the initiation step and consumed
/// by the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// Issuer the user was sent to.
    pub issuer: String,

    /// The OAuth `state` parameter sent with the authorization request.
    pub state: String,

    /// The OIDC nonce sent with the authorization request.
    pub nonce: String,

    /// The PKCE code verifier, if PKCE was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

impl PendingAuthorization {
    /// Creates pending authorization state without PKCE.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        state: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            state: state.into(),
            nonce: nonce.into(),
            code_verifier: None,
        }
    }

    /// Sets the PKCE code verifier.
    #[must_use]
    pub fn with_code_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(verifier.into());
        self
    }
}

/// A server-side user session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Where to send the user once authentication completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to_url: Option<String>,

    /// State of the authorization request in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingAuthorization>,

    /// Access token issued by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Refresh token issued by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Raw ID token issued by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Issuer that authenticated the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Stable identifier (WebID or subject) of the authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Set once identity and tokens are in place.
    #[serde(default)]
    pub identified: bool,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the URL to resume after authentication.
    #[must_use]
    pub fn with_return_to_url(mut self, url: impl Into<String>) -> Self {
        self.return_to_url = Some(url.into());
        self
    }

    /// Sets the pending authorization state.
    #[must_use]
    pub fn with_pending(mut self, pending: PendingAuthorization) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Returns `true` if the session carries a fully bound identity.
    ///
    /// Tokens and the user id are checked as well as the flag, so a session
    /// edited by hand into an inconsistent state is not treated as
    /// authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identified
            && self.user_id.is_some()
            && self.access_token.is_some()
            && self.refresh_token.is_some()
    }

    /// Removes and returns the pending return URL.
    pub fn take_return_to_url(&mut self) -> Option<String> {
        self.return_to_url.take()
    }
}
