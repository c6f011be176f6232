//! Inbound callback request.

use url::Url;

use crate::error::CallbackError;
use crate::issuer::resolve_issuer;

/// One inbound redirect from an identity provider.
///
/// Built by the routing layer for each callback and dropped when the
/// pipeline finishes. The session it authenticates is referenced by id;
/// the session value itself is owned by the session store.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    /// The full redirect URI, including the provider-issued query parameters.
    pub request_uri: Url,

    /// The issuer path segment exactly as routed (still percent-encoded).
    pub issuer_param: Option<String>,

    /// This relying party's own base URI.
    pub server_uri: Url,

    /// Identifier of the session being authenticated.
    pub session_id: String,
}

impl CallbackRequest {
    /// Creates a new callback request.
    #[must_use]
    pub fn new(
        request_uri: Url,
        issuer_param: Option<String>,
        server_uri: Url,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            request_uri,
            issuer_param,
            server_uri,
            session_id: session_id.into(),
        }
    }

    /// Resolves and percent-decodes the issuer identifier.
    pub fn issuer_id(&self) -> Result<String, CallbackError> {
        resolve_issuer(self.issuer_param.as_deref())
    }

    /// Returns the first value of a query parameter on the redirect URI.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.request_uri
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Returns the redirect URI the provider was asked to call back,
    /// i.e. the request URI without query or fragment.
    #[must_use]
    pub fn redirect_uri(&self) -> Url {
        let mut uri = self.request_uri.clone();
        uri.set_query(None);
        uri.set_fragment(None);
        uri
    }
}
