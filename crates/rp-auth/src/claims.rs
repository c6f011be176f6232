//! Mapping of verified ID token claims to a user identifier.

use url::Url;

use crate::validator::IdTokenClaims;

/// Derives the stable user identifier stored in the session.
pub trait ClaimsMapper: Send + Sync {
    /// Returns the user id for `claims`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError`] if the claims carry no acceptable identifier.
    fn user_id(&self, claims: &IdTokenClaims) -> Result<String, ClaimsError>;
}

/// Error type for claims mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimsError {
    /// The subject claim is empty.
    #[error("ID token has an empty subject")]
    EmptySubject,

    /// Neither the configured claim nor `sub` holds a WebID.
    #[error("No WebID found in claim '{claim}' or 'sub'")]
    NoWebId {
        /// The claim consulted first.
        claim: String,
    },
}

/// Returns the `sub` claim unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubjectClaimsMapper;

impl ClaimsMapper for SubjectClaimsMapper {
    fn user_id(&self, claims: &IdTokenClaims) -> Result<String, ClaimsError> {
        if claims.sub.trim().is_empty() {
            return Err(ClaimsError::EmptySubject);
        }
        Ok(claims.sub.clone())
    }
}

/// Resolves a WebID: the configured claim if it holds an http(s) URL,
/// otherwise `sub` if that does.
#[derive(Debug, Clone)]
pub struct WebIdClaimsMapper {
    claim: String,
}

impl WebIdClaimsMapper {
    /// Creates a mapper that consults `claim` before `sub`.
    #[must_use]
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
        }
    }
}

impl Default for WebIdClaimsMapper {
    fn default() -> Self {
        Self::new("webid")
    }
}

impl ClaimsMapper for WebIdClaimsMapper {
    fn user_id(&self, claims: &IdTokenClaims) -> Result<String, ClaimsError> {
        [claims.string_claim(&self.claim), Some(claims.sub.as_str())]
            .into_iter()
            .flatten()
            .find(|value| is_web_url(value))
            .map(str::to_string)
            .ok_or_else(|| ClaimsError::NoWebId {
                claim: self.claim.clone(),
            })
    }
}

fn is_web_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn claims(sub: &str, webid: Option<&str>) -> IdTokenClaims {
        let mut extra = HashMap::new();
        if let Some(webid) = webid {
            extra.insert("webid".to_string(), serde_json::json!(webid));
        }

        IdTokenClaims {
            iss: "https://idp.example".to_string(),
            sub: sub.to_string(),
            aud: vec!["client-1".to_string()],
            exp: 0,
            iat: 0,
            nonce: None,
            azp: None,
            auth_time: None,
            extra,
        }
    }

    #[test]
    fn test_webid_claim_wins() {
        let mapper = WebIdClaimsMapper::default();
        let id = mapper
            .user_id(&claims(
                "https://sub.example/#me",
                Some("https://alice.example/card#me"),
            ))
            .unwrap();
        assert_eq!(id, "https://alice.example/card#me");
    }

    #[test]
    fn test_falls_back_to_sub() {
        let mapper = WebIdClaimsMapper::default();
        let id = mapper
            .user_id(&claims("https://alice.example/card#me", Some("not a url")))
            .unwrap();
        assert_eq!(id, "https://alice.example/card#me");
    }

    #[test]
    fn test_no_webid() {
        let mapper = WebIdClaimsMapper::new("profile");
        let err = mapper.user_id(&claims("user-123", None)).unwrap_err();
        assert_eq!(
            err,
            ClaimsError::NoWebId {
                claim: "profile".to_string()
            }
        );

        assert!(mapper.user_id(&claims("urn:uuid:1234", None)).is_err());
    }

    #[test]
    fn test_subject_mapper() {
        assert_eq!(
            SubjectClaimsMapper.user_id(&claims("user-123", None)).unwrap(),
            "user-123"
        );
        assert_eq!(
            SubjectClaimsMapper.user_id(&claims(" ", None)).unwrap_err(),
            ClaimsError::EmptySubject
        );
    }
}
