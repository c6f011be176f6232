//! Callback error types.
//!
//! Every stage of the callback pipeline fails into [`CallbackError`]. The
//! pipeline never recovers from one of these; the HTTP layer renders them
//! (see [`crate::http`]).

use std::fmt;

use crate::claims::ClaimsError;
use crate::registry::RegistryError;
use crate::session::SessionStoreError;
use crate::validator::ValidationError;

/// Errors that terminate a callback.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// The callback path did not carry an issuer identifier.
    #[error("Callback URL does not carry an issuer identifier")]
    MissingIssuer,

    /// No client registration exists for the claimed issuer.
    #[error("No client is registered for issuer: {issuer}")]
    UnknownIssuer {
        /// The resolved issuer identifier.
        issuer: String,
    },

    /// The client registry could not produce a usable registration.
    #[error("Client lookup failed for issuer {issuer}: {message}")]
    ClientLookupFailed {
        /// The resolved issuer identifier.
        issuer: String,
        /// Description of the lookup failure.
        message: String,
    },

    /// The code exchange or the validation of its result failed.
    #[error("Response validation failed for issuer {issuer}: {source}")]
    ResponseValidationFailed {
        /// The resolved issuer identifier.
        issuer: String,
        /// The underlying cause.
        #[source]
        source: ValidationError,
    },

    /// The validated claims did not yield a user identifier.
    #[error("Identity mapping failed: {message}")]
    IdentityMappingFailed {
        /// Description of the mapping failure.
        message: String,
    },

    /// The resume stage was reached with no pending workflow.
    #[error("Resume User Flow (failed)")]
    ResumeWithoutTarget,

    /// No session is associated with the callback request.
    #[error("No session is associated with this callback")]
    MissingSession,

    /// The session store failed.
    #[error("Session store error: {message}")]
    SessionStore {
        /// Description of the storage failure.
        message: String,
    },
}

impl CallbackError {
    /// Creates an `UnknownIssuer` error.
    #[must_use]
    pub fn unknown_issuer(issuer: impl Into<String>) -> Self {
        Self::UnknownIssuer {
            issuer: issuer.into(),
        }
    }

    /// Creates a `ClientLookupFailed` error.
    #[must_use]
    pub fn client_lookup_failed(issuer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientLookupFailed {
            issuer: issuer.into(),
            message: message.into(),
        }
    }

    /// Creates a `ResponseValidationFailed` error.
    #[must_use]
    pub fn response_validation_failed(issuer: impl Into<String>, source: ValidationError) -> Self {
        Self::ResponseValidationFailed {
            issuer: issuer.into(),
            source,
        }
    }

    /// Creates an `IdentityMappingFailed` error.
    #[must_use]
    pub fn identity_mapping_failed(message: impl Into<String>) -> Self {
        Self::IdentityMappingFailed {
            message: message.into(),
        }
    }

    /// Creates a `SessionStore` error.
    #[must_use]
    pub fn session_store(message: impl Into<String>) -> Self {
        Self::SessionStore {
            message: message.into(),
        }
    }

    /// Converts a registry failure for `issuer` into a callback error.
    #[must_use]
    pub fn from_registry(issuer: &str, error: RegistryError) -> Self {
        match error {
            RegistryError::NotRegistered => Self::unknown_issuer(issuer),
            other => Self::client_lookup_failed(issuer, other.to_string()),
        }
    }

    /// Returns `true` if the caller sent something we cannot act on (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingIssuer
                | Self::UnknownIssuer { .. }
                | Self::ResponseValidationFailed { .. }
                | Self::IdentityMappingFailed { .. }
                | Self::MissingSession
        )
    }

    /// Returns `true` if this is a server-side failure (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::ClientLookupFailed { .. } | Self::SessionStore { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingIssuer => ErrorCategory::Validation,
            Self::UnknownIssuer { .. } => ErrorCategory::Federation,
            Self::ClientLookupFailed { .. } => ErrorCategory::Infrastructure,
            Self::ResponseValidationFailed { .. } => ErrorCategory::Authentication,
            Self::IdentityMappingFailed { .. } => ErrorCategory::Authentication,
            Self::ResumeWithoutTarget => ErrorCategory::Workflow,
            Self::MissingSession => ErrorCategory::Validation,
            Self::SessionStore { .. } => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the machine-readable error code used in HTTP responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingIssuer => "missing_issuer",
            Self::UnknownIssuer { .. } => "unknown_issuer",
            Self::ClientLookupFailed { .. } => "client_lookup_failed",
            Self::ResponseValidationFailed { .. } => "response_validation_failed",
            Self::IdentityMappingFailed { .. } => "identity_mapping_failed",
            Self::ResumeWithoutTarget => "resume_without_target",
            Self::MissingSession => "missing_session",
            Self::SessionStore { .. } => "server_error",
        }
    }
}

impl From<SessionStoreError> for CallbackError {
    fn from(error: SessionStoreError) -> Self {
        Self::session_store(error.to_string())
    }
}

impl From<ClaimsError> for CallbackError {
    fn from(error: ClaimsError) -> Self {
        Self::identity_mapping_failed(error.to_string())
    }
}

/// Categories of callback errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed callback request.
    Validation,
    /// No trust relationship with the claimed issuer.
    Federation,
    /// Identity could not be established.
    Authentication,
    /// Registry or session storage failures.
    Infrastructure,
    /// Flow-ordering defects upstream of the callback.
    Workflow,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Federation => write!(f, "federation"),
            Self::Authentication => write!(f, "authentication"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Workflow => write!(f, "workflow"),
        }
    }
}
