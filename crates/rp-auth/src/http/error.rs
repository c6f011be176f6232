//! Error response rendering for the callback endpoint.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::CallbackError;

/// Plain body sent when a callback finishes with nothing to resume.
pub const RESUME_FAILED_BODY: &str = "Resume User Flow (failed)";

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        if matches!(self, Self::ResumeWithoutTarget) {
            return (StatusCode::OK, RESUME_FAILED_BODY).into_response();
        }

        let (status, message) = error_details(&self);
        let body = json!({
            "error": self.error_code(),
            "error_description": message,
        });

        let mut response = (status, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}

/// Returns the HTTP status and the message exposed to the user agent.
///
/// Validation failures carry provider diagnostics; only the outer message
/// is exposed.
fn error_details(error: &CallbackError) -> (StatusCode, String) {
    match error {
        CallbackError::MissingIssuer | CallbackError::MissingSession => {
            (StatusCode::BAD_REQUEST, error.to_string())
        }
        CallbackError::UnknownIssuer { .. } => (StatusCode::BAD_REQUEST, error.to_string()),
        CallbackError::ClientLookupFailed { issuer, .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Client registration for {issuer} is unavailable"),
        ),
        CallbackError::ResponseValidationFailed { issuer, .. } => (
            StatusCode::UNAUTHORIZED,
            format!("Authentication response from {issuer} was rejected"),
        ),
        CallbackError::IdentityMappingFailed { .. } => (StatusCode::FORBIDDEN, error.to_string()),
        CallbackError::ResumeWithoutTarget => (StatusCode::OK, RESUME_FAILED_BODY.to_string()),
        CallbackError::SessionStore { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session storage failure".to_string(),
        ),
    }
}
