//! Workflow resumption after a successful callback.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::error::CallbackError;
use crate::session::Session;

/// Where the outcome of a callback is written.
pub trait ResponseSink: Send {
    /// Sends the user to `location`.
    fn redirect(&mut self, location: &str);

    /// Reports a failure to the user.
    fn fail(&mut self, error: CallbackError);
}

/// Terminal outcome of [`resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The user was redirected to the stored return URL.
    Redirected(String),
    /// No return URL was pending; the fallback response was sent.
    NoTarget,
}

/// Sends the user back to the flow that started authentication.
///
/// The return URL is removed from the session before the redirect is
/// issued, so a second resume on the same session yields the fallback.
pub fn resume(session: &mut Session, sink: &mut dyn ResponseSink) -> ResumeOutcome {
    match session.take_return_to_url() {
        Some(location) => {
            sink.redirect(&location);
            ResumeOutcome::Redirected(location)
        }
        None => {
            tracing::warn!("Callback completed without a pending return URL");
            sink.fail(CallbackError::ResumeWithoutTarget);
            ResumeOutcome::NoTarget
        }
    }
}

/// [`ResponseSink`] that builds an axum [`Response`].
#[derive(Debug, Default)]
pub struct HttpResponseSink {
    response: Option<Response>,
}

impl HttpResponseSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the response written to the sink, if any.
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl ResponseSink for HttpResponseSink {
    fn redirect(&mut self, location: &str) {
        self.response = Some(
            (
                StatusCode::FOUND,
                [(header::LOCATION, location.to_string())],
            )
                .into_response(),
        );
    }

    fn fail(&mut self, error: CallbackError) {
        self.response = Some(error.into_response());
    }
}
