//! Callback orchestration.
//!
//! [`CallbackPipeline`] runs the callback as a strictly linear sequence:
//!
//! ```text
//! Start -> IssuerResolved -> ClientLoaded -> ResponseValidated -> SessionBound -> Resumed
//! ```
//!
//! The first failing stage moves the pipeline to `Failed` and the error is
//! returned to the caller. Nothing is retried. The session is written only
//! by the binding and resume stages, which run after every fallible stage,
//! so a failed or cancelled callback leaves it as it was.

use std::fmt;
use std::sync::Arc;

use crate::binder::bind_session;
use crate::claims::ClaimsMapper;
use crate::error::CallbackError;
use crate::registry::ClientRegistry;
use crate::request::CallbackRequest;
use crate::resume::{ResponseSink, ResumeOutcome, resume};
use crate::session::Session;
use crate::validator::{ResponseValidator, ValidationError};

/// Position of a callback in the orchestration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackStage {
    /// Nothing has run yet.
    Start,
    /// The issuer identifier was decoded from the path.
    IssuerResolved,
    /// A client registration was found for the issuer.
    ClientLoaded,
    /// The code exchange produced a validated response.
    ResponseValidated,
    /// Identity and tokens were written to the session.
    SessionBound,
    /// The user was sent on (or the fallback response was emitted).
    Resumed,
    /// A stage failed. Terminal.
    Failed,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::IssuerResolved => "issuer_resolved",
            Self::ClientLoaded => "client_loaded",
            Self::ResponseValidated => "response_validated",
            Self::SessionBound => "session_bound",
            Self::Resumed => "resumed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The authorization-code callback orchestrator.
#[derive(Clone)]
pub struct CallbackPipeline {
    registry: Arc<dyn ClientRegistry>,
    validator: Arc<dyn ResponseValidator>,
    claims_mapper: Arc<dyn ClaimsMapper>,
}

impl CallbackPipeline {
    /// Creates a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<dyn ClientRegistry>,
        validator: Arc<dyn ResponseValidator>,
        claims_mapper: Arc<dyn ClaimsMapper>,
    ) -> Self {
        Self {
            registry,
            validator,
            claims_mapper,
        }
    }

    /// Handles one callback against `session`, writing the user-facing
    /// outcome to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing stage. In that case neither
    /// `session` nor `sink` has been touched.
    pub async fn handle(
        &self,
        request: &CallbackRequest,
        session: &mut Session,
        sink: &mut dyn ResponseSink,
    ) -> Result<ResumeOutcome, CallbackError> {
        let mut stage = CallbackStage::Start;

        match self.run(request, session, sink, &mut stage).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                tracing::warn!(
                    stage = %stage,
                    next = %CallbackStage::Failed,
                    category = %error.category(),
                    error = %error,
                    "Callback rejected"
                );
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        request: &CallbackRequest,
        session: &mut Session,
        sink: &mut dyn ResponseSink,
        stage: &mut CallbackStage,
    ) -> Result<ResumeOutcome, CallbackError> {
        let issuer = request.issuer_id()?;
        advance(stage, CallbackStage::IssuerResolved, &issuer);

        let client = self
            .registry
            .client_for_issuer(&issuer)
            .await
            .map_err(|e| CallbackError::from_registry(&issuer, e))?;
        advance(stage, CallbackStage::ClientLoaded, &issuer);

        let response = self
            .validator
            .validate_response(&client, request, session)
            .await
            .map_err(|e| CallbackError::response_validation_failed(&issuer, e))?;
        if response.refresh_token().is_none() {
            return Err(CallbackError::response_validation_failed(
                &issuer,
                ValidationError::MissingRefreshToken,
            ));
        }
        advance(stage, CallbackStage::ResponseValidated, &issuer);

        let user_id = self.claims_mapper.user_id(&response.claims)?;
        bind_session(session, response, user_id);
        advance(stage, CallbackStage::SessionBound, &issuer);

        tracing::info!(
            issuer = %issuer,
            user_id = session.user_id.as_deref().unwrap_or_default(),
            "User authenticated"
        );

        let outcome = resume(session, sink);
        advance(stage, CallbackStage::Resumed, &issuer);

        Ok(outcome)
    }
}

fn advance(stage: &mut CallbackStage, next: CallbackStage, issuer: &str) {
    tracing::debug!(from = %stage, to = %next, issuer, "Callback stage transition");
    *stage = next;
}
