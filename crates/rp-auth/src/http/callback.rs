//! The callback endpoint.
//!
//! # Usage
//!
//! ```ignore
//! use rp_auth::http::{CallbackState, callback_routes};
//!
//! let state = CallbackState::from_config(&config, sessions)?;
//! let app = axum::Router::new().merge(callback_routes(state));
//! ```

use std::sync::Arc;

use axum::{
    Router,
    extract::{OriginalUri, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use url::Url;

use crate::claims::WebIdClaimsMapper;
use crate::config::{CallbackConfig, ConfigError};
use crate::error::CallbackError;
use crate::issuer::resolve_issuer;
use crate::pipeline::CallbackPipeline;
use crate::registry::InMemoryClientRegistry;
use crate::request::CallbackRequest;
use crate::resume::HttpResponseSink;
use crate::session::SessionStore;
use crate::validator::OidcResponseValidator;

/// State required for the callback endpoint.
#[derive(Clone)]
pub struct CallbackState {
    /// The orchestrator.
    pub pipeline: Arc<CallbackPipeline>,
    /// Store holding the sessions being authenticated.
    pub sessions: Arc<dyn SessionStore>,
    /// This relying party's base URI.
    pub server_uri: Url,
    /// Path prefix the callback is mounted under, without trailing slash.
    pub route_prefix: String,
    /// Name of the cookie carrying the session id.
    pub cookie_name: String,
}

impl CallbackState {
    /// Creates a new callback state.
    pub fn new(
        pipeline: Arc<CallbackPipeline>,
        sessions: Arc<dyn SessionStore>,
        server_uri: Url,
        route_prefix: impl Into<String>,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            sessions,
            server_uri,
            route_prefix: route_prefix.into(),
            cookie_name: cookie_name.into(),
        }
    }

    /// Wires the OIDC validator, the configured client registrations and the
    /// WebID claims mapper into a callback state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(
        config: &CallbackConfig,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let validator = OidcResponseValidator::new(config.validator_config())
            .map_err(|e| ConfigError::InvalidValue(format!("HTTP client: {e}")))?;

        let pipeline = CallbackPipeline::new(
            Arc::new(InMemoryClientRegistry::from_clients(config.clients.clone())),
            Arc::new(validator),
            Arc::new(WebIdClaimsMapper::new(config.user_id_claim.clone())),
        );

        Ok(Self::new(
            Arc::new(pipeline),
            sessions,
            config.server_url()?,
            config.route_prefix.clone(),
            config.session_cookie_name.clone(),
        ))
    }
}

/// Builds the router for `GET {prefix}/{issuer_id}`.
///
/// The bare prefix is routed too so a callback without an issuer segment is
/// answered with a `missing_issuer` error rather than a 404.
pub fn callback_routes(state: CallbackState) -> Router {
    let prefix = state.route_prefix.clone();

    Router::new()
        .route(&format!("{prefix}/{{issuer_id}}"), get(callback_handler))
        .route(&prefix, get(callback_handler))
        .route(&format!("{prefix}/"), get(callback_handler))
        .with_state(state)
}

/// Handles `GET {prefix}/{issuer_id}`.
///
/// Rejects a callback without an issuer segment before touching the
/// session. Otherwise loads the session named by the session cookie, runs
/// the pipeline on it, and saves it only if the pipeline completed.
pub async fn callback_handler(
    State(state): State<CallbackState>,
    uri: Uri,
    OriginalUri(original_uri): OriginalUri,
    jar: CookieJar,
) -> Response {
    match handle(&state, &uri, &original_uri, &jar).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

async fn handle(
    state: &CallbackState,
    uri: &Uri,
    original_uri: &Uri,
    jar: &CookieJar,
) -> Result<Response, CallbackError> {
    let issuer_param = issuer_segment(uri.path(), &state.route_prefix);
    resolve_issuer(issuer_param.as_deref())?;
    let request_uri = request_uri(&state.server_uri, original_uri)?;

    let session_id = jar
        .get(&state.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| !id.is_empty())
        .ok_or(CallbackError::MissingSession)?;

    let mut session = state
        .sessions
        .load(&session_id)
        .await?
        .ok_or(CallbackError::MissingSession)?;

    let request = CallbackRequest::new(
        request_uri,
        issuer_param,
        state.server_uri.clone(),
        session_id,
    );

    let mut sink = HttpResponseSink::new();
    state.pipeline.handle(&request, &mut session, &mut sink).await?;

    state.sessions.save(&request.session_id, &session).await?;

    Ok(sink
        .into_response()
        .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

/// Returns the raw (still percent-encoded) issuer segment following `prefix`.
fn issuer_segment(path: &str, prefix: &str) -> Option<String> {
    path.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Rebuilds the absolute redirect URI from the server URI and the request
/// target as received.
fn request_uri(server_uri: &Url, original_uri: &Uri) -> Result<Url, CallbackError> {
    let target = original_uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    server_uri
        .join(target)
        .map_err(|_| CallbackError::MissingIssuer)
}
