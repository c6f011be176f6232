//! # rp-auth
//!
//! Authorization-code callback handling for an OpenID Connect relying party
//! that talks to dynamically resolved issuers.
//!
//! ## Overview
//!
//! When an issuer redirects the user back with an authorization code, the
//! callback:
//!
//! 1. resolves the issuer identifier from the callback path,
//! 2. looks up the client registered with that issuer,
//! 3. exchanges the code and validates the response,
//! 4. binds the authenticated identity and tokens to the user's session,
//! 5. resumes the flow the user started before authenticating.
//!
//! The first failing step aborts the callback. The session is only written
//! once every fallible step has succeeded.
//!
//! ## Modules
//!
//! - [`issuer`] - Issuer identifier resolution
//! - [`registry`] - Client registrations per issuer
//! - [`validator`] - Code exchange and response validation
//! - [`claims`] - Claims to user id mapping
//! - [`binder`] - Session binding
//! - [`resume`] - Workflow resumption
//! - [`pipeline`] - Callback orchestration
//! - [`session`] - Session state and storage
//! - [`http`] - Axum endpoint
//! - [`config`] - Configuration and loading

pub mod binder;
pub mod claims;
pub mod config;
pub mod error;
pub mod http;
pub mod issuer;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod resume;
pub mod session;
pub mod validator;

pub use binder::bind_session;
pub use claims::{ClaimsError, ClaimsMapper, SubjectClaimsMapper, WebIdClaimsMapper};
pub use config::{CallbackConfig, ConfigError};
pub use error::{CallbackError, ErrorCategory};
pub use http::{CallbackState, callback_handler, callback_routes};
pub use issuer::resolve_issuer;
pub use pipeline::{CallbackPipeline, CallbackStage};
pub use registry::{ClientRegistry, InMemoryClientRegistry, RegistryError, RpClient};
pub use request::CallbackRequest;
pub use resume::{HttpResponseSink, ResponseSink, ResumeOutcome, resume};
pub use session::{
    InMemorySessionStore, PendingAuthorization, Session, SessionStore, SessionStoreError,
};
pub use validator::{
    AuthResponse, IdTokenClaims, OidcResponseValidator, OidcValidatorConfig, ResponseValidator,
    TokenParams, ValidationError,
};
