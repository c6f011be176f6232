//! HTTP surface of the callback.
//!
//! One routed endpoint, `GET {prefix}/{issuer_id}`, plus the
//! [`IntoResponse`](axum::response::IntoResponse) rendering of
//! [`CallbackError`](crate::CallbackError).

mod callback;
mod error;

pub use callback::{CallbackState, callback_handler, callback_routes};
pub use error::RESUME_FAILED_BODY;
