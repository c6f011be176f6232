//! Session binding.

use crate::session::Session;
use crate::validator::AuthResponse;

/// Writes a validated authentication into `session`.
///
/// Tokens, issuer and `user_id` are written first; `identified` is set last.
/// The pending authorization is cleared so its state, nonce and verifier
/// cannot be replayed. `user_id` comes from the claims mapper, which runs
/// before binding so that a mapping failure leaves the session untouched.
pub fn bind_session(session: &mut Session, response: AuthResponse, user_id: String) {
    let AuthResponse {
        token_params,
        issuer,
        ..
    } = response;

    session.access_token = Some(token_params.access_token);
    session.refresh_token = token_params.refresh_token;
    session.id_token = token_params.id_token;
    session.issuer = Some(issuer);
    session.user_id = Some(user_id);
    session.pending = None;

    session.identified = true;
}
