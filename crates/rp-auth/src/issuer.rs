//! Issuer identifier resolution.
//!
//! The callback route carries the issuer identifier as a single
//! percent-encoded path segment, e.g. `/api/oidc/rp/https%3A%2F%2Fidp.example`.

use percent_encoding::percent_decode_str;

use crate::error::CallbackError;

/// Resolves the issuer identifier from the raw (still percent-encoded) path value.
///
/// Fails with [`CallbackError::MissingIssuer`] when the segment is absent,
/// decodes to an empty string, or is not valid UTF-8 once decoded.
pub fn resolve_issuer(raw: Option<&str>) -> Result<String, CallbackError> {
    let raw = raw.ok_or(CallbackError::MissingIssuer)?;

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| CallbackError::MissingIssuer)?;

    if decoded.trim().is_empty() {
        return Err(CallbackError::MissingIssuer);
    }

    Ok(decoded.into_owned())
}
