//! Bounded JSON fetching shared by the discovery and JWKS caches.

use reqwest::header::{ACCEPT, HeaderMap};
use serde::de::DeserializeOwned;
use url::Url;

/// Errors that can occur while fetching provider metadata.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// The response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The URL scheme is not allowed (must be HTTPS in production).
    #[error("Invalid URL scheme: {0} (only HTTPS is allowed)")]
    InvalidScheme(String),

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

/// Rejects non-HTTPS URLs unless plain HTTP is explicitly allowed.
pub(crate) fn ensure_scheme(url: &Url, allow_http: bool) -> Result<(), FetchError> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_http => Ok(()),
        other => Err(FetchError::InvalidScheme(other.to_string())),
    }
}

/// GETs `url` and decodes the JSON body, returning it with the response headers.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    http_client: &reqwest::Client,
    url: &Url,
    max_response_size: usize,
) -> Result<(T, HeaderMap), FetchError> {
    let response = http_client
        .get(url.as_str())
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(%url, error = %e, "Provider metadata request failed");
            FetchError::Network(e.to_string())
        })?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let headers = response.headers().clone();
    let body = read_bounded(response, max_response_size).await?;

    let value = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(%url, error = %e, "Failed to parse provider metadata");
        FetchError::Parse(e.to_string())
    })?;

    Ok((value, headers))
}

/// Reads a response body, failing once it grows past `max_size` bytes.
pub(crate) async fn read_bounded(
    mut response: reqwest::Response,
    max_size: usize,
) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length()
        && len as usize > max_size
    {
        return Err(FetchError::ResponseTooLarge { max_size });
    }

    // Chunked responses carry no Content-Length.
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?
    {
        if body.len() + chunk.len() > max_size {
            return Err(FetchError::ResponseTooLarge { max_size });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Normalizes a URL for use as a cache key.
pub(crate) fn cache_key(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}
