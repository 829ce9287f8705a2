//! Error normalization for the transport layer.
//!
//! Every failure that crosses the transport boundary (no response, a
//! non-success status, or a body that cannot be decoded) is folded into a
//! single [`ApiError`] carrying one user-facing message, the HTTP status when
//! one was received, and an auth-failure flag. No other structured
//! discrimination is propagated; callers needing more inspect `http_status`
//! themselves.

use serde_json::Value;
use thiserror::Error;

/// Fallback message when the server provides nothing more specific.
pub const GENERIC_MESSAGE: &str = "An error occurred";

/// A normalized API failure.
///
/// Normalization is idempotent by construction: an `ApiError` is already in
/// its final shape, so re-normalizing one is the identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    /// The most specific message available for display.
    pub message: String,
    /// HTTP status of the response, or `None` when no response was received.
    pub http_status: Option<u16>,
    /// `true` for HTTP 401: the stored token is invalid or expired.
    pub is_auth_failure: bool,
}

impl ApiError {
    /// A failure with no HTTP response: connect error, timeout, DNS.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status: None,
            is_auth_failure: false,
        }
    }

    /// Normalizes a non-success HTTP response.
    ///
    /// Message extraction, most specific first:
    /// 1. a string body (raw or JSON-encoded) is used verbatim
    /// 2. an object body is probed for a `message`, then an `error` field
    /// 3. anything else falls back to [`GENERIC_MESSAGE`]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        Self {
            message: extract_message(body),
            http_status: Some(status),
            is_auth_failure: status == 401,
        }
    }

    /// A response arrived but its body could not be decoded as the expected
    /// shape.
    pub(crate) fn decode(status: u16) -> Self {
        Self {
            message: GENERIC_MESSAGE.to_string(),
            http_status: Some(status),
            is_auth_failure: false,
        }
    }

    /// `true` when retrying the same request may succeed; auth failures need
    /// re-authentication instead.
    pub fn is_recoverable(&self) -> bool {
        !self.is_auth_failure
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        tracing::warn!(error = %err, "network failure");
        Self::network(GENERIC_MESSAGE)
    }
}

fn extract_message(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return GENERIC_MESSAGE.to_string();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map
            .get("message")
            .or_else(|| map.get("error"))
            .and_then(Value::as_str)
            .map_or_else(|| GENERIC_MESSAGE.to_string(), str::to_owned),
        Ok(Value::String(s)) => s,
        // Not JSON: a plain-text body is used verbatim.
        _ => trimmed.to_string(),
    }
}
