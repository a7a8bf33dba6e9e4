//! Error types for the Ironic client.
//!
//! [`ClientError`] separates the cases the workflow driver treats differently:
//! a busy conductor (retried), a rejected request (authoritative, not
//! retried), a missing node, and transport failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP 404: the node no longer exists.
    #[error("node {node} not found")]
    NotFound { node: String },

    /// HTTP 409 persisted through every backoff attempt.
    #[error("ironic is busy, gave up after {attempts} attempt(s)")]
    Busy { attempts: u32 },

    /// Any other non-success response. `message` is Ironic's faultstring
    /// when the body carries one.
    #[error("request rejected (status {status}): {message}")]
    RequestRejected { status: u16, message: String },

    /// The node reported a provision state this client does not know.
    #[error("node reported unknown provision state '{0}'")]
    UnknownState(String),

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API version {version} only accepts text user_data in a config drive; structured user_data requires 1.56")]
    ConfigDriveUnsupported { version: String },

    #[error("failed to build config drive image: {0}")]
    ConfigDriveBuild(String),

    #[error("invalid microversion '{0}'")]
    InvalidMicroversion(String),
}

impl ClientError {
    /// Errors that are worth another try on the next poll tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Busy { .. } | ClientError::Transport(_))
    }
}

/// Pull a readable message out of an Ironic error body.
///
/// Ironic wraps its errors as `{"error_message": "<json string>"}` where the
/// inner JSON carries a `faultstring`. Falls back to the raw body.
pub fn fault_message(body: &str) -> String {
    let outer: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error_message = outer
        .as_ref()
        .and_then(|v| v.get("error_message"))
        .cloned();

    let faultstring = match &error_message {
        Some(serde_json::Value::String(inner)) => serde_json::from_str::<serde_json::Value>(inner)
            .ok()
            .and_then(|v| v.get("faultstring").and_then(|f| f.as_str()).map(str::to_string))
            .or_else(|| Some(inner.clone())),
        Some(value) => value
            .get("faultstring")
            .and_then(|f| f.as_str())
            .map(str::to_string),
        None => None,
    };

    faultstring.unwrap_or_else(|| body.trim().to_string())
}
