use std::fmt;

use thiserror::Error;

/// Errors produced while talking to the Prism API
#[derive(Debug, Error)]
pub enum PrismError {
    /// Request body could not be serialized
    #[error("failed to marshal request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// Network failure before a response was received
    #[error("failed to execute request: {0}")]
    Transport(String),

    /// Non-success HTTP status, carries the raw response body
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// Envelope reported `success: false`
    #[error("API request failed: {0}")]
    Envelope(String),

    /// Response payload did not match the expected shape
    #[error("failed to unmarshal {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Input rejected before any network call
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },
}

impl PrismError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PrismError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the addressed object does not (yet) exist
    pub fn is_not_found(&self) -> bool {
        is_not_found_message(&self.to_string())
    }
}

/// Not-found detection works on the rendered error text: the backend reports
/// missing objects either with a 404 status or with a "not found" message
/// inside an otherwise generic failure.
pub fn is_not_found_message(message: &str) -> bool {
    message.contains("404") || message.to_lowercase().contains("not found")
}

/// Predicate over an optional error; `None` is never "not found"
pub fn is_not_found<E: fmt::Display + ?Sized>(err: Option<&E>) -> bool {
    match err {
        Some(err) => is_not_found_message(&err.to_string()),
        None => false,
    }
}

/// Result type for API operations
pub type PrismResult<T> = Result<T, PrismError>;
