//! Error types for the marketplace API client.
//!
//! # Design
//! `Api` is the recoverable class: the server answered with a non-2xx status
//! and a JSON body, and callers branch on `status` and `message`. A body that
//! is not JSON at all lands in `InvalidJson` instead, carrying the status and
//! raw text, because it signals a contract mismatch rather than a business
//! rejection.

use serde_json::Value;
use thiserror::Error;

/// Errors returned by `ApiClient`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the request with a JSON error body.
    #[error("{message}")]
    Api {
        message: String,
        status: Option<u16>,
        original: Value,
    },

    /// The response body (success or failure) was not valid JSON.
    #[error("Invalid JSON response: {text}")]
    InvalidJson { status: u16, text: String },

    /// Valid JSON that does not fit the type the caller asked for.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The request never produced an HTTP response.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The file handed to `upload_image` could not be read.
    #[error("failed to read upload {path}: {message}")]
    Upload { path: String, message: String },
}

impl ApiError {
    /// HTTP status attached to the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => *status,
            ApiError::InvalidJson { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// The parsed error payload, or the raw text wrapped as a JSON string
    /// when the body was not JSON.
    pub fn original(&self) -> Option<Value> {
        match self {
            ApiError::Api { original, .. } => Some(original.clone()),
            ApiError::InvalidJson { text, .. } => Some(Value::String(text.clone())),
            _ => None,
        }
    }
}
