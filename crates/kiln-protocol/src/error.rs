//! Error types for the cache service protocol.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure to encode or decode a protocol line.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// An envelope could not be serialized to a JSON line.
    #[error("failed to encode {what} line: {source}")]
    Encode {
        what: &'static str,
        source: serde_json::Error,
    },

    /// A received line is not a valid envelope.
    #[error("failed to decode {what} line: {source}")]
    Decode {
        what: &'static str,
        source: serde_json::Error,
    },
}

/// Error codes returned in cache service error responses.
///
/// These codes are stable and used for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheErrorCode {
    /// Malformed JSON, missing required fields, or invalid field values.
    InvalidRequest,
    /// Protocol version does not match the server's.
    UnsupportedProtocol,
    /// A `store` request without a value.
    MissingValue,
}

impl fmt::Display for CacheErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "INVALID_REQUEST"),
            Self::UnsupportedProtocol => write!(f, "UNSUPPORTED_PROTOCOL"),
            Self::MissingValue => write!(f, "MISSING_VALUE"),
        }
    }
}

/// Cache service error response payload.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct CacheError {
    /// Error code from the registry.
    pub code: CacheErrorCode,
    /// Human-readable, single-line error message.
    pub message: String,
}

impl CacheError {
    /// Create a new cache service error.
    pub fn new(code: CacheErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an INVALID_REQUEST error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(CacheErrorCode::InvalidRequest, message)
    }

    /// Create an UNSUPPORTED_PROTOCOL error.
    pub fn unsupported_protocol(requested: i32, supported: i32) -> Self {
        Self::new(
            CacheErrorCode::UnsupportedProtocol,
            format!(
                "protocol_version {} does not match supported version {}",
                requested, supported
            ),
        )
    }

    /// Create a MISSING_VALUE error.
    pub fn missing_value(key: &str) -> Self {
        Self::new(
            CacheErrorCode::MissingValue,
            format!("store request for key '{}' carries no value", key),
        )
    }
}
