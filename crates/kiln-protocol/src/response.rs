//! Cache service response types.

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, ProtocolError};

/// Cache service response envelope.
///
/// One JSON object per line on the wire, mirroring the request line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheResponse {
    /// Request ID echoed from the request.
    pub request_id: String,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// For `fetch`: whether the key was present. Always false for
    /// `store`/`remove` acknowledgements.
    #[serde(default)]
    pub found: bool,
    /// The stored value, present on a `fetch` hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Error details, present when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CacheError>,
}

impl CacheResponse {
    /// A `fetch` hit carrying the stored value.
    pub fn hit(request_id: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            request_id: request_id.into(),
            ok: true,
            found: true,
            value: Some(value),
            error: None,
        }
    }

    /// A `fetch` miss.
    pub fn miss(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ok: true,
            found: false,
            value: None,
            error: None,
        }
    }

    /// Acknowledgement for a `store` or `remove`.
    pub fn ack(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            ok: true,
            found: false,
            value: None,
            error: None,
        }
    }

    /// An error response.
    pub fn error(request_id: impl Into<String>, error: CacheError) -> Self {
        Self {
            request_id: request_id.into(),
            ok: false,
            found: false,
            value: None,
            error: Some(error),
        }
    }

    /// Encode as one newline-terminated wire line.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self).map_err(|source| ProtocolError::Encode {
            what: "response",
            source,
        })?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one received wire line.
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|source| ProtocolError::Decode {
            what: "response",
            source,
        })
    }
}
