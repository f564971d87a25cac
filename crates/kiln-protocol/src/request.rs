//! Cache service request types.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::PROTOCOL_VERSION;

/// Operation requested from the cache service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOp {
    /// Look up the value stored under a key.
    Fetch,
    /// Replace the value stored under a key (no merge).
    Store,
    /// Delete a key. Idempotent; removing an absent key succeeds.
    Remove,
}

impl std::fmt::Display for CacheOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheOp::Fetch => write!(f, "fetch"),
            CacheOp::Store => write!(f, "store"),
            CacheOp::Remove => write!(f, "remove"),
        }
    }
}

/// Cache service request envelope.
///
/// One JSON object per line on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRequest {
    /// Protocol version.
    pub protocol_version: i32,
    /// Requested operation.
    pub op: CacheOp,
    /// Caller-chosen request ID, echoed in the response for correlation.
    pub request_id: String,
    /// Canonical textual identity of an artifact or task.
    pub key: String,
    /// Payload for `store`; absent for `fetch` and `remove`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl CacheRequest {
    /// Build a `fetch` request.
    pub fn fetch(request_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            op: CacheOp::Fetch,
            request_id: request_id.into(),
            key: key.into(),
            value: None,
        }
    }

    /// Build a `store` request carrying the value to write.
    pub fn store(
        request_id: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            op: CacheOp::Store,
            request_id: request_id.into(),
            key: key.into(),
            value: Some(value),
        }
    }

    /// Build a `remove` request.
    pub fn remove(request_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            op: CacheOp::Remove,
            request_id: request_id.into(),
            key: key.into(),
            value: None,
        }
    }

    /// Encode as one newline-terminated wire line.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self).map_err(|source| ProtocolError::Encode {
            what: "request",
            source,
        })?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one received wire line.
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|source| ProtocolError::Decode {
            what: "request",
            source,
        })
    }
}
