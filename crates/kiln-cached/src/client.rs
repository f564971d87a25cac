//! Client side of the cache service protocol.
//!
//! Each call opens one connection, writes one request line, and reads one
//! response line. Failure to reach declared coordinates is an error, never
//! a silent miss: treating an unreachable cache as "absent" risks a false
//! answer against a concurrently running correct sibling.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use uuid::Uuid;

use kiln_protocol::{CacheRequest, CacheResponse};

use crate::declared_coordinates;

/// Errors from cache service calls.
#[derive(Debug, thiserror::Error)]
pub enum CacheClientError {
    #[error("cache service at {addr}:{port} unreachable: {source}")]
    Unreachable {
        addr: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("I/O error talking to cache service: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed cache service traffic: {0}")]
    Malformed(#[from] kiln_protocol::ProtocolError),

    #[error("cache service refused request: {0}")]
    Refused(#[from] kiln_protocol::CacheError),

    #[error("cache service closed the connection mid-request")]
    Disconnected,
}

/// Client for one cache service instance.
#[derive(Debug, Clone)]
pub struct CacheClient {
    addr: String,
    port: u16,
}

impl CacheClient {
    /// Create a client for explicit coordinates.
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
        }
    }

    /// Create a client from the declared environment coordinates, or `None`
    /// when no shared cache exists.
    pub fn from_env() -> Option<Self> {
        declared_coordinates().map(|(addr, port)| Self::new(addr, port))
    }

    /// Look up a key. `Ok(None)` means the service answered "not found".
    pub fn fetch(
        &self,
        key: impl Into<String>,
    ) -> Result<Option<serde_json::Value>, CacheClientError> {
        let request = CacheRequest::fetch(Uuid::new_v4().to_string(), key);
        let response = self.round_trip(&request)?;
        if response.found {
            Ok(response.value)
        } else {
            Ok(None)
        }
    }

    /// Store a value under a key, replacing any previous value.
    pub fn store(
        &self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), CacheClientError> {
        let request = CacheRequest::store(Uuid::new_v4().to_string(), key, value);
        self.round_trip(&request)?;
        Ok(())
    }

    /// Remove a key. Returns once the removal is acknowledged; removing an
    /// absent key succeeds.
    pub fn remove(&self, key: impl Into<String>) -> Result<(), CacheClientError> {
        let request = CacheRequest::remove(Uuid::new_v4().to_string(), key);
        self.round_trip(&request)?;
        Ok(())
    }

    fn round_trip(&self, request: &CacheRequest) -> Result<CacheResponse, CacheClientError> {
        let stream = TcpStream::connect((self.addr.as_str(), self.port)).map_err(|source| {
            CacheClientError::Unreachable {
                addr: self.addr.clone(),
                port: self.port,
                source,
            }
        })?;

        let line = request.to_line()?;

        let mut writer = stream.try_clone()?;
        writer.write_all(line.as_bytes())?;
        writer.flush()?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        if reader.read_line(&mut response_line)? == 0 {
            return Err(CacheClientError::Disconnected);
        }

        let response = CacheResponse::from_line(&response_line)?;
        if let Some(error) = response.error {
            return Err(CacheClientError::Refused(error));
        }
        Ok(response)
    }
}
