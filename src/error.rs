//! Error kinds for the staleness core.
//!
//! Filesystem and corrupt-record conditions are treated as staleness by the
//! read paths, never as crashes. Hash computation failures are fatal: a
//! task whose logic cannot be introspected cannot be safely fingerprinted.
//! A declared-but-unreachable cache service is fatal too, since ambiguity
//! between "stale" and "fresh" is unacceptable.

use thiserror::Error;

/// Errors surfaced by the staleness core.
#[derive(Debug, Error)]
pub enum KilnError {
    /// Artifact or record missing or unreadable.
    #[error("filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// Source introspection or content-read failure while fingerprinting.
    #[error("hash computation failed: {0}")]
    HashComputation(String),

    /// Cache coordinates were declared but the service cannot be reached.
    #[error("declared cache service unavailable: {0}")]
    CacheUnavailable(String),

    /// A record exists but its fingerprint fields are malformed.
    #[error("corrupt record: {0}")]
    RecordCorrupt(String),
}

impl From<kiln_cached::CacheClientError> for KilnError {
    fn from(e: kiln_cached::CacheClientError) -> Self {
        KilnError::CacheUnavailable(e.to_string())
    }
}

/// Result type for staleness core operations.
pub type KilnResult<T> = Result<T, KilnError>;
