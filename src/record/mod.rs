//! Metadata records and the on-disk record store.
//!
//! A record captures the fingerprint that justified an artifact's last
//! successful build. Records are serialized as pretty, sorted-key JSON so
//! they diff cleanly and so writing the same fingerprint twice produces
//! byte-identical output. Their location is derived deterministically from
//! the artifact's relative path and the owning task's short id, under a
//! configurable metadata root.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::error::{KilnError, KilnResult};
use crate::fingerprint::Fingerprint;

/// Persisted metadata for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The fingerprint current when the artifact was last published.
    pub generation: Fingerprint,
}

impl Record {
    pub fn new(generation: Fingerprint) -> Self {
        Self { generation }
    }

    /// Serialize with sorted keys and human-diffable indentation.
    pub fn to_json(&self) -> KilnResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            KilnError::Filesystem(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize record: {}", e),
            ))
        })
    }

    /// Parse a serialized record; malformed input (including a missing
    /// fingerprint block) is a `RecordCorrupt` error.
    pub fn from_json(text: &str) -> KilnResult<Self> {
        serde_json::from_str(text).map_err(|e| KilnError::RecordCorrupt(e.to_string()))
    }
}

/// On-disk store mapping artifacts to record files under a metadata root.
#[derive(Debug, Clone)]
pub struct RecordStore {
    meta_root: PathBuf,
}

impl RecordStore {
    /// Default metadata root directory.
    pub const DEFAULT_META_ROOT: &'static str = ".meta";

    pub fn new(meta_root: impl Into<PathBuf>) -> Self {
        Self {
            meta_root: meta_root.into(),
        }
    }

    /// The metadata root this store writes under.
    pub fn meta_root(&self) -> &Path {
        &self.meta_root
    }

    /// Record location for an artifact:
    /// `<meta_root>/<rel_path>.<owner short id>.json`.
    pub fn record_path(&self, artifact: &Artifact) -> PathBuf {
        self.meta_root.join(artifact.record_file_name())
    }

    /// Whether a record file exists for this artifact.
    pub fn exists(&self, artifact: &Artifact) -> bool {
        self.record_path(artifact).exists()
    }

    /// Write a record, creating missing parent directories.
    pub fn write(&self, artifact: &Artifact, record: &Record) -> KilnResult<()> {
        let path = self.record_path(artifact);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, record.to_json()?)?;
        Ok(())
    }

    /// Read an artifact's record from disk.
    ///
    /// A missing, unreadable, or malformed record reads as `None`: those
    /// conditions surface as staleness and self-heal on the next publish,
    /// never as crashes.
    pub fn read(&self, artifact: &Artifact) -> Option<Record> {
        let path = self.record_path(artifact);
        let text = std::fs::read_to_string(&path).ok()?;
        match Record::from_json(&text) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "unreadable record treated as absent");
                None
            }
        }
    }
}
