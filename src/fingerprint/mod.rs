//! Fingerprint engine.
//!
//! A fingerprint captures four hash-like values for one artifact of one
//! task: the task signature, a hash of the task's executable logic, a hash
//! over the recorded output hashes of all direct inputs, and a hash of the
//! artifact's produced bytes. Disabled checks record the `"0"` sentinel
//! (code, output) or an empty string (deps) instead of a hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::artifact::Artifact;
use crate::error::{KilnError, KilnResult};
use crate::session::BuildSession;
use crate::task::{signature_of, CheckPolicy, DirHashPolicy, Task};

/// Sentinel recorded when a hash check is disabled for a task kind.
pub const HASH_DISABLED: &str = "0";

/// The four hashes identifying a build state.
///
/// Field order is alphabetical so the serialized form has sorted keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hash of the task's executable logic.
    pub code: String,
    /// Hash over the sorted output hashes of all direct inputs.
    pub deps: String,
    /// Hash of the artifact's produced bytes.
    pub out: String,
    /// Task signature.
    pub task: String,
}

/// Compute the SHA-256 of bytes and return it hex-encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash of the textual source of the task's primary executable routine.
///
/// Returns the sentinel when code checking is disabled for this kind;
/// failing to introspect the source while it is enabled is fatal, since
/// such a task cannot be safely fingerprinted.
pub fn code_hash(task: &dyn Task) -> KilnResult<String> {
    if !task.checks().code {
        return Ok(HASH_DISABLED.to_string());
    }
    match task.source() {
        Some(source) => Ok(sha256_hex(source.as_bytes())),
        None => Err(KilnError::HashComputation(format!(
            "task kind '{}' has no introspectable source",
            task.kind()
        ))),
    }
}

/// Hash over the recorded `out` hashes of the task's direct inputs.
///
/// Inputs lacking a usable record contribute no value; the staleness
/// oracle still catches them because their absence changes this hash.
/// Empty when input checking is disabled.
pub fn dependency_hash(session: &BuildSession, task: &dyn Task) -> KilnResult<String> {
    if !task.checks().inputs {
        return Ok(String::new());
    }
    let mut out_hashes = Vec::new();
    for input in task.requires() {
        if let Some(record) = session.read_record(&input)? {
            out_hashes.push(record.generation.out);
        }
    }
    out_hashes.sort();

    let canonical = serde_json_canonicalizer::to_vec(&out_hashes)
        .map_err(|e| KilnError::HashComputation(format!("canonicalizing input hashes: {}", e)))?;
    Ok(sha256_hex(&canonical))
}

/// Hash of an artifact's produced bytes.
///
/// For a file, the hash of its raw bytes. For a directory, the hash of
/// either the sorted contained file names or the sorted concatenation of
/// all contained file contents, per the task's directory policy. Must only
/// be called once the artifact is confirmed present.
pub fn output_hash(artifact: &Artifact, checks: &CheckPolicy) -> KilnResult<String> {
    if !checks.outputs {
        return Ok(HASH_DISABLED.to_string());
    }

    let path = artifact.path();
    if path.is_dir() {
        let mut hasher = Sha256::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                KilnError::HashComputation(format!(
                    "walking artifact directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match checks.dir_hash {
                DirHashPolicy::Simplified => {
                    hasher.update(entry.file_name().to_string_lossy().as_bytes());
                }
                DirHashPolicy::Full => {
                    let bytes = std::fs::read(entry.path()).map_err(|e| {
                        KilnError::HashComputation(format!(
                            "reading {}: {}",
                            entry.path().display(),
                            e
                        ))
                    })?;
                    hasher.update(&bytes);
                }
            }
        }
        Ok(hex::encode(hasher.finalize()))
    } else {
        let bytes = std::fs::read(path).map_err(|e| {
            KilnError::HashComputation(format!("reading artifact {}: {}", path.display(), e))
        })?;
        Ok(sha256_hex(&bytes))
    }
}

/// Compute the full fingerprint of one artifact from current disk state.
pub fn current(
    session: &BuildSession,
    task: &dyn Task,
    artifact: &Artifact,
) -> KilnResult<Fingerprint> {
    Ok(Fingerprint {
        code: code_hash(task)?,
        deps: dependency_hash(session, task)?,
        out: output_hash(artifact, &task.checks())?,
        task: signature_of(task),
    })
}
