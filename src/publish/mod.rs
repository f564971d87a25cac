//! Atomic output publication.
//!
//! A task writes its output to a temporary sibling path; only on success
//! is the content published to the final path (replacing an existing file
//! outright, or recursively removing and replacing an existing directory),
//! and only after successful publish is the record written, which also
//! refreshes the cache entry. On any failure inside the scope nothing is
//! published and no record is written, so the prior artifact and record
//! pair stays internally consistent.

use std::io;
use std::path::{Path, PathBuf};

use crate::artifact::Artifact;
use crate::error::{KilnError, KilnResult};
use crate::fingerprint;
use crate::session::BuildSession;
use crate::task::Task;

/// Run `write` against a temporary location for `artifact`, then publish
/// and record it.
///
/// `write` receives the temporary path and may create either a file or a
/// directory there. Returning `Err` discards the staged content and leaves
/// the previously published artifact untouched.
pub fn stage<T, F>(
    session: &BuildSession,
    task: &dyn Task,
    artifact: &Artifact,
    write: F,
) -> KilnResult<T>
where
    F: FnOnce(&Path) -> KilnResult<T>,
{
    let final_path = artifact.path();
    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(final_path);
    let value = match write(&tmp) {
        Ok(value) => value,
        Err(e) => {
            discard(&tmp);
            return Err(e);
        }
    };
    if !tmp.exists() {
        return Err(KilnError::Filesystem(io::Error::new(
            io::ErrorKind::NotFound,
            format!("staged output {} was never written", tmp.display()),
        )));
    }

    replace(&tmp, final_path)?;

    let fingerprint = fingerprint::current(session, task, artifact)?;
    session.write_record(artifact, &fingerprint)?;
    Ok(value)
}

/// Temporary sibling of the final path, distinguished per process so two
/// workers staging the same artifact cannot collide.
fn temp_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    final_path.with_file_name(format!(".{}.kiln-tmp-{}", name, std::process::id()))
}

/// Move staged content over the final path, replacing whatever is there.
fn replace(tmp: &Path, final_path: &Path) -> KilnResult<()> {
    if final_path.is_dir() {
        std::fs::remove_dir_all(final_path)?;
    } else if final_path.exists() {
        std::fs::remove_file(final_path)?;
    }
    std::fs::rename(tmp, final_path)?;
    Ok(())
}

fn discard(tmp: &Path) {
    if tmp.is_dir() {
        let _ = std::fs::remove_dir_all(tmp);
    } else if tmp.exists() {
        let _ = std::fs::remove_file(tmp);
    }
}
