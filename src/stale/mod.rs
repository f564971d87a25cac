//! The staleness oracle.
//!
//! Staleness is a pure function of artifact existence, record existence,
//! record well-formedness, and fingerprint equality. Modification
//! timestamps play no part. The check order is load-bearing: cheap
//! existence and string comparisons run before any content hashing.

use crate::artifact::Artifact;
use crate::error::KilnResult;
use crate::fingerprint;
use crate::session::BuildSession;
use crate::task::{signature_of, Task};

/// Decide whether an artifact must be rebuilt.
///
/// Ordered, short-circuiting checks:
/// 1. artifact missing on disk;
/// 2. record file missing;
/// 3. record lacks a well-formed fingerprint;
/// 4. stored task signature differs;
/// 5. stored code hash differs;
/// 6. stored dependency hash differs (this also catches an input with a
///    missing record, since its contribution changes);
/// 7. with `recompute_output`, any field of the fingerprint recomputed
///    from current disk state differs.
///
/// Not-stale only once every applicable check passes.
pub fn is_stale(
    session: &BuildSession,
    task: &dyn Task,
    artifact: &Artifact,
    recompute_output: bool,
) -> KilnResult<bool> {
    if !artifact.exists() {
        return Ok(true);
    }
    if !session.record_store().exists(artifact) {
        return Ok(true);
    }
    let Some(record) = session.read_record(artifact)? else {
        return Ok(true);
    };
    let generation = record.generation;

    if generation.task != signature_of(task) {
        return Ok(true);
    }
    if generation.code != fingerprint::code_hash(task)? {
        return Ok(true);
    }
    if generation.deps != fingerprint::dependency_hash(session, task)? {
        return Ok(true);
    }

    if recompute_output {
        let current = fingerprint::current(session, task, artifact)?;
        if current != generation {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KilnError;
    use crate::publish;
    use crate::task::{CheckPolicy, Param, ParamValue, TaskIdentity};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct ConfigurableTask {
        kind: &'static str,
        params: Vec<Param>,
        source: String,
        inputs: Vec<Artifact>,
        out: PathBuf,
        checks: CheckPolicy,
    }

    impl ConfigurableTask {
        fn new(out: PathBuf) -> Self {
            Self {
                kind: "Configurable",
                params: vec![Param::new("n", ParamValue::Int(1))],
                source: "fn task() { v1() }".to_string(),
                inputs: Vec::new(),
                out,
                checks: CheckPolicy::default(),
            }
        }

        fn artifact(&self) -> Artifact {
            Artifact::produced_by(&TaskIdentity::of(self), &self.out)
        }

        fn publish(&self, session: &BuildSession, content: &[u8]) {
            publish::stage(session, self, &self.artifact(), |tmp| {
                std::fs::write(tmp, content).map_err(KilnError::from)
            })
            .unwrap();
        }
    }

    impl Task for ConfigurableTask {
        fn kind(&self) -> &str {
            self.kind
        }
        fn params(&self) -> Vec<Param> {
            self.params.clone()
        }
        fn source(&self) -> Option<String> {
            Some(self.source.clone())
        }
        fn requires(&self) -> Vec<Artifact> {
            self.inputs.clone()
        }
        fn outputs(&self) -> Vec<Artifact> {
            vec![self.artifact()]
        }
        fn checks(&self) -> CheckPolicy {
            self.checks
        }
    }

    fn session_in(dir: &TempDir) -> BuildSession {
        BuildSession::with_meta_root(dir.path().join(".meta"))
    }

    #[test]
    fn test_missing_artifact_is_stale() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let task = ConfigurableTask::new(dir.path().join("out.txt"));

        assert!(is_stale(&session, &task, &task.artifact(), false).unwrap());
    }

    #[test]
    fn test_artifact_without_record_is_stale() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let task = ConfigurableTask::new(dir.path().join("out.txt"));

        std::fs::write(&task.out, b"content").unwrap();
        assert!(is_stale(&session, &task, &task.artifact(), false).unwrap());
    }

    #[test]
    fn test_unchanged_task_is_fresh() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let task = ConfigurableTask::new(dir.path().join("out.txt"));

        task.publish(&session, b"content");
        assert!(!is_stale(&session, &task, &task.artifact(), false).unwrap());
        assert!(!is_stale(&session, &task, &task.artifact(), true).unwrap());
    }

    #[test]
    fn test_signature_change_alone_flips_stale() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let mut task = ConfigurableTask::new(dir.path().join("out.txt"));

        task.publish(&session, b"content");
        task.params = vec![Param::new("n", ParamValue::Int(2))];

        assert!(is_stale(&session, &task, &task.artifact(), false).unwrap());
    }

    #[test]
    fn test_code_change_alone_flips_stale() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let mut task = ConfigurableTask::new(dir.path().join("out.txt"));

        task.publish(&session, b"content");
        task.source = "fn task() { v2() }".to_string();

        assert!(is_stale(&session, &task, &task.artifact(), false).unwrap());
    }

    #[test]
    fn test_dependency_change_alone_flips_stale() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);

        let mut upstream = ConfigurableTask::new(dir.path().join("input.txt"));
        upstream.kind = "Upstream";
        upstream.publish(&session, b"v1");

        let mut task = ConfigurableTask::new(dir.path().join("out.txt"));
        task.inputs = vec![upstream.artifact()];
        task.publish(&session, b"content");
        assert!(!is_stale(&session, &task, &task.artifact(), false).unwrap());

        // Republish the input with different bytes; its recorded out hash
        // changes and so does this task's dependency hash.
        upstream.publish(&session, b"v2");
        assert!(is_stale(&session, &task, &task.artifact(), false).unwrap());
    }

    #[test]
    fn test_input_losing_its_record_flips_stale() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);

        let mut upstream = ConfigurableTask::new(dir.path().join("input.txt"));
        upstream.kind = "Upstream";
        upstream.publish(&session, b"v1");

        let mut task = ConfigurableTask::new(dir.path().join("out.txt"));
        task.inputs = vec![upstream.artifact()];
        task.publish(&session, b"content");

        // A fresh session has no cache entries; the input's record file is
        // gone, so its contribution to the dependency hash disappears.
        std::fs::remove_file(session.record_store().record_path(&upstream.artifact())).unwrap();
        let fresh = session_in(&dir);
        assert!(is_stale(&fresh, &task, &task.artifact(), false).unwrap());
    }

    #[test]
    fn test_output_edit_caught_only_with_recompute() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let task = ConfigurableTask::new(dir.path().join("out.txt"));

        task.publish(&session, b"content");
        std::fs::write(&task.out, b"tampered").unwrap();

        assert!(!is_stale(&session, &task, &task.artifact(), false).unwrap());
        assert!(is_stale(&session, &task, &task.artifact(), true).unwrap());
    }

    #[test]
    fn test_mtime_only_change_stays_fresh() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let task = ConfigurableTask::new(dir.path().join("out.txt"));

        task.publish(&session, b"X");
        // Rewrite identical bytes; only the modification time changes.
        std::fs::write(&task.out, b"X").unwrap();

        assert!(!is_stale(&session, &task, &task.artifact(), true).unwrap());
    }

    #[test]
    fn test_disabled_checks_ignore_changes() {
        let dir = TempDir::new().unwrap();
        let session = session_in(&dir);
        let mut task = ConfigurableTask::new(dir.path().join("out.txt"));
        task.checks.code = false;

        task.publish(&session, b"content");
        task.source = "fn task() { v2() }".to_string();

        // Code checking is off for this kind; the sentinel matches.
        assert!(!is_stale(&session, &task, &task.artifact(), false).unwrap());
    }
}
