//! Artifacts: files or directories produced by tasks.
//!
//! Every artifact carries a derived relative path for stable display and
//! identity, and the short id of its owning task. Together those determine
//! the artifact's record location and cache key; one artifact maps to
//! exactly one record location.

use std::path::{Component, Path, PathBuf};

use crate::task::TaskIdentity;

/// A file or directory produced by a task, subject to staleness tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
    rel_path: PathBuf,
    owner_id: String,
}

impl Artifact {
    /// Declare an artifact produced by the task with the given identity.
    pub fn produced_by(owner: &TaskIdentity, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let rel_path = derive_rel_path(&path);
        Self {
            path,
            rel_path,
            owner_id: owner.short_id.clone(),
        }
    }

    /// The artifact's path as declared.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Relative path used for display and identity: the declared path
    /// stripped of the working directory when possible, else of its root.
    pub fn rel_path(&self) -> &Path {
        &self.rel_path
    }

    /// Short id of the owning task.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Whether the artifact currently exists on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Record file name under the metadata root:
    /// `<rel_path>.<owner short id>.json`.
    pub fn record_file_name(&self) -> PathBuf {
        PathBuf::from(format!("{}.{}.json", self.rel_path.display(), self.owner_id))
    }

    /// Canonical cache key for this artifact's record.
    pub fn cache_key(&self) -> String {
        format!("artifact:{}.{}", self.rel_path.display(), self.owner_id)
    }
}

fn derive_rel_path(path: &Path) -> PathBuf {
    if !path.is_absolute() {
        return path.to_path_buf();
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Ok(rel) = path.strip_prefix(&cwd) {
            return rel.to_path_buf();
        }
    }
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{CheckPolicy, Param, ParamValue, Task, TaskIdentity};

    struct Owner;

    impl Task for Owner {
        fn kind(&self) -> &str {
            "Owner"
        }
        fn params(&self) -> Vec<Param> {
            vec![Param::new("n", ParamValue::Int(1))]
        }
        fn source(&self) -> Option<String> {
            Some("fn task() {}".into())
        }
        fn requires(&self) -> Vec<Artifact> {
            Vec::new()
        }
        fn outputs(&self) -> Vec<Artifact> {
            Vec::new()
        }
        fn checks(&self) -> CheckPolicy {
            CheckPolicy::default()
        }
    }

    #[test]
    fn test_relative_path_kept_as_is() {
        let owner = TaskIdentity::of(&Owner);
        let a = Artifact::produced_by(&owner, "build/out.txt");
        assert_eq!(a.rel_path(), Path::new("build/out.txt"));
    }

    #[test]
    fn test_absolute_path_under_cwd_stripped() {
        let owner = TaskIdentity::of(&Owner);
        let cwd = std::env::current_dir().unwrap();
        let a = Artifact::produced_by(&owner, cwd.join("build/out.txt"));
        assert_eq!(a.rel_path(), Path::new("build/out.txt"));
    }

    #[test]
    fn test_absolute_path_outside_cwd_loses_root() {
        let owner = TaskIdentity::of(&Owner);
        let a = Artifact::produced_by(&owner, "/somewhere/else/out.txt");
        assert_eq!(a.rel_path(), Path::new("somewhere/else/out.txt"));
    }

    #[test]
    fn test_record_file_name_embeds_owner_id() {
        let owner = TaskIdentity::of(&Owner);
        let a = Artifact::produced_by(&owner, "out.txt");
        assert_eq!(
            a.record_file_name(),
            PathBuf::from(format!("out.txt.{}.json", owner.short_id))
        );
    }

    #[test]
    fn test_cache_key_is_stable() {
        let owner = TaskIdentity::of(&Owner);
        let a = Artifact::produced_by(&owner, "out.txt");
        let b = Artifact::produced_by(&owner, "out.txt");
        assert_eq!(a.cache_key(), b.cache_key());
        assert!(a.cache_key().starts_with("artifact:out.txt."));
    }
}
