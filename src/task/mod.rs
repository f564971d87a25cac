//! Task abstraction and identity derivation.
//!
//! A task is anything that consumes input artifacts and produces output
//! artifacts. Implementations declare their kind, significant parameters,
//! inputs, and outputs explicitly; nothing is inferred by probing.
//!
//! Two identity strings are derived from a task:
//! - the *signature*, a human-readable `Kind(name=value, ...)` form stored
//!   in records and compared by the staleness oracle;
//! - the *identity string*, which serializes every parameter through an
//!   explicit tagged encoding (`tag:payload`) so it stays stable and
//!   inspectable across versions. Cache keys and the short id hash are
//!   derived from it.
//!
//! Both sort parameters by name, so declaration order never matters.

use std::path::PathBuf;

use crate::artifact::Artifact;
use crate::fingerprint::sha256_hex;

/// Length of the short task id (hex chars of the identity hash) used in
/// record file names.
pub const SHORT_ID_LEN: usize = 12;

/// A significant task parameter value with an explicit tagged encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Path(PathBuf),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Short human form used in signatures: paths render relative to the
    /// working directory when possible, lists join their elements.
    pub fn short(&self) -> String {
        match self {
            ParamValue::Str(s) => s.clone(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Path(p) => {
                let shown = std::env::current_dir()
                    .ok()
                    .and_then(|cwd| p.strip_prefix(&cwd).ok().map(|r| r.to_path_buf()))
                    .unwrap_or_else(|| p.clone());
                shown.display().to_string()
            }
            ParamValue::List(xs) => xs
                .iter()
                .map(ParamValue::short)
                .collect::<Vec<_>>()
                .join(";"),
        }
    }

    /// Stable tagged encoding (`tag:payload`) used for identity strings.
    pub fn tagged(&self) -> String {
        match self {
            ParamValue::Str(s) => format!("str:{}", s),
            ParamValue::Int(i) => format!("int:{}", i),
            ParamValue::Bool(b) => format!("bool:{}", b),
            ParamValue::Path(p) => format!("path:{}", p.display()),
            ParamValue::List(xs) => {
                let inner = xs
                    .iter()
                    .map(ParamValue::tagged)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("list:[{}]", inner)
            }
        }
    }
}

/// A named significant parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub value: ParamValue,
}

impl Param {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// How directory outputs are hashed.
///
/// `Simplified` hashes only the sorted contained file names, so renames are
/// caught but content edits are not; `Full` hashes the sorted concatenation
/// of all contained file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirHashPolicy {
    Simplified,
    Full,
}

/// Per-kind staleness check switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckPolicy {
    /// Compare the stored task signature.
    pub signature: bool,
    /// Compare the stored code hash.
    pub code: bool,
    /// Compare the stored dependency hash.
    pub inputs: bool,
    /// Hash produced artifact bytes (else the `"0"` sentinel is recorded).
    pub outputs: bool,
    /// Directory output hashing policy.
    pub dir_hash: DirHashPolicy,
}

impl Default for CheckPolicy {
    fn default() -> Self {
        Self {
            signature: true,
            code: true,
            inputs: true,
            outputs: true,
            dir_hash: DirHashPolicy::Full,
        }
    }
}

/// A unit of work whose outputs are subject to staleness tracking.
///
/// `requires` and `outputs` are concrete obligations of every
/// implementation; no defaulting is inferred from the type.
pub trait Task {
    /// Task kind name, e.g. `Compile`.
    fn kind(&self) -> &str;

    /// The *significant* parameters, in any order.
    fn params(&self) -> Vec<Param>;

    /// Textual source of the task's primary executable routine, or `None`
    /// when it cannot be introspected. With code checking enabled, `None`
    /// makes fingerprinting fail.
    fn source(&self) -> Option<String>;

    /// Direct input artifacts.
    fn requires(&self) -> Vec<Artifact>;

    /// Artifacts this task produces.
    fn outputs(&self) -> Vec<Artifact>;

    /// Staleness check switches for this kind.
    fn checks(&self) -> CheckPolicy {
        CheckPolicy::default()
    }
}

/// Derived identity of a task instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIdentity {
    /// Human-readable signature, `Kind(name=value, ...)`.
    pub signature: String,
    /// Tagged identity string, `Kind(name=tag:payload, ...)`.
    pub identity: String,
    /// Short hex id derived from the identity string.
    pub short_id: String,
}

impl TaskIdentity {
    /// Derive the identity of a task from its kind and significant
    /// parameters. Deterministic across processes for equal parameters.
    pub fn of(task: &dyn Task) -> Self {
        let signature = signature_of(task);
        let identity = identity_string(task);
        let mut short_id = sha256_hex(identity.as_bytes());
        short_id.truncate(SHORT_ID_LEN);
        Self {
            signature,
            identity,
            short_id,
        }
    }

    /// Canonical cache key for task-level entries (completion booleans).
    pub fn cache_key(&self) -> String {
        format!("task:{}", self.identity)
    }
}

fn sorted_params(task: &dyn Task) -> Vec<Param> {
    let mut params = task.params();
    params.sort_by(|a, b| a.name.cmp(&b.name));
    params
}

/// The task signature: kind name plus `name=value` pairs sorted by name,
/// values in their short human form. `Kind()` when signature checking is
/// disabled for the kind.
pub fn signature_of(task: &dyn Task) -> String {
    if !task.checks().signature {
        return format!("{}()", task.kind());
    }
    let parts: Vec<String> = sorted_params(task)
        .iter()
        .map(|p| format!("{}={}", p.name, p.value.short()))
        .collect();
    format!("{}({})", task.kind(), parts.join(", "))
}

/// The tagged identity string. Unlike the signature this always carries
/// every significant parameter, regardless of the check policy.
pub fn identity_string(task: &dyn Task) -> String {
    let parts: Vec<String> = sorted_params(task)
        .iter()
        .map(|p| format!("{}={}", p.name, p.value.tagged()))
        .collect();
    format!("{}({})", task.kind(), parts.join(", "))
}
