//! Shared test fixtures: a configurable file-producing task.

use std::path::PathBuf;

use kiln::{
    publish, Artifact, BuildSession, CheckPolicy, KilnError, KilnResult, Param, ParamValue, Task,
    TaskIdentity,
};

/// A task fixture whose identity, source, inputs, and checks can all be
/// varied per scenario. Its "run" writes given bytes to its output.
pub struct ScriptTask {
    pub kind: String,
    pub params: Vec<Param>,
    pub source: String,
    pub inputs: Vec<Artifact>,
    pub out: PathBuf,
    pub checks: CheckPolicy,
}

impl ScriptTask {
    pub fn new(kind: &str, out: impl Into<PathBuf>) -> Self {
        Self {
            kind: kind.to_string(),
            params: vec![Param::new("rev", ParamValue::Int(1))],
            source: "fn task() { emit() }".to_string(),
            inputs: Vec::new(),
            out: out.into(),
            checks: CheckPolicy::default(),
        }
    }

    pub fn artifact(&self) -> Artifact {
        Artifact::produced_by(&TaskIdentity::of(self), &self.out)
    }

    /// Run the task the way the orchestration layer would: invalidate the
    /// cached completion first, then atomically publish the output.
    pub fn run(&self, session: &BuildSession, content: &[u8]) -> KilnResult<()> {
        session.invalidate(self)?;
        publish::stage(session, self, &self.artifact(), |tmp| {
            std::fs::write(tmp, content).map_err(KilnError::from)
        })
    }
}

impl Task for ScriptTask {
    fn kind(&self) -> &str {
        &self.kind
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
