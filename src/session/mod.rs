//! The build session: explicit context owned by one build.
//!
//! The session holds the record store and the cache handle every caller
//! goes through. When cache service coordinates are declared in the
//! environment the handle is a client for that shared service; otherwise
//! it is a private in-process memo, which is still correct, just unshared.
//! A session can also host the service itself for the life of the build;
//! the server socket is a scoped resource released when the session drops.
//!
//! Cache entries are an optimization only: deleting all of them never
//! changes a staleness or completion answer, only its cost.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use kiln_cached::{CacheClient, CacheServer};

use crate::artifact::Artifact;
use crate::error::{KilnError, KilnResult};
use crate::fingerprint::{self, Fingerprint};
use crate::record::{Record, RecordStore};
use crate::stale;
use crate::task::{Task, TaskIdentity};

/// Context object for one build, handed to all callers.
pub struct BuildSession {
    store: RecordStore,
    client: Option<CacheClient>,
    memo: Mutex<HashMap<String, serde_json::Value>>,
    server: Option<CacheServer>,
}

impl BuildSession {
    /// Create a session with the default metadata root, discovering cache
    /// service coordinates from the environment.
    pub fn new() -> Self {
        Self::with_meta_root(RecordStore::DEFAULT_META_ROOT)
    }

    /// Create a session with an explicit metadata root, discovering cache
    /// service coordinates from the environment.
    pub fn with_meta_root(meta_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: RecordStore::new(meta_root),
            client: CacheClient::from_env(),
            memo: Mutex::new(HashMap::new()),
            server: None,
        }
    }

    /// Create a session talking to an explicitly located cache service.
    pub fn with_cache_client(
        meta_root: impl Into<std::path::PathBuf>,
        client: CacheClient,
    ) -> Self {
        Self {
            store: RecordStore::new(meta_root),
            client: Some(client),
            memo: Mutex::new(HashMap::new()),
            server: None,
        }
    }

    /// Start a cache service owned by this session, publish its
    /// coordinates to the process environment, and use it from here on.
    ///
    /// The service lives until the session is dropped.
    pub fn serve_shared_cache(&mut self) -> std::io::Result<SocketAddr> {
        let server = CacheServer::start()?;
        server.export_coordinates();
        let addr = server.addr();
        self.client = Some(CacheClient::new(addr.ip().to_string(), addr.port()));
        self.server = Some(server);
        Ok(addr)
    }

    /// Whether this session shares results through a cache service.
    pub fn has_shared_cache(&self) -> bool {
        self.client.is_some()
    }

    /// The on-disk record store.
    pub fn record_store(&self) -> &RecordStore {
        &self.store
    }

    /// Read an artifact's record: the cache entry when present (shared
    /// service or local memo, whichever this session uses), else disk,
    /// populating the cache on a disk hit. `None` when absent everywhere.
    pub fn read_record(&self, artifact: &Artifact) -> KilnResult<Option<Record>> {
        let key = artifact.cache_key();
        if let Some(value) = self.cache_fetch(&key)? {
            match serde_json::from_value::<Record>(value) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    // A malformed cache entry reads as absent; disk is
                    // authoritative.
                    tracing::debug!(%key, error = %e, "discarding malformed cached record");
                }
            }
        }
        match self.store.read(artifact) {
            Some(record) => {
                self.cache_store(&key, record_value(&record)?)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Persist an artifact's record and refresh the cache entry.
    pub fn write_record(&self, artifact: &Artifact, fingerprint: &Fingerprint) -> KilnResult<()> {
        let record = Record::new(fingerprint.clone());
        self.store.write(artifact, &record)?;
        self.cache_store(&artifact.cache_key(), record_value(&record)?)
    }

    /// Decide whether an artifact must be rebuilt. See [`stale::is_stale`].
    pub fn is_stale(
        &self,
        task: &dyn Task,
        artifact: &Artifact,
        recompute_output: bool,
    ) -> KilnResult<bool> {
        stale::is_stale(self, task, artifact, recompute_output)
    }

    /// Whether the task's outputs are all present and not stale.
    ///
    /// The answer is memoized under the task's cache key. A cached `true`
    /// is only trusted while every output still exists on disk; if one was
    /// externally deleted the entry is removed and the answer recomputed.
    /// A task with no outputs is never complete.
    pub fn is_complete(&self, task: &dyn Task) -> KilnResult<bool> {
        let identity = TaskIdentity::of(task);
        let key = identity.cache_key();
        let outputs = task.outputs();

        if let Some(value) = self.cache_fetch(&key)? {
            if let Some(done) = value.as_bool() {
                if !done {
                    return Ok(false);
                }
                if outputs.iter().all(Artifact::exists) {
                    return Ok(true);
                }
                tracing::debug!(
                    task = %identity.signature,
                    "cached completion refers to a missing output, recomputing"
                );
                self.cache_remove(&key)?;
            }
        }

        if outputs.is_empty() {
            return self.write_completion(&key, false);
        }
        self.regenerate_missing_records(task, &outputs)?;
        for artifact in &outputs {
            if stale::is_stale(self, task, artifact, false)? {
                return self.write_completion(&key, false);
            }
        }
        self.write_completion(&key, true)
    }

    /// Pessimistically drop the cached completion and record entries for a
    /// task. Must be called (and acknowledged) before the task is asked to
    /// run, and again on its failure path so an aborted run never leaves a
    /// stored `true` pointing at incomplete output.
    pub fn invalidate(&self, task: &dyn Task) -> KilnResult<()> {
        let identity = TaskIdentity::of(task);
        self.cache_remove(&identity.cache_key())?;
        for artifact in task.outputs() {
            self.cache_remove(&artifact.cache_key())?;
        }
        tracing::debug!(task = %identity.signature, "cache entries invalidated");
        Ok(())
    }

    /// Rewrite records for outputs that exist on disk without one, from
    /// current disk state, instead of forcing a rerun.
    fn regenerate_missing_records(
        &self,
        task: &dyn Task,
        outputs: &[Artifact],
    ) -> KilnResult<()> {
        for artifact in outputs {
            if artifact.exists() && !self.store.exists(artifact) {
                tracing::debug!(
                    path = %artifact.path().display(),
                    "record regenerated for existing artifact"
                );
                let fingerprint = fingerprint::current(self, task, artifact)?;
                self.write_record(artifact, &fingerprint)?;
            }
        }
        Ok(())
    }

    fn write_completion(&self, key: &str, done: bool) -> KilnResult<bool> {
        self.cache_store(key, serde_json::Value::Bool(done))?;
        Ok(done)
    }

    /// Look a key up: the shared service when configured (an unreachable
    /// declared service is fatal, never treated as absent), the local memo
    /// otherwise. The memo is never consulted alongside a shared service;
    /// a value it held could outlive another session's acknowledged
    /// removal.
    fn cache_fetch(&self, key: &str) -> KilnResult<Option<serde_json::Value>> {
        match &self.client {
            Some(client) => Ok(client.fetch(key)?),
            None => Ok(self.memo_lock().get(key).cloned()),
        }
    }

    fn cache_store(&self, key: &str, value: serde_json::Value) -> KilnResult<()> {
        match &self.client {
            Some(client) => client.store(key, value)?,
            None => {
                self.memo_lock().insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    fn cache_remove(&self, key: &str) -> KilnResult<()> {
        match &self.client {
            Some(client) => client.remove(key)?,
            None => {
                self.memo_lock().remove(key);
            }
        }
        Ok(())
    }

    fn memo_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, serde_json::Value>> {
        match self.memo.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for BuildSession {
    fn default() -> Self {
        Self::new()
    }
}

fn record_value(record: &Record) -> KilnResult<serde_json::Value> {
    serde_json::to_value(record).map_err(|e| {
        KilnError::Filesystem(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("failed to serialize record for caching: {}", e),
        ))
    })
}
