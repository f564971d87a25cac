//! Kiln incremental staleness core.
//!
//! Given a task that produces one or more artifacts, decide whether those
//! artifacts are already up to date (skip) or must be regenerated, and
//! share that decision cheaply across concurrently running worker
//! processes. The pieces:
//!
//! - [`task`]: the polymorphic task abstraction and identity derivation;
//! - [`fingerprint`]: task signature, code, dependency, and output hashes;
//! - [`record`]: the persisted per-artifact metadata record and its store;
//! - [`stale`]: the ordered staleness checks;
//! - [`publish`]: scoped publish-then-record output writing;
//! - [`session`]: the per-build context owning the cache handle.
//!
//! Scheduling, retries, and worker lifecycles belong to the surrounding
//! orchestration framework, not this crate.

pub mod artifact;
pub mod error;
pub mod fingerprint;
pub mod publish;
pub mod record;
pub mod session;
pub mod stale;
pub mod task;

pub use artifact::Artifact;
pub use error::{KilnError, KilnResult};
pub use fingerprint::{Fingerprint, HASH_DISABLED};
pub use record::{Record, RecordStore};
pub use session::BuildSession;
pub use stale::is_stale;
pub use task::{CheckPolicy, DirHashPolicy, Param, ParamValue, Task, TaskIdentity};
