//! Wire protocol for the Kiln cache service.
//!
//! The cache service speaks a line-delimited JSON protocol over TCP: each
//! request is a single JSON object on one line, answered by a single JSON
//! response line. Three operations exist: `fetch`, `store`, and `remove`,
//! all addressed by a textual key. Values are opaque JSON payloads; the
//! service enforces no schema on them.

mod error;
mod request;
mod response;

pub use error::{CacheError, CacheErrorCode, ProtocolError};
pub use request::{CacheOp, CacheRequest};
pub use response::CacheResponse;

/// Current protocol version. Requests carrying a different version are
/// rejected with `UNSUPPORTED_PROTOCOL`.
pub const PROTOCOL_VERSION: i32 = 1;
