//! Shared build-cache service for Kiln workers.
//!
//! Many worker processes executing the same task graph concurrently share
//! staleness and completion results through a small key-value service bound
//! to a random loopback address. The service's coordinates travel to worker
//! processes through two environment variables; their absence is the
//! explicit signal that no shared cache exists, in which case each process
//! falls back to a private in-process memo (still correct, just unshared).

mod client;
mod server;

pub use client::{CacheClient, CacheClientError};
pub use server::CacheServer;

/// Environment variable carrying the cache service IP address.
pub const ENV_CACHE_ADDR: &str = "KILN_CACHE_ADDR";

/// Environment variable carrying the cache service port.
pub const ENV_CACHE_PORT: &str = "KILN_CACHE_PORT";

/// Read the declared cache service coordinates from the environment.
///
/// Returns `None` when either variable is absent or the port does not
/// parse, which callers must treat as "no shared cache exists".
pub fn declared_coordinates() -> Option<(String, u16)> {
    let addr = std::env::var(ENV_CACHE_ADDR).ok()?;
    let port = std::env::var(ENV_CACHE_PORT).ok()?.parse().ok()?;
    Some((addr, port))
}

/// Whether a shared cache service has been declared for this process.
pub fn is_available() -> bool {
    declared_coordinates().is_some()
}
