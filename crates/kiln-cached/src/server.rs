//! The cache service itself: a loopback TCP server holding one key space.
//!
//! The server binds a randomly chosen loopback address (`127.x.y.z:0`) at
//! startup so that concurrent unrelated builds on one host cannot collide,
//! accepts connections for the life of the build, and is torn down when the
//! owning handle is dropped. The key space is a single map guarded by a
//! mutex; operations on the same key are linearizable.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rand::Rng;

use kiln_protocol::{CacheError, CacheOp, CacheRequest, CacheResponse, PROTOCOL_VERSION};

use crate::{ENV_CACHE_ADDR, ENV_CACHE_PORT};

type KeySpace = Arc<Mutex<HashMap<String, serde_json::Value>>>;

/// Handle to a running cache service.
///
/// The underlying socket is a scoped resource: dropping the handle shuts
/// the service down and releases it. Entries do not persist past the
/// service lifetime.
pub struct CacheServer {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl CacheServer {
    /// Bind a random loopback address and start serving.
    pub fn start() -> std::io::Result<Self> {
        let mut rng = rand::thread_rng();
        let ip = Ipv4Addr::new(
            127,
            rng.gen_range(1..=251),
            rng.gen_range(1..=251),
            rng.gen_range(1..=251),
        );
        let listener = TcpListener::bind((ip, 0))?;
        let addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let store: KeySpace = Arc::new(Mutex::new(HashMap::new()));

        let accept_shutdown = Arc::clone(&shutdown);
        let accept_thread = std::thread::spawn(move || {
            for stream in listener.incoming() {
                if accept_shutdown.load(Ordering::SeqCst) {
                    break;
                }
                let stream = match stream {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                let store = Arc::clone(&store);
                std::thread::spawn(move || serve_connection(stream, store));
            }
        });

        tracing::debug!(%addr, "cache service started");

        Ok(Self {
            addr,
            shutdown,
            accept_thread: Some(accept_thread),
        })
    }

    /// The address the service is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Publish this service's coordinates to the process environment so
    /// that spawned worker processes inherit them.
    pub fn export_coordinates(&self) {
        std::env::set_var(ENV_CACHE_ADDR, self.addr.ip().to_string());
        std::env::set_var(ENV_CACHE_PORT, self.addr.port().to_string());
    }

    /// Remove this service's coordinates from the process environment.
    pub fn clear_coordinates() {
        std::env::remove_var(ENV_CACHE_ADDR);
        std::env::remove_var(ENV_CACHE_PORT);
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Unblock the accept loop with one last connection.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
        tracing::debug!(addr = %self.addr, "cache service stopped");
    }
}

impl Drop for CacheServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Serve one client connection: requests in, responses out, line by line,
/// until the peer disconnects.
fn serve_connection(stream: TcpStream, store: KeySpace) {
    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(_) => return,
    };
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match CacheRequest::from_line(&line) {
            Ok(request) => dispatch(&request, &store),
            Err(e) => CacheResponse::error(String::new(), CacheError::invalid_request(e.to_string())),
        };

        let payload = match response.to_line() {
            Ok(p) => p,
            Err(_) => break,
        };
        if writer.write_all(payload.as_bytes()).is_err() || writer.flush().is_err() {
            break;
        }
    }
}

/// Apply one request against the key space.
fn dispatch(request: &CacheRequest, store: &KeySpace) -> CacheResponse {
    if request.protocol_version != PROTOCOL_VERSION {
        return CacheResponse::error(
            request.request_id.clone(),
            CacheError::unsupported_protocol(request.protocol_version, PROTOCOL_VERSION),
        );
    }

    let mut entries = match store.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    match request.op {
        CacheOp::Fetch => match entries.get(&request.key) {
            Some(value) => CacheResponse::hit(request.request_id.clone(), value.clone()),
            None => CacheResponse::miss(request.request_id.clone()),
        },
        CacheOp::Store => match &request.value {
            Some(value) => {
                entries.insert(request.key.clone(), value.clone());
                CacheResponse::ack(request.request_id.clone())
            }
            None => CacheResponse::error(
                request.request_id.clone(),
                CacheError::missing_value(&request.key),
            ),
        },
        CacheOp::Remove => {
            entries.remove(&request.key);
            CacheResponse::ack(request.request_id.clone())
        }
    }
}
