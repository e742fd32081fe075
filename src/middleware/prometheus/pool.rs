//! Request snapshots and the pool that recycles them.

use http::header::HOST;
use http::{HeaderMap, Method, Uri};
use parking_lot::Mutex;

use crate::request::Request;

/// The request facts size estimation needs, detached from the live request
/// so the handler can consume the request while estimation runs elsewhere.
#[derive(Debug, Default)]
pub struct RequestSnapshot {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Declared body length; `None` when unknown.
    pub content_length: Option<u64>,
}

impl RequestSnapshot {
    /// Overwrites this snapshot with `req`, reusing the header storage.
    pub fn copy_from(&mut self, req: &Request) {
        self.method.clone_from(req.method());
        self.uri.clone_from(req.uri());
        self.headers.clear();
        self.headers.reserve(req.headers().len());
        for (name, value) in req.headers() {
            self.headers.append(name.clone(), value.clone());
        }
        self.content_length = req.content_length();
    }

    /// Host as seen by the server: the request-target authority when the
    /// client sent an absolute URI, otherwise the `Host` header.
    pub fn host(&self) -> &str {
        self.uri
            .host()
            .or_else(|| self.headers.get(HOST).and_then(|v| v.to_str().ok()))
            .unwrap_or("")
    }

    fn reset(&mut self) {
        self.method = Method::default();
        self.uri = Uri::default();
        self.headers.clear();
        self.content_length = None;
    }
}

/// Default number of idle snapshots a pool keeps.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// A bounded free list of [`RequestSnapshot`]s shared by all in-flight
/// requests.
///
/// Snapshots move in and out by value, so no two owners ever hold the same
/// one. Acquiring from an empty pool allocates; releasing into a full pool
/// drops the snapshot.
pub struct SnapshotPool {
    free: Mutex<Vec<Box<RequestSnapshot>>>,
    capacity: usize,
}

impl SnapshotPool {
    pub fn new(capacity: usize) -> Self {
        Self { free: Mutex::new(Vec::with_capacity(capacity)), capacity }
    }

    /// A recycled snapshot if one is idle, else a fresh zero-valued one.
    pub fn acquire(&self) -> Box<RequestSnapshot> {
        self.free.lock().pop().unwrap_or_default()
    }

    /// Resets `snapshot` and makes it available to the next acquirer.
    pub fn release(&self, mut snapshot: Box<RequestSnapshot>) {
        snapshot.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(snapshot);
        }
    }

    /// Number of idle snapshots.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for SnapshotPool {
    fn default() -> Self { Self::new(DEFAULT_POOL_CAPACITY) }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;

    fn request() -> Request {
        Request::from(
            http::Request::post("/upload?x=1")
                .header("host", "example.com")
                .header("content-length", "12")
                .header("x-test", "abc")
                .body(Bytes::new())
                .unwrap(),
        )
    }

    #[test]
    fn empty_pool_hands_out_zero_valued_snapshots() {
        let pool = SnapshotPool::default();
        let snap = pool.acquire();
        assert_eq!(snap.method, Method::GET);
        assert_eq!(snap.uri, Uri::default());
        assert!(snap.headers.is_empty());
        assert_eq!(snap.content_length, None);
    }

    #[test]
    fn copy_from_detaches_request_facts() {
        let mut snap = RequestSnapshot::default();
        snap.copy_from(&request());

        assert_eq!(snap.method, Method::POST);
        assert_eq!(snap.uri.path(), "/upload");
        assert_eq!(snap.headers["x-test"], "abc");
        assert_eq!(snap.content_length, Some(12));
        assert_eq!(snap.host(), "example.com");
    }

    #[test]
    fn release_then_acquire_reuses_a_reset_snapshot() {
        let pool = SnapshotPool::default();
        let mut snap = pool.acquire();
        snap.copy_from(&request());
        let addr: *const RequestSnapshot = &*snap;

        pool.release(snap);
        let again = pool.acquire();

        assert!(std::ptr::eq(addr, &*again));
        assert_eq!(again.method, Method::GET);
        assert!(again.headers.is_empty());
        assert_eq!(again.content_length, None);
    }

    #[test]
    fn full_pool_drops_released_snapshots() {
        let pool = SnapshotPool::new(1);
        pool.release(Box::default());
        pool.release(Box::default());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn concurrent_acquire_release_never_shares_a_snapshot() {
        let pool = Arc::new(SnapshotPool::new(4));
        let held = Arc::new(Mutex::new(HashSet::new()));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let held = Arc::clone(&held);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let snap = pool.acquire();
                        let addr = &*snap as *const RequestSnapshot as usize;
                        assert!(held.lock().insert(addr), "snapshot handed out twice");
                        std::thread::yield_now();
                        held.lock().remove(&addr);
                        pool.release(snap);
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert!(pool.idle() <= 4);
    }
}
