//! Approximate request size, computed off the serving path.
//!
//! The estimate is the length of the request line and headers as they
//! would appear on the wire, plus the declared body length:
//!
//! ```text
//! path + host + method + len("HTTP/1.1") + Σ(name + value) + content-length
//! ```
//!
//! `Host` is skipped in the header sum because it is already counted as the
//! host, and `Content-Length` because the body length it declares is.

use std::sync::Arc;

use http::header::{CONTENT_LENGTH, HOST};
use tokio::sync::oneshot;

use super::pool::{RequestSnapshot, SnapshotPool};

const PROTOCOL_VERSION: &str = "HTTP/1.1";

/// Approximate wire size of the request captured in `snapshot`, in bytes.
pub fn approximate_request_size(snapshot: &RequestSnapshot) -> u64 {
    let mut size = snapshot.uri.path().len() + snapshot.host().len();
    size += snapshot.method.as_str().len();
    size += PROTOCOL_VERSION.len();

    size += snapshot.headers.iter()
        .filter(|(name, _)| **name != HOST && **name != CONTENT_LENGTH)
        .map(|(name, value)| name.as_str().len() + value.len())
        .sum::<usize>();

    (size as u64).saturating_add(snapshot.content_length.unwrap_or(0))
}

/// The pending result of one size estimate.
///
/// Must be awaited exactly once, after the wrapped handler has returned.
pub struct SizeEstimate {
    rx: oneshot::Receiver<u64>,
}

impl SizeEstimate {
    /// Hands `snapshot` to a background task that computes its size, then
    /// returns the snapshot to `pool`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(snapshot: Box<RequestSnapshot>, pool: Arc<SnapshotPool>) -> Self {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let size = approximate_request_size(&snapshot);
            pool.release(snapshot);
            // The receiver is gone only if the request itself was dropped.
            let _ = tx.send(size);
        });
        Self { rx }
    }

    /// Waits for the estimate.
    ///
    /// # Panics
    ///
    /// Panics if the estimating task ended without reporting, which only
    /// happens if it panicked.
    pub async fn wait(self) -> u64 {
        self.rx.await.expect("request size estimator exited without a result")
    }
}
