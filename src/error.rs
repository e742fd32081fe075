//! Unified error type.

/// The error type returned by the crate's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding a port, accepting a connection, or
/// building and registering instruments.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// An instrument could not be built, or its name collides with one
    /// already present in the target registry.
    #[error("metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}
