//! Middleware layer.
//!
//! Middleware wraps a [`Router`](crate::Router) and is the right place for
//! cross-cutting concerns that apply to every request regardless of route.
//!
//! Built-in middleware:
//! - [`prometheus`]: request count, latency, size, and concurrency metrics
//!   plus a scrape endpoint in the Prometheus text format

pub mod prometheus;
