//! Prometheus request instrumentation.
//!
//! [`Prometheus`] owns the request instruments. [`Prometheus::wrap_handler`]
//! mounts the scrape endpoint on a [`Router`] and returns an
//! [`InstrumentedHandler`], the service the server runs.
//!
//! ```rust,no_run
//! use tsu_prometheus::middleware::prometheus::Prometheus;
//! use tsu_prometheus::{Request, Response, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new().get("/hello", hello);
//!     let handler = Prometheus::builder().subsystem("api").build().wrap_handler(app);
//!
//!     Server::bind("0.0.0.0:3000").serve(handler).await.unwrap();
//! }
//!
//! async fn hello(_req: Request) -> Response { Response::text("hi") }
//! ```
//!
//! # Per request
//!
//! 1. The concurrency gauge goes up; a drop guard brings it back down
//!    however the request ends.
//! 2. Scrape requests go straight to the router and are not measured.
//!    The match is on path alone, so any method at the metrics path (a
//!    `POST /metrics` answered with 404, say) is not measured either.
//! 3. The request is copied into a pooled snapshot and a background task
//!    starts estimating its size.
//! 4. The router runs the handler, timed.
//! 5. Duration, count, and response size are recorded under
//!    `(code, method, endpoint)`; then the size estimate is awaited and
//!    recorded.
//!
//! Only work done inside the handler's future is covered by the gauge. Tasks
//! a handler spawns and detaches are not.

mod metrics;
mod pool;
mod registry;
mod size;
mod summary;

use std::sync::Arc;
use std::time::Instant;

use prometheus::{Encoder, Registry, TextEncoder};
use tracing::error;

pub use metrics::{DURATION_BUCKETS, MetricSet};
pub use pool::{DEFAULT_POOL_CAPACITY, RequestSnapshot, SnapshotPool};
pub use registry::default_registry;
pub use size::{SizeEstimate, approximate_request_size};
pub use summary::Summary;

use crate::error::Error;
use crate::handler::{BoxFuture, Service};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use metrics::InFlight;

/// Default path of the scrape endpoint.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

// ── Prometheus ────────────────────────────────────────────────────────────────

/// Registered request instruments plus the settings they were built with.
///
/// Configuration is fixed once built. Create one per registry: a second
/// instance against the same registry collides on instrument names.
pub struct Prometheus {
    metrics: MetricSet,
    registry: Registry,
    pool: Arc<SnapshotPool>,
    metrics_path: String,
}

impl Prometheus {
    /// Defaults everywhere: `/metrics`, no subsystem, the process-wide
    /// [`default_registry`].
    ///
    /// # Panics
    ///
    /// Panics if the default registry already holds these instrument names.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PrometheusBuilder {
        PrometheusBuilder::default()
    }

    pub fn metrics(&self) -> &MetricSet { &self.metrics }
    pub fn registry(&self) -> &Registry { &self.registry }
    pub fn metrics_path(&self) -> &str { &self.metrics_path }

    /// Mounts `GET <metrics_path>` on `router` and wraps it.
    ///
    /// The returned handler is meant to be the server's only entry point.
    ///
    /// # Panics
    ///
    /// Panics if `router` already has a `GET` route at the metrics path.
    pub fn wrap_handler(&self, router: Router) -> InstrumentedHandler {
        let registry = self.registry.clone();
        let router = router.get(&self.metrics_path, move |_req: Request| {
            let registry = registry.clone();
            async move { scrape(&registry) }
        });

        InstrumentedHandler {
            inner: Arc::new(Inner {
                router,
                metrics: self.metrics.clone(),
                pool: Arc::clone(&self.pool),
                metrics_path: self.metrics_path.clone(),
            }),
        }
    }
}

impl Default for Prometheus {
    fn default() -> Self { Self::new() }
}

/// Renders `registry` in the Prometheus text exposition format.
fn scrape(registry: &Registry) -> Response {
    let encoder = TextEncoder::new();
    let mut body = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut body) {
        error!(error = %e, "failed to encode metrics");
        return Response::status(http::StatusCode::INTERNAL_SERVER_ERROR);
    }
    Response::builder().bytes(encoder.format_type(), body)
}

// ── PrometheusBuilder ─────────────────────────────────────────────────────────

/// Configures a [`Prometheus`] before its instruments are registered.
///
/// ```rust
/// use prometheus::Registry;
/// use tsu_prometheus::middleware::prometheus::Prometheus;
///
/// let prom = Prometheus::builder()
///     .registry(Registry::new())
///     .subsystem("api")
///     .metrics_path("/internal/metrics")
///     .build();
/// assert_eq!(prom.metrics_path(), "/internal/metrics");
/// ```
pub struct PrometheusBuilder {
    registry: Option<Registry>,
    subsystem: Option<String>,
    metrics_path: String,
    pool_capacity: usize,
}

impl Default for PrometheusBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            subsystem: None,
            metrics_path: DEFAULT_METRICS_PATH.to_owned(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl PrometheusBuilder {
    /// Register into `registry` instead of the process-wide default. The
    /// handle is shared: the caller's clone sees every instrument.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Prefix every instrument name with `<subsystem>_`.
    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    /// Serve the scrape endpoint at `path`. Defaults to `/metrics`.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = path.into();
        self
    }

    /// How many idle request snapshots to keep for reuse.
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Builds and registers the instruments.
    ///
    /// # Errors
    ///
    /// [`Error::Metrics`] if an instrument name is invalid or already
    /// registered in the target registry.
    pub fn try_build(self) -> Result<Prometheus, Error> {
        let registry = self.registry.unwrap_or_else(|| default_registry().clone());
        let metrics = MetricSet::new(self.subsystem.as_deref())?;
        metrics.register(&registry)?;

        Ok(Prometheus {
            metrics,
            registry,
            pool: Arc::new(SnapshotPool::new(self.pool_capacity)),
            metrics_path: self.metrics_path,
        })
    }

    /// Builds and registers the instruments.
    ///
    /// # Panics
    ///
    /// Panics where [`try_build`](Self::try_build) would fail. A name
    /// collision is a startup misconfiguration, not something to run with.
    pub fn build(self) -> Prometheus {
        self.try_build()
            .unwrap_or_else(|e| panic!("failed to register request instruments: {e}"))
    }
}

// ── InstrumentedHandler ───────────────────────────────────────────────────────

/// A [`Router`] that records request metrics around every dispatch.
///
/// Cheap to clone; clones share the router, instruments, and snapshot pool.
#[derive(Clone)]
pub struct InstrumentedHandler {
    inner: Arc<Inner>,
}

struct Inner {
    router: Router,
    metrics: MetricSet,
    pool: Arc<SnapshotPool>,
    metrics_path: String,
}

impl InstrumentedHandler {
    pub fn metrics(&self) -> &MetricSet { &self.inner.metrics }
}

impl Service for InstrumentedHandler {
    fn call(&self, req: Request) -> BoxFuture {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.handle(req).await })
    }
}

impl Inner {
    async fn handle(&self, req: Request) -> Response {
        let _in_flight = InFlight::enter(self.metrics.in_flight());

        if req.path() == self.metrics_path {
            return self.router.dispatch(req).await;
        }

        let mut snapshot = self.pool.acquire();
        snapshot.copy_from(&req);
        let request_size = SizeEstimate::spawn(snapshot, Arc::clone(&self.pool));

        let method = req.method().clone();
        let endpoint = req.path().to_owned();

        let start = Instant::now();
        let response = self.router.dispatch(req).await;
        let elapsed = start.elapsed().as_secs_f64();

        self.metrics.observe_response(
            response.status_code(),
            &method,
            &endpoint,
            elapsed,
            response.body().len(),
        );
        self.metrics.observe_request_size(request_size.wait().await);

        response
    }
}
