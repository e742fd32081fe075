//! The five request instruments and their registration.
//!
//! | Name | Type | Labels |
//! |---|---|---|
//! | `requests_total` | counter | `code`, `method`, `endpoint` |
//! | `request_duration_seconds` | histogram | `code`, `method`, `endpoint` |
//! | `request_size_bytes` | summary | |
//! | `response_size_bytes` | summary | |
//! | `concurrent_requests` | gauge | |
//!
//! Every name is prefixed with `<subsystem>_` when a subsystem is set.
//! Endpoint labels are recorded verbatim; routes with path parameters
//! produce one series per concrete path.

use http::{Method, StatusCode};
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};
use tracing::debug;

use super::summary::Summary;
use crate::error::Error;

/// Upper bounds, in seconds, of the request duration histogram buckets.
pub const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0,
];

const LABELS: &[&str] = &["code", "method", "endpoint"];

/// Request instruments shared by every in-flight request.
///
/// Clones are cheap and observe into the same series.
#[derive(Clone)]
pub struct MetricSet {
    requests: IntCounterVec,
    duration: HistogramVec,
    request_size: Summary,
    response_size: Summary,
    in_flight: IntGauge,
}

impl MetricSet {
    /// Builds the instruments, prefixing names with `subsystem` if given.
    /// Nothing is registered yet.
    pub fn new(subsystem: Option<&str>) -> Result<Self, Error> {
        let opts = |name: &str, help: &str| {
            let opts = Opts::new(name, help);
            match subsystem {
                Some(sub) => opts.subsystem(sub),
                None => opts,
            }
        };

        let requests = IntCounterVec::new(
            opts("requests_total", "The HTTP request counts processed."),
            LABELS,
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::from(opts("request_duration_seconds", "The HTTP request duration in seconds."))
                .buckets(DURATION_BUCKETS.to_vec()),
            LABELS,
        )?;
        let request_size = Summary::with_opts(opts("request_size_bytes", "The HTTP request sizes in bytes."))?;
        let response_size = Summary::with_opts(opts("response_size_bytes", "The HTTP response sizes in bytes."))?;
        let in_flight = IntGauge::with_opts(opts("concurrent_requests", "Number of concurrent HTTP requests"))?;

        Ok(Self { requests, duration, request_size, response_size, in_flight })
    }

    /// Registers all five instruments with `registry`.
    ///
    /// Fails with [`prometheus::Error::AlreadyReg`] when any name is already
    /// taken. Instruments registered before the collision stay registered.
    pub fn register(&self, registry: &Registry) -> Result<(), Error> {
        registry.register(Box::new(self.in_flight.clone()))?;
        registry.register(Box::new(self.requests.clone()))?;
        registry.register(Box::new(self.duration.clone()))?;
        registry.register(Box::new(self.request_size.clone()))?;
        registry.register(Box::new(self.response_size.clone()))?;
        debug!("registered request instruments");
        Ok(())
    }

    /// Records one finished request into all instruments except the
    /// concurrency gauge.
    pub fn record(
        &self,
        status: StatusCode,
        method: &Method,
        endpoint: &str,
        elapsed_secs: f64,
        response_size: usize,
        request_size: u64,
    ) {
        self.observe_response(status, method, endpoint, elapsed_secs, response_size);
        self.observe_request_size(request_size);
    }

    /// Duration and count under `(status, method, endpoint)`, then the
    /// response size.
    pub fn observe_response(
        &self,
        status: StatusCode,
        method: &Method,
        endpoint: &str,
        elapsed_secs: f64,
        response_size: usize,
    ) {
        let labels = [status.as_str(), method.as_str(), endpoint];
        self.duration.with_label_values(&labels).observe(elapsed_secs);
        self.requests.with_label_values(&labels).inc();
        self.response_size.observe(response_size as f64);
    }

    pub fn observe_request_size(&self, request_size: u64) {
        self.request_size.observe(request_size as f64);
    }

    pub fn requests(&self) -> &IntCounterVec { &self.requests }
    pub fn duration(&self) -> &HistogramVec { &self.duration }
    pub fn request_size(&self) -> &Summary { &self.request_size }
    pub fn response_size(&self) -> &Summary { &self.response_size }
    pub fn in_flight(&self) -> &IntGauge { &self.in_flight }
}

/// Holds one unit of the concurrency gauge for as long as it lives.
///
/// Dropping it, whether the request finished, unwound from a panic, or was
/// cancelled, gives the unit back.
pub(crate) struct InFlight(IntGauge);

impl InFlight {
    pub(crate) fn enter(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self(gauge.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use prometheus::core::Collector;

    use super::*;

    fn names(registry: &Registry) -> Vec<String> {
        registry.gather().iter().map(|mf| mf.get_name().to_owned()).collect()
    }

    #[test]
    fn record_counts_once_under_label_tuple() {
        let metrics = MetricSet::new(None).unwrap();
        metrics.record(StatusCode::OK, &Method::GET, "/x", 0.02, 11, 40);

        assert_eq!(metrics.requests().with_label_values(&["200", "GET", "/x"]).get(), 1);
        let hist = metrics.duration().with_label_values(&["200", "GET", "/x"]);
        assert_eq!(hist.get_sample_count(), 1);
        assert!((hist.get_sample_sum() - 0.02).abs() < 1e-9);
        assert_eq!(metrics.response_size().sample_sum(), 11.0);
        assert_eq!(metrics.request_size().sample_sum(), 40.0);
    }

    #[test]
    fn distinct_label_tuples_are_distinct_series() {
        let metrics = MetricSet::new(None).unwrap();
        metrics.record(StatusCode::OK, &Method::GET, "/x", 0.0, 0, 0);
        metrics.record(StatusCode::NOT_FOUND, &Method::GET, "/x", 0.0, 0, 0);
        metrics.record(StatusCode::OK, &Method::POST, "/x", 0.0, 0, 0);

        assert_eq!(metrics.requests().with_label_values(&["200", "GET", "/x"]).get(), 1);
        assert_eq!(metrics.requests().with_label_values(&["404", "GET", "/x"]).get(), 1);
        assert_eq!(metrics.requests().with_label_values(&["200", "POST", "/x"]).get(), 1);
    }

    #[test]
    fn histogram_uses_configured_buckets() {
        let metrics = MetricSet::new(None).unwrap();
        metrics.observe_response(StatusCode::OK, &Method::GET, "/", 0.003, 0);

        let families = metrics.duration().collect();
        let hist = families[0].get_metric()[0].get_histogram();
        let bounds: Vec<f64> = hist.get_bucket().iter().map(|b| b.get_upper_bound()).collect();
        assert_eq!(bounds, DURATION_BUCKETS);
        assert_eq!(hist.get_bucket()[0].get_cumulative_count(), 1);
    }

    #[test]
    fn register_without_subsystem() {
        let registry = Registry::new();
        let metrics = MetricSet::new(None).unwrap();
        metrics.register(&registry).unwrap();
        metrics.record(StatusCode::OK, &Method::GET, "/", 0.0, 0, 0);

        let names = names(&registry);
        for expected in [
            "concurrent_requests",
            "request_duration_seconds",
            "request_size_bytes",
            "requests_total",
            "response_size_bytes",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn subsystem_prefixes_every_instrument() {
        let registry = Registry::new();
        let metrics = MetricSet::new(Some("api")).unwrap();
        metrics.register(&registry).unwrap();
        metrics.record(StatusCode::OK, &Method::GET, "/", 0.0, 0, 0);

        let names = names(&registry);
        assert_eq!(names.len(), 5);
        assert!(names.iter().all(|n| n.starts_with("api_")), "{names:?}");
    }

    #[test]
    fn duplicate_registration_always_fails() {
        let registry = Registry::new();
        MetricSet::new(None).unwrap().register(&registry).unwrap();

        for _ in 0..3 {
            let err = MetricSet::new(None).unwrap().register(&registry).unwrap_err();
            assert!(matches!(err, Error::Metrics(prometheus::Error::AlreadyReg)));
        }
    }

    #[test]
    fn in_flight_guard_is_symmetric() {
        let metrics = MetricSet::new(None).unwrap();
        {
            let _a = InFlight::enter(metrics.in_flight());
            let _b = InFlight::enter(metrics.in_flight());
            assert_eq!(metrics.in_flight().get(), 2);
        }
        assert_eq!(metrics.in_flight().get(), 0);
    }

    #[test]
    fn in_flight_guard_releases_on_panic() {
        let metrics = MetricSet::new(None).unwrap();
        let gauge = metrics.in_flight().clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = InFlight::enter(&gauge);
            panic!("handler failed");
        }));
        assert!(result.is_err());
        assert_eq!(metrics.in_flight().get(), 0);
    }
}
