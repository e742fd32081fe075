//! Unlabeled summary collector.
//!
//! The `prometheus` crate ships counters, gauges, and histograms but no
//! summary. Request and response sizes are exported as a summary without
//! quantile objectives: a running `_sum` and `_count`, which is what the
//! scrape format expects for `# TYPE … summary` with no quantiles.

use std::collections::HashMap;
use std::sync::Arc;

use prometheus::core::{Atomic, AtomicF64, AtomicU64, Collector, Desc};
use prometheus::proto::{self, MetricFamily, MetricType};
use prometheus::Opts;

/// A lock-free summary of observed values. Clones share the same series.
#[derive(Clone)]
pub struct Summary {
    inner: Arc<SummaryCore>,
}

struct SummaryCore {
    desc: Desc,
    count: AtomicU64,
    sum: AtomicF64,
}

impl Summary {
    /// Builds a summary from `opts`, honouring its namespace and subsystem.
    pub fn with_opts(opts: Opts) -> prometheus::Result<Self> {
        let desc = Desc::new(opts.fq_name(), opts.help, Vec::new(), HashMap::new())?;
        Ok(Self {
            inner: Arc::new(SummaryCore {
                desc,
                count: AtomicU64::new(0),
                sum: AtomicF64::new(0.0),
            }),
        })
    }

    pub fn observe(&self, v: f64) {
        self.inner.sum.inc_by(v);
        self.inner.count.inc_by(1);
    }

    pub fn sample_count(&self) -> u64 {
        self.inner.count.get()
    }

    pub fn sample_sum(&self) -> f64 {
        self.inner.sum.get()
    }
}

impl Collector for Summary {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut summary = proto::Summary::default();
        summary.set_sample_count(self.sample_count());
        summary.set_sample_sum(self.sample_sum());

        let mut metric = proto::Metric::default();
        metric.set_summary(summary);

        let mut family = MetricFamily::default();
        family.set_name(self.inner.desc.fq_name.clone());
        family.set_help(self.inner.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        family.mut_metric().push(metric);

        vec![family]
    }
}

#[cfg(test)]
mod tests {
    use prometheus::{Encoder, Registry, TextEncoder};

    use super::*;

    #[test]
    fn observations_accumulate_count_and_sum() {
        let summary = Summary::with_opts(Opts::new("payload_bytes", "payload")).unwrap();
        summary.observe(10.0);
        summary.observe(32.0);

        assert_eq!(summary.sample_count(), 2);
        assert_eq!(summary.sample_sum(), 42.0);
    }

    #[test]
    fn clones_share_one_series() {
        let summary = Summary::with_opts(Opts::new("payload_bytes", "payload")).unwrap();
        summary.clone().observe(5.0);
        assert_eq!(summary.sample_count(), 1);
    }

    #[test]
    fn subsystem_prefixes_the_name() {
        let summary = Summary::with_opts(Opts::new("payload_bytes", "payload").subsystem("api")).unwrap();
        assert_eq!(summary.desc()[0].fq_name, "api_payload_bytes");
    }

    #[test]
    fn encodes_as_summary_family() {
        let registry = Registry::new();
        let summary = Summary::with_opts(Opts::new("payload_bytes", "Payload sizes.")).unwrap();
        registry.register(Box::new(summary.clone())).unwrap();
        summary.observe(7.0);

        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("# TYPE payload_bytes summary"));
        assert!(text.contains("payload_bytes_sum 7"));
        assert!(text.contains("payload_bytes_count 1"));
    }
}
