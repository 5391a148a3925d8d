use std::sync::{Arc, OnceLock};

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

/// Prometheus counters for scans and query outcomes.
#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    scan_rows: CounterVec,
    scan_batches: CounterVec,
    scan_partitions: CounterVec,
    queries: CounterVec,
    query_time_seconds: HistogramVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    pub fn record_scan_batch(&self, source: &str, rows: u64) {
        self.inner
            .scan_rows
            .with_label_values(&[source])
            .inc_by(rows as f64);
        self.inner.scan_batches.with_label_values(&[source]).inc();
    }

    pub fn record_scan_partition(&self, source: &str) {
        self.inner.scan_partitions.with_label_values(&[source]).inc();
    }

    /// `outcome` is `finished` or `failed`.
    pub fn record_query(&self, outcome: &str, secs: f64) {
        self.inner.queries.with_label_values(&[outcome]).inc();
        self.inner
            .query_time_seconds
            .with_label_values(&[outcome])
            .observe(secs.max(0.0));
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();
        let scan_rows = counter_vec(
            &registry,
            "tdf_scan_rows_total",
            "Rows delivered by table scans",
            &["source"],
        );
        let scan_batches = counter_vec(
            &registry,
            "tdf_scan_batches_total",
            "Batches delivered by table scans",
            &["source"],
        );
        let scan_partitions = counter_vec(
            &registry,
            "tdf_scan_partitions_total",
            "Source partitions (row groups) consumed by table scans",
            &["source"],
        );
        let queries = counter_vec(
            &registry,
            "tdf_queries_total",
            "Queries executed, by outcome",
            &["outcome"],
        );
        let query_time_seconds = histogram_vec(
            &registry,
            "tdf_query_time_seconds",
            "Wall time spent executing queries",
            &["outcome"],
        );
        Self {
            registry,
            scan_rows,
            scan_batches,
            scan_partitions,
            queries,
            query_time_seconds,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

/// Process-wide registry shared by sessions that do not bring their own.
pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}
