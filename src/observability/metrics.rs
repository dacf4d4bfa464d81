//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define probe metrics (latency gauges, latency histograms, failure counters)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track the outcome of every round trip per probe
//!
//! # Metrics
//! - `testapp_<op>_latency_seconds` (gauge): latency of the last successful operation
//! - `testapp_<op>_duration_seconds` (histogram): latency distribution
//! - `testapp_<op>_failed_total` (counter): failed operations
//! - `testapp_probe_tests_total` (counter): round trips by probe, outcome
//! - `testapp_start_timestamp_seconds` (gauge): process start time
//!
//! # Design Decisions
//! - The sink is an explicit object handed to each probe, never a global
//! - Each operation records exactly one of: a latency observation or a failure
//! - Gauge and histogram receive the identical measured duration, in seconds

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

/// Names of the three series recorded for one backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyMetric {
    pub gauge: &'static str,
    pub histogram: &'static str,
    pub failures: &'static str,
}

macro_rules! latency_metric {
    ($const_name:ident, $op:literal) => {
        pub const $const_name: LatencyMetric = LatencyMetric {
            gauge: concat!("testapp_", $op, "_latency_seconds"),
            histogram: concat!("testapp_", $op, "_duration_seconds"),
            failures: concat!("testapp_", $op, "_failed_total"),
        };
    };
}

latency_metric!(BUCKET_WRITE, "bucket_write");
latency_metric!(BUCKET_READ, "bucket_read");
latency_metric!(RGW_WRITE, "rgw_write");
latency_metric!(RGW_READ, "rgw_read");
latency_metric!(DB_INSERT, "db_insert");
latency_metric!(DB_READ, "db_read");
latency_metric!(BIGQUERY_INSERT, "bigquery_insert");
latency_metric!(BIGQUERY_READ, "bigquery_read");
latency_metric!(KAFKA_CONNECT, "kafka_connect");

pub const PROBE_TESTS: &str = "testapp_probe_tests_total";
pub const START_TIMESTAMP: &str = "testapp_start_timestamp_seconds";

/// Histogram buckets in seconds, tuned for in-cluster round trips.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Destination for everything the probes measure.
pub trait MetricsSink: Send + Sync {
    fn observe_latency(&self, name: &'static str, latency: Duration);

    fn increment_failure(&self, name: &'static str);

    fn set_gauge(&self, name: &'static str, value: f64);

    /// Count one round trip for `probe` ending in `outcome`.
    fn record_outcome(&self, probe: &str, outcome: &'static str);
}

/// Await `operation`, then record its latency on success or one failure on error.
pub async fn measure<F, T, E>(sink: &dyn MetricsSink, metric: LatencyMetric, operation: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = operation.await;
    match &result {
        Ok(_) => {
            let latency = start.elapsed();
            sink.set_gauge(metric.gauge, latency.as_secs_f64());
            sink.observe_latency(metric.histogram, latency);
            tracing::debug!(metric = metric.gauge, latency_ms = latency.as_millis() as u64, "Operation completed");
        }
        Err(_) => sink.increment_failure(metric.failures),
    }
    result
}

/// Prometheus-backed sink owning its own recorder.
///
/// Recording goes through the `metrics` facade with this recorder installed
/// locally, so separate instances never share series.
#[derive(Clone)]
pub struct PrometheusSink {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl PrometheusSink {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets(LATENCY_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();
        Ok(Self {
            recorder: Arc::new(recorder),
            handle,
        })
    }

    /// Render the Prometheus text exposition.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Drain histogram buffers; call periodically from a background task.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Record process start time.
    pub fn mark_started(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.set_gauge(START_TIMESTAMP, now);
    }
}

impl MetricsSink for PrometheusSink {
    fn observe_latency(&self, name: &'static str, latency: Duration) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::histogram!(name).record(latency.as_secs_f64());
        });
    }

    fn increment_failure(&self, name: &'static str) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!(name).increment(1);
        });
    }

    fn set_gauge(&self, name: &'static str, value: f64) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::gauge!(name).set(value);
        });
    }

    fn record_outcome(&self, probe: &str, outcome: &'static str) {
        let probe = probe.to_string();
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!(PROBE_TESTS, "probe" => probe, "outcome" => outcome).increment(1);
        });
    }
}
