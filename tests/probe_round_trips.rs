//! Probe behavior against in-process stand-ins for the managed services.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::StatusCode;
use tokio_util::sync::CancellationToken;

use testapp::backend::{BackendError, SqlClient, SqlValue};
use testapp::config::{AppConfig, BigQueryConfig, BucketConfig, CephConfig, DatabaseConfig};
use testapp::observability::{MetricsSink, PrometheusSink};
use testapp::probe::{BucketProbe, CephProbe, DatabaseProbe, ProbeRegistry, Testable, WarehouseProbe};
use testapp::resilience::RetryConfig;
use testapp::HttpServer;

mod common;
use common::{get_text, start_mock_server, MockBigQuery, MockGcs, MockRgw, RecordingSink};

fn bucket_config(addr: std::net::SocketAddr) -> BucketConfig {
    let mut config = BucketConfig::default();
    config.name = "team-bucket".to_string();
    config.endpoint = format!("http://{addr}");
    config.token.token_url = String::new();
    config
}

fn bigquery_config(addr: std::net::SocketAddr) -> BigQueryConfig {
    let mut config = BigQueryConfig::default();
    config.project_id = "team-project".to_string();
    config.dataset = "testapp".to_string();
    config.table = "roundtrip".to_string();
    config.endpoint = format!("http://{addr}");
    config.max_retry_secs = 2;
    config.retry_interval_secs = 1;
    config.token.token_url = String::new();
    config
}

#[tokio::test]
async fn bucket_round_trip_sets_no_store() {
    let gcs = Arc::new(MockGcs::default());
    let addr = start_mock_server(gcs.clone().router()).await;
    let sink = Arc::new(RecordingSink::default());

    let probe = BucketProbe::from_config(&bucket_config(addr), sink.clone()).unwrap();
    probe.init(&CancellationToken::new()).await.unwrap();

    assert_eq!(probe.test("c0ff").await.unwrap(), "c0ff");
    assert_eq!(gcs.objects.lock().unwrap().get("test").unwrap(), b"c0ff");
    assert_eq!(gcs.cache_control.lock().unwrap().get("test").unwrap(), "no-store");

    assert_eq!(sink.latencies_of("testapp_bucket_write_duration_seconds"), 1);
    assert_eq!(sink.latencies_of("testapp_bucket_read_duration_seconds"), 1);
    assert_eq!(sink.failures_of("testapp_bucket_write_failed_total"), 0);

    // Gauge and histogram receive the same measurement.
    let gauges = sink.gauges.lock().unwrap();
    let latencies = sink.latencies.lock().unwrap();
    let write_gauge = gauges
        .iter()
        .find(|(n, _)| *n == "testapp_bucket_write_latency_seconds")
        .unwrap();
    assert_eq!(write_gauge.1, latencies[0].1.as_secs_f64());
}

#[tokio::test]
async fn bucket_write_error_returns_500_and_counts_once() {
    let gcs = Arc::new(MockGcs {
        reject_writes: true,
        ..MockGcs::default()
    });
    let addr = start_mock_server(gcs.clone().router()).await;
    let metrics = PrometheusSink::new().unwrap();
    let sink: Arc<dyn MetricsSink> = Arc::new(metrics.clone());

    let probe = BucketProbe::from_config(&bucket_config(addr), sink).unwrap();
    let token = CancellationToken::new();
    let registry = ProbeRegistry::initialize(vec![Arc::new(probe) as Arc<dyn Testable>], &token).await;
    let server = HttpServer::new(&AppConfig::default(), &registry, metrics.clone(), token).unwrap();

    let (status, body) = get_text(server.router(), "/bucket/test").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.starts_with("bucket test: error:"), "{body}");
    assert!(body.contains("access denied"), "{body}");

    let rendered = metrics.render();
    assert!(rendered.contains("testapp_bucket_write_failed_total 1"), "{rendered}");
    assert!(!rendered.contains("testapp_bucket_read_failed_total"), "{rendered}");
    assert!(!rendered.contains("testapp_bucket_write_duration_seconds_count"), "{rendered}");
}

#[tokio::test]
async fn ceph_round_trip_through_signed_requests() {
    let rgw = Arc::new(MockRgw::default());
    let addr = start_mock_server(rgw.clone().router()).await;
    let sink = Arc::new(RecordingSink::default());

    let config = CephConfig {
        host: format!("http://{addr}"),
        bucket: "team-bucket".to_string(),
        access_key: "AKIAEXAMPLE".to_string(),
        secret_key: "secret".to_string(),
        ..CephConfig::default()
    };
    let probe = CephProbe::from_config(&config, sink.clone()).unwrap();
    probe.init(&CancellationToken::new()).await.unwrap();

    assert_eq!(probe.test("ab12").await.unwrap(), "ab12");
    assert_eq!(probe.test("cd34").await.unwrap(), "cd34");
    assert_eq!(
        rgw.objects
            .lock()
            .unwrap()
            .get(&("team-bucket".to_string(), "test".to_string()))
            .unwrap(),
        b"cd34"
    );
    assert_eq!(rgw.unsigned.load(Ordering::SeqCst), 0);

    assert_eq!(sink.latencies_of("testapp_rgw_write_duration_seconds"), 2);
    assert_eq!(sink.latencies_of("testapp_rgw_read_duration_seconds"), 2);
    assert_eq!(sink.failures_of("testapp_rgw_write_failed_total"), 0);
}

#[tokio::test]
async fn warehouse_init_accepts_existing_table() {
    let bigquery = Arc::new(MockBigQuery::new(StatusCode::CONFLICT));
    let addr = start_mock_server(bigquery.clone().router()).await;
    let sink = Arc::new(RecordingSink::default());

    let probe = WarehouseProbe::from_config(&bigquery_config(addr), sink).unwrap();
    let token = CancellationToken::new();

    let started = Instant::now();
    probe.init(&token).await.unwrap();
    probe.init(&token).await.unwrap();

    assert_eq!(bigquery.creates.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn warehouse_round_trip_truncates_after_read() {
    let mut mock = MockBigQuery::new(StatusCode::OK);
    mock.defer_completion = true;
    let bigquery = Arc::new(mock);
    let addr = start_mock_server(bigquery.clone().router()).await;
    let sink = Arc::new(RecordingSink::default());

    let probe = WarehouseProbe::from_config(&bigquery_config(addr), sink.clone()).unwrap();
    probe.init(&CancellationToken::new()).await.unwrap();

    assert_eq!(probe.test("0a0b").await.unwrap(), "0a0b");
    assert_eq!(probe.test("0c0d").await.unwrap(), "0c0d");
    assert!(bigquery.rows.lock().unwrap().is_empty());

    assert_eq!(sink.latencies_of("testapp_bigquery_insert_duration_seconds"), 2);
    assert_eq!(sink.latencies_of("testapp_bigquery_read_duration_seconds"), 2);
}

#[tokio::test]
async fn warehouse_recovers_after_leftover_row() {
    let bigquery = Arc::new(MockBigQuery::new(StatusCode::OK));
    bigquery.rows.lock().unwrap().push("stale".to_string());
    let addr = start_mock_server(bigquery.clone().router()).await;
    let sink = Arc::new(RecordingSink::default());

    let probe = WarehouseProbe::from_config(&bigquery_config(addr), sink.clone()).unwrap();
    let err = probe.test("0a0b").await.unwrap_err();

    assert_eq!(err.to_string(), "expected exactly one row, found 2");
    assert_eq!(sink.failures_of("testapp_bigquery_read_failed_total"), 1);
    assert_eq!(sink.latencies_of("testapp_bigquery_insert_duration_seconds"), 1);
    assert!(bigquery.rows.lock().unwrap().is_empty());

    assert_eq!(probe.test("0c0d").await.unwrap(), "0c0d");
    assert_eq!(probe.test("0e0f").await.unwrap(), "0e0f");
    assert!(bigquery.rows.lock().unwrap().is_empty());
    assert_eq!(sink.failures_of("testapp_bigquery_read_failed_total"), 1);
}

#[tokio::test]
async fn database_init_gives_up_on_unreachable_host() {
    let mut config = DatabaseConfig::default();
    config.host = "127.0.0.1".to_string();
    config.port = 1;
    config.password = "secret".to_string();
    config.connect_timeout_secs = 5;
    config.max_retry_secs = 2;
    config.retry_interval_secs = 1;

    let probe = DatabaseProbe::from_config(&config, Arc::new(RecordingSink::default())).unwrap();

    let started = Instant::now();
    let err = probe.init(&CancellationToken::new()).await.unwrap_err();
    let elapsed = started.elapsed();

    let message = err.to_string();
    assert!(message.contains("gave up retrying"), "{message}");
    assert!(message.contains("last error: sql error:"), "{message}");
    assert!(message.contains("Connection refused"), "{message}");
    assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(3500), "{elapsed:?}");

    probe.cleanup().await.unwrap();
}

/// Single-table stand-in shared with the test body.
#[derive(Clone, Default)]
struct SharedTable(Arc<Mutex<Vec<(i64, String)>>>);

#[async_trait]
impl SqlClient for SharedTable {
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64, BackendError> {
        let mut rows = self.0.lock().unwrap();
        if sql.starts_with("TRUNCATE") {
            rows.clear();
        } else if let [SqlValue::BigInt(ts), SqlValue::Text(data)] = args {
            rows.push((*ts, data.clone()));
        }
        Ok(1)
    }

    async fn query_strings(&self, _sql: &str) -> Result<Vec<String>, BackendError> {
        Ok(self.0.lock().unwrap().iter().map(|(_, d)| d.clone()).collect())
    }

    async fn close(&self) {}
}

#[tokio::test]
async fn database_route_leaves_written_value_in_table() {
    let table = SharedTable::default();
    let metrics = PrometheusSink::new().unwrap();
    let retry = RetryConfig::new(Duration::from_secs(2), Duration::from_secs(1)).unwrap();
    let probe = DatabaseProbe::new(Box::new(table.clone()), "test", retry, Arc::new(metrics.clone()));

    let token = CancellationToken::new();
    let registry = ProbeRegistry::initialize(vec![Arc::new(probe) as Arc<dyn Testable>], &token).await;
    let server = HttpServer::new(&AppConfig::default(), &registry, metrics, token).unwrap();

    let (status, body) = get_text(server.router(), "/database/test").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let rows = table.0.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1.len(), 4);
    assert!(rows[0].1.chars().all(|c| c.is_ascii_hexdigit()));
}
