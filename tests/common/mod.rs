//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use testapp::observability::MetricsSink;
use testapp::probe::{ProbeError, Testable};

/// Serve `router` on an ephemeral local port.
pub async fn start_mock_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Send a GET through `router` without a socket, returning status and body.
pub async fn get_text(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

/// How a [`StubProbe`] answers `test`.
#[derive(Clone)]
pub enum StubBehavior {
    Echo,
    Return(&'static str),
    Fail(&'static str),
}

/// In-memory probe with scripted behavior and call counters.
pub struct StubProbe {
    pub name: &'static str,
    pub behavior: StubBehavior,
    pub init_error: Option<&'static str>,
    pub inits: AtomicUsize,
    pub tests: AtomicUsize,
    pub cleanups: AtomicUsize,
}

impl StubProbe {
    pub fn new(name: &'static str, behavior: StubBehavior) -> Self {
        Self {
            name,
            behavior,
            init_error: None,
            inits: AtomicUsize::new(0),
            tests: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
        }
    }

    pub fn failing_init(name: &'static str, error: &'static str) -> Self {
        Self {
            init_error: Some(error),
            ..Self::new(name, StubBehavior::Echo)
        }
    }
}

#[async_trait]
impl Testable for StubProbe {
    fn name(&self) -> &str {
        self.name
    }

    async fn init(&self, _cancel: &CancellationToken) -> Result<(), ProbeError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        match self.init_error {
            Some(e) => Err(ProbeError::Config(e.to_string())),
            None => Ok(()),
        }
    }

    async fn test(&self, value: &str) -> Result<String, ProbeError> {
        self.tests.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            StubBehavior::Echo => Ok(value.to_string()),
            StubBehavior::Return(v) => Ok(v.to_string()),
            StubBehavior::Fail(e) => Err(ProbeError::Config(e.to_string())),
        }
    }

    async fn cleanup(&self) -> Result<(), ProbeError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Metrics sink that remembers every call.
#[derive(Default)]
pub struct RecordingSink {
    pub latencies: Mutex<Vec<(&'static str, Duration)>>,
    pub gauges: Mutex<Vec<(&'static str, f64)>>,
    pub failures: Mutex<HashMap<&'static str, u64>>,
    pub outcomes: Mutex<Vec<(String, &'static str)>>,
}

impl RecordingSink {
    pub fn failures_of(&self, name: &str) -> u64 {
        self.failures.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn latencies_of(&self, name: &str) -> usize {
        self.latencies.lock().unwrap().iter().filter(|(n, _)| *n == name).count()
    }
}

impl MetricsSink for RecordingSink {
    fn observe_latency(&self, name: &'static str, latency: Duration) {
        self.latencies.lock().unwrap().push((name, latency));
    }

    fn increment_failure(&self, name: &'static str) {
        *self.failures.lock().unwrap().entry(name).or_default() += 1;
    }

    fn set_gauge(&self, name: &'static str, value: f64) {
        self.gauges.lock().unwrap().push((name, value));
    }

    fn record_outcome(&self, probe: &str, outcome: &'static str) {
        self.outcomes.lock().unwrap().push((probe.to_string(), outcome));
    }
}

/// Stand-in for the Cloud Storage JSON API.
#[derive(Default)]
pub struct MockGcs {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub cache_control: Mutex<HashMap<String, String>>,
    pub reject_writes: bool,
}

#[derive(serde::Deserialize)]
struct UploadParams {
    name: String,
}

impl MockGcs {
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/storage/v1/b/{bucket}", get(gcs_bucket))
            .route("/upload/storage/v1/b/{bucket}/o", post(gcs_upload))
            .route("/storage/v1/b/{bucket}/o/{object}", get(gcs_download).patch(gcs_patch))
            .with_state(self)
    }
}

async fn gcs_bucket(Path(bucket): Path<String>) -> Json<Value> {
    Json(json!({ "kind": "storage#bucket", "name": bucket }))
}

async fn gcs_upload(
    State(gcs): State<Arc<MockGcs>>,
    Path(_bucket): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Response {
    if gcs.reject_writes {
        return (StatusCode::FORBIDDEN, "storage.objects.create access denied").into_response();
    }
    gcs.objects.lock().unwrap().insert(params.name.clone(), body.to_vec());
    Json(json!({ "name": params.name })).into_response()
}

async fn gcs_patch(
    State(gcs): State<Arc<MockGcs>>,
    Path((_bucket, object)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let Some(value) = body["cacheControl"].as_str() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    gcs.cache_control.lock().unwrap().insert(object.clone(), value.to_string());
    Json(json!({ "name": object })).into_response()
}

async fn gcs_download(State(gcs): State<Arc<MockGcs>>, Path((_bucket, object)): Path<(String, String)>) -> Response {
    match gcs.objects.lock().unwrap().get(&object) {
        Some(data) => data.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "No such object").into_response(),
    }
}

/// Stand-in for an S3-compatible gateway addressed path-style.
#[derive(Default)]
pub struct MockRgw {
    pub objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    /// Requests that arrived without an AWS signature.
    pub unsigned: AtomicUsize,
}

impl MockRgw {
    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/{bucket}/{object}", put(rgw_put).get(rgw_get))
            .with_state(self)
    }
}

fn is_signed(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("AWS4-HMAC-SHA256"))
}

async fn rgw_put(
    State(rgw): State<Arc<MockRgw>>,
    Path((bucket, object)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !is_signed(&headers) {
        rgw.unsigned.fetch_add(1, Ordering::SeqCst);
        return StatusCode::FORBIDDEN;
    }
    rgw.objects.lock().unwrap().insert((bucket, object), body.to_vec());
    StatusCode::OK
}

async fn rgw_get(
    State(rgw): State<Arc<MockRgw>>,
    Path((bucket, object)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
) -> Response {
    if !is_signed(&headers) {
        rgw.unsigned.fetch_add(1, Ordering::SeqCst);
        return StatusCode::FORBIDDEN.into_response();
    }
    match rgw.objects.lock().unwrap().get(&(bucket, object)) {
        Some(data) => data.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "NoSuchKey").into_response(),
    }
}

/// Stand-in for the BigQuery v2 REST API.
pub struct MockBigQuery {
    pub create_status: StatusCode,
    pub creates: AtomicUsize,
    pub rows: Mutex<Vec<String>>,
    /// Answer every query as still running, completing it on the first poll.
    pub defer_completion: bool,
    pending: Mutex<HashMap<String, Value>>,
    next_job: AtomicUsize,
}

impl MockBigQuery {
    pub fn new(create_status: StatusCode) -> Self {
        Self {
            create_status,
            creates: AtomicUsize::new(0),
            rows: Mutex::new(Vec::new()),
            defer_completion: false,
            pending: Mutex::new(HashMap::new()),
            next_job: AtomicUsize::new(1),
        }
    }

    pub fn router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/bigquery/v2/projects/{project}/datasets/{dataset}/tables", post(bq_create_table))
            .route("/bigquery/v2/projects/{project}/queries", post(bq_query))
            .route("/bigquery/v2/projects/{project}/queries/{job}", get(bq_results))
            .with_state(self)
    }
}

async fn bq_create_table(
    State(bq): State<Arc<MockBigQuery>>,
    Path((_project, _dataset)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    bq.creates.fetch_add(1, Ordering::SeqCst);
    if body["schema"]["fields"][0]["name"] != "Message" || body["expirationTime"].as_str().is_none() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    if bq.create_status.is_success() {
        return Json(body).into_response();
    }
    (
        bq.create_status,
        Json(json!({ "error": { "code": bq.create_status.as_u16(), "message": "Already Exists: Table" } })),
    )
        .into_response()
}

async fn bq_query(State(bq): State<Arc<MockBigQuery>>, Path(_project): Path<String>, Json(body): Json<Value>) -> Response {
    let sql = body["query"].as_str().unwrap_or_default().to_string();
    let mut result = json!({ "jobComplete": true, "rows": [] });

    if sql.starts_with("INSERT") {
        let value = body["queryParameters"][0]["parameterValue"]["value"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        bq.rows.lock().unwrap().push(value);
    } else if sql.starts_with("SELECT") {
        let rows: Vec<Value> = bq
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|m| json!({ "f": [{ "v": m }] }))
            .collect();
        result["rows"] = Value::Array(rows);
    } else if sql.starts_with("TRUNCATE") {
        bq.rows.lock().unwrap().clear();
    } else {
        return (StatusCode::BAD_REQUEST, format!("unsupported query: {sql}")).into_response();
    }

    if bq.defer_completion {
        let job = format!("job_{}", bq.next_job.fetch_add(1, Ordering::SeqCst));
        bq.pending.lock().unwrap().insert(job.clone(), result);
        return Json(json!({
            "jobComplete": false,
            "jobReference": { "jobId": job, "location": "EU" },
        }))
        .into_response();
    }
    Json(result).into_response()
}

async fn bq_results(
    State(bq): State<Arc<MockBigQuery>>,
    Path((_project, job)): Path<(String, String)>,
) -> Response {
    match bq.pending.lock().unwrap().remove(&job) {
        Some(result) => Json(result).into_response(),
        None => (StatusCode::NOT_FOUND, "Not found: Job").into_response(),
    }
}
