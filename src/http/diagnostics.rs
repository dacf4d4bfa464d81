//! Operator diagnostic endpoints.
//!
//! # Responsibilities
//! - Liveness (`/ping`, with an optional artificial delay)
//! - Build and host identification (`/version`, `/hostname`)
//! - Log pipeline checks (`/log`, `/logerror`)
//! - Outbound HTTPS check (`/connect`)
//! - Prometheus exposition (`/metrics`)

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::config::HttpConfig;
use crate::observability::PrometheusSink;

/// Build revision, injected at compile time when available.
const REVISION: &str = match option_env!("GIT_REVISION") {
    Some(revision) => revision,
    None => "unknown",
};

/// Upper bound on the `/ping` delay.
const MAX_PING_DELAY: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct DiagnosticsState {
    inner: Arc<Inner>,
}

struct Inner {
    ping_response: String,
    connect_url: String,
    hostname: String,
    client: reqwest::Client,
    metrics: PrometheusSink,
}

impl DiagnosticsState {
    pub fn new(config: &HttpConfig, metrics: PrometheusSink) -> Result<Self, reqwest::Error> {
        // `/connect` checks reachability only; certificate validity is ignored.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            inner: Arc::new(Inner {
                ping_response: config.ping_response.clone(),
                connect_url: config.connect_url.clone(),
                hostname: hostname(),
                client,
                metrics,
            }),
        })
    }
}

pub fn diagnostics_router(state: DiagnosticsState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/version", get(version))
        .route("/hostname", get(hostname_handler))
        .route("/log", get(log_info))
        .route("/logerror", get(log_error))
        .route("/connect", get(connect))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Host name from `HOSTNAME`, falling back to `/etc/hostname`.
fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parse `250ms` or `2s`.
pub fn parse_delay(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms.parse().ok().map(Duration::from_millis);
    }
    raw.strip_suffix('s')?.parse().ok().map(Duration::from_secs)
}

#[derive(Debug, Deserialize)]
struct PingParams {
    delay: Option<String>,
}

async fn ping(State(state): State<DiagnosticsState>, Query(params): Query<PingParams>) -> impl IntoResponse {
    if let Some(raw) = params.delay {
        match parse_delay(&raw) {
            Some(delay) if delay <= MAX_PING_DELAY => tokio::time::sleep(delay).await,
            _ => return (StatusCode::BAD_REQUEST, format!("invalid delay: {raw}\n")),
        }
    }
    (StatusCode::OK, state.inner.ping_response.clone())
}

async fn version() -> String {
    format!("{} (rev: {})", env!("CARGO_PKG_VERSION"), REVISION)
}

async fn hostname_handler(State(state): State<DiagnosticsState>) -> String {
    state.inner.hostname.clone()
}

async fn log_info() -> StatusCode {
    tracing::info!("this is a log statement from testapp");
    StatusCode::OK
}

async fn log_error() -> StatusCode {
    tracing::error!("this is an error log statement from testapp");
    StatusCode::OK
}

async fn connect(State(state): State<DiagnosticsState>) -> impl IntoResponse {
    let url = &state.inner.connect_url;
    let response = match state.inner.client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Outbound request failed");
            return (StatusCode::BAD_GATEWAY, "error performing http get".to_string());
        }
    };

    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => (StatusCode::OK, format!("HTTP status: {status}, body:\n{body}")),
        Err(e) => {
            tracing::error!(url = %url, error = %e, "Failed to read response body");
            (StatusCode::BAD_GATEWAY, "error reading response body".to_string())
        }
    }
}

async fn metrics(State(state): State<DiagnosticsState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.inner.metrics.render(),
    )
}
