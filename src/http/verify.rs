//! Round-trip verification endpoint.
//!
//! # Responsibilities
//! - Generate a fresh expected value per request
//! - Run the probe's round trip under the per-call timeout and the shutdown token
//! - Classify the result as success, mismatch or operational error
//! - Map the classification to a status code and body
//!
//! Dropping the handler future (client disconnect) drops the in-flight
//! backend call with it.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::observability::MetricsSink;
use crate::probe::registry::route_path;
use crate::probe::{ProbeError, Testable};

/// State shared by one probe's route.
#[derive(Clone)]
pub struct VerifyState {
    pub probe: Arc<dyn Testable>,
    pub metrics: Arc<dyn MetricsSink>,
    pub shutdown: CancellationToken,
    pub timeout: Duration,
}

/// How one round trip ended.
#[derive(Debug)]
pub enum RoundTrip {
    Success,
    Mismatch { expected: String, got: String },
    Error(ProbeError),
}

impl RoundTrip {
    /// Label used for the outcome metric.
    pub fn label(&self) -> &'static str {
        match self {
            RoundTrip::Success => "success",
            RoundTrip::Mismatch { .. } => "mismatch",
            RoundTrip::Error(_) => "error",
        }
    }
}

/// Four hex characters from a random 16-bit integer.
pub fn expected_value() -> String {
    format!("{:04x}", rand::thread_rng().gen::<u16>())
}

/// Router serving `GET /{name}/test` for `state.probe`.
pub fn probe_router(state: VerifyState) -> Router {
    let path = route_path(state.probe.name());
    Router::new().route(&path, get(verify_handler)).with_state(state)
}

/// Run one round trip of `expected` through `probe` and classify it.
pub async fn round_trip(
    probe: &dyn Testable,
    expected: &str,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> RoundTrip {
    let result = tokio::select! {
        _ = shutdown.cancelled() => Err(ProbeError::Cancelled),
        result = tokio::time::timeout(timeout, probe.test(expected)) => {
            result.unwrap_or(Err(ProbeError::Timeout(timeout)))
        }
    };

    match result {
        Ok(got) if got == expected => RoundTrip::Success,
        Ok(got) => RoundTrip::Mismatch {
            expected: expected.to_string(),
            got,
        },
        Err(e) => RoundTrip::Error(e),
    }
}

async fn verify_handler(State(state): State<VerifyState>) -> impl IntoResponse {
    let name = state.probe.name();
    let expected = expected_value();

    let outcome = round_trip(state.probe.as_ref(), &expected, state.timeout, &state.shutdown).await;
    state.metrics.record_outcome(name, outcome.label());

    match outcome {
        RoundTrip::Success => {
            tracing::debug!(probe = %name, value = %expected, "Round trip succeeded");
            (StatusCode::OK, String::new())
        }
        RoundTrip::Mismatch { expected, got } => {
            tracing::warn!(probe = %name, expected = %expected, got = %got, "Round trip returned a different value");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{name} test: data mismatch, expected: {expected} got: {got}"),
            )
        }
        RoundTrip::Error(e) => {
            tracing::warn!(probe = %name, error = %e, "Round trip failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{name} test: error: {e}"))
        }
    }
}
