//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: diagnostic routes plus one route per registered probe
//! - Wire up middleware (tracing, request timeout, request ID)
//! - Serve on an already bound listener until the shutdown token fires

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::diagnostics::{diagnostics_router, DiagnosticsState};
use crate::http::verify::{probe_router, VerifyState};
use crate::observability::{MetricsSink, PrometheusSink};
use crate::probe::ProbeRegistry;

/// HTTP server for the test app.
pub struct HttpServer {
    router: Router,
    shutdown: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server exposing the diagnostics and every registered probe.
    pub fn new(
        config: &AppConfig,
        registry: &ProbeRegistry,
        metrics: PrometheusSink,
        shutdown: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        let diagnostics = DiagnosticsState::new(&config.http, metrics.clone())?;
        let sink: Arc<dyn MetricsSink> = Arc::new(metrics);

        let mut router = diagnostics_router(diagnostics);
        for probe in registry.registered() {
            router = router.merge(probe_router(VerifyState {
                probe: probe.clone(),
                metrics: sink.clone(),
                shutdown: shutdown.clone(),
                timeout: config.probes.test_timeout(),
            }));
        }

        let router = Self::apply_layers(router, Duration::from_secs(config.http.request_timeout_secs));
        Ok(Self { router, shutdown })
    }

    /// Wrap `router` in the middleware stack shared by every route.
    #[allow(deprecated)]
    pub fn apply_layers(router: Router, request_timeout: Duration) -> Router {
        router
            .layer(TimeoutLayer::new(request_timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
