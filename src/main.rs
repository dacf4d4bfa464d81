//! Connectivity test app.
//!
//! # Architecture Overview
//!
//! ```text
//!     GET /{probe}/test
//!     ─────────────────▶ http::verify ──▶ probe::Testable ──▶ backend client ──▶ managed service
//!                             │                 │
//!                             ▼                 ▼
//!                        200 / 500      observability::MetricsSink ──▶ GET /metrics
//!
//!     startup:  config ──▶ probe::ProbeRegistry (construct, init with retries, drop failures)
//!     shutdown: signal ──▶ lifecycle::Shutdown ──▶ server drain ──▶ probe cleanup
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use testapp::config::load_config;
use testapp::lifecycle::{shutdown_on_signal, Shutdown};
use testapp::observability::{logging, MetricsSink, PrometheusSink};
use testapp::{HttpServer, ProbeRegistry};

/// Histogram buffers are drained this often.
const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "testapp")]
#[command(about = "Round-trip connectivity checks for managed backends", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `listener.bind_address`.
    #[arg(long)]
    bind_address: Option<String>,

    /// Overrides `observability.log_level`.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(bind_address) = cli.bind_address {
        config.listener.bind_address = bind_address;
    }
    if let Some(log_level) = cli.log_level {
        config.observability.log_level = log_level;
    }

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "testapp starting");

    let metrics = PrometheusSink::new()?;
    metrics.mark_started();

    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(
        shutdown.clone(),
        Duration::from_secs(config.http.graceful_shutdown_wait_secs),
    ));

    let upkeep = metrics.clone();
    let upkeep_token = shutdown.token();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => upkeep.run_upkeep(),
                _ = upkeep_token.cancelled() => break,
            }
        }
    });

    // Binding is the only startup step allowed to fail the process.
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let sink: Arc<dyn MetricsSink> = Arc::new(metrics.clone());
    let candidates = ProbeRegistry::candidates(&config, sink);
    let registry = ProbeRegistry::initialize(candidates, &shutdown.token()).await;
    if registry.is_empty() {
        tracing::warn!("No probes registered, serving diagnostics only");
    }

    let server = HttpServer::new(&config, &registry, metrics, shutdown.token())?;
    let served = server.run(listener).await;

    let failures = registry.cleanup().await;
    tracing::info!(cleanup_failures = failures, "Shutdown complete");

    served?;
    Ok(())
}
