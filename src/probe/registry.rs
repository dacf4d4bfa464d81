//! Probe registry.
//!
//! # Responsibilities
//! - Decide which probes to attempt from the configuration
//! - Drop probes that fail construction or initialization, without failing startup
//! - Hand the surviving probes to the HTTP layer
//! - Release every constructed probe at shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::observability::MetricsSink;
use crate::probe::{BrokerProbe, BucketProbe, CephProbe, DatabaseProbe, ProbeError, Testable, WarehouseProbe};

/// Route serving the round trip for the probe called `name`.
pub fn route_path(name: &str) -> String {
    format!("/{name}/test")
}

/// Probes that made it through startup.
#[derive(Default)]
pub struct ProbeRegistry {
    /// Initialized probes, in registration order.
    registered: Vec<Arc<dyn Testable>>,

    /// Every probe that was constructed, initialized or not.
    constructed: Vec<Arc<dyn Testable>>,
}

impl ProbeRegistry {
    /// Construct every probe whose required settings are present.
    pub fn candidates(config: &AppConfig, metrics: Arc<dyn MetricsSink>) -> Vec<Arc<dyn Testable>> {
        let mut candidates: Vec<(&str, Result<Arc<dyn Testable>, ProbeError>)> = Vec::new();

        if !config.bucket.name.is_empty() {
            candidates.push((
                "bucket",
                BucketProbe::from_config(&config.bucket, metrics.clone()).map(|p| Arc::new(p) as Arc<dyn Testable>),
            ));
        }
        if config.ceph.is_complete() {
            candidates.push((
                "ceph",
                CephProbe::from_config(&config.ceph, metrics.clone()).map(|p| Arc::new(p) as Arc<dyn Testable>),
            ));
        }
        if !config.database.host.is_empty() {
            candidates.push((
                "database",
                DatabaseProbe::from_config(&config.database, metrics.clone())
                    .map(|p| Arc::new(p) as Arc<dyn Testable>),
            ));
        }
        if !config.bigquery.dataset.is_empty() && !config.bigquery.table.is_empty() {
            candidates.push((
                "bigquery",
                WarehouseProbe::from_config(&config.bigquery, metrics.clone())
                    .map(|p| Arc::new(p) as Arc<dyn Testable>),
            ));
        }
        if !config.kafka.broker_list().is_empty() {
            candidates.push((
                "kafka",
                BrokerProbe::from_config(&config.kafka, metrics).map(|p| Arc::new(p) as Arc<dyn Testable>),
            ));
        }

        candidates
            .into_iter()
            .filter_map(|(kind, result)| match result {
                Ok(probe) => Some(probe),
                Err(e) => {
                    tracing::error!(probe = kind, error = %e, "Failed to construct probe, skipping");
                    None
                }
            })
            .collect()
    }

    /// Initialize each probe in turn, registering the ones that succeed.
    ///
    /// Cancelling `cancel` aborts the initialization in progress and skips
    /// the rest. Skipped probes are still released by [`cleanup`](Self::cleanup).
    pub async fn initialize(probes: Vec<Arc<dyn Testable>>, cancel: &CancellationToken) -> Self {
        let mut registry = Self::default();

        for probe in probes {
            let name = probe.name().to_string();
            if cancel.is_cancelled() {
                tracing::warn!(probe = %name, "Shutting down, skipping probe initialization");
                registry.constructed.push(probe);
                continue;
            }
            tracing::info!(probe = %name, "Initializing probe");

            match probe.init(cancel).await {
                Ok(()) => {
                    tracing::info!(probe = %name, route = %route_path(&name), "Probe registered");
                    registry.registered.push(probe.clone());
                }
                Err(e) => {
                    tracing::error!(probe = %name, error = %e, "Probe initialization failed, skipping");
                }
            }
            registry.constructed.push(probe);
        }

        registry
    }

    pub fn registered(&self) -> &[Arc<dyn Testable>] {
        &self.registered
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Release every constructed probe, in reverse construction order.
    ///
    /// Each release runs even if an earlier one failed; failures are logged
    /// and counted.
    pub async fn cleanup(&self) -> usize {
        let mut failures = 0;
        for probe in self.constructed.iter().rev() {
            match probe.cleanup().await {
                Ok(()) => tracing::debug!(probe = %probe.name(), "Probe cleaned up"),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(probe = %probe.name(), error = %e, "Probe cleanup failed");
                }
            }
        }
        failures
    }
}
