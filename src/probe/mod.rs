//! Probe subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (registry.rs):
//!     AppConfig
//!     → construct each configured probe (skip on configuration error)
//!     → Testable::init under the root token (skip on failure)
//!     → registered probes, one route each
//!
//! Request (via http/verify.rs):
//!     Testable::test(value)
//!     → write value to backend (measured)
//!     → read value back (measured)
//!     → value read, or ProbeError
//!
//! Shutdown:
//!     registry cleanup fan-out over every constructed probe
//! ```
//!
//! # Design Decisions
//! - Probes depend on capability traits from `backend`, never on concrete clients
//! - `init` may retry; `test` never does
//! - Concurrent tests against the same probe share one backend resource and
//!   are not isolated from each other

pub mod broker;
pub mod bucket;
pub mod ceph;
pub mod database;
pub mod registry;
pub mod warehouse;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backend::BackendError;
use crate::resilience::RetryError;

pub use broker::BrokerProbe;
pub use bucket::BucketProbe;
pub use ceph::CephProbe;
pub use database::DatabaseProbe;
pub use registry::ProbeRegistry;
pub use warehouse::WarehouseProbe;

/// One backend that can be verified with a write-then-read round trip.
#[async_trait]
pub trait Testable: Send + Sync {
    /// Stable identifier used for the route path, logs and metrics.
    fn name(&self) -> &str;

    /// Idempotent provisioning. Runs once, before any `test` call.
    async fn init(&self, cancel: &CancellationToken) -> Result<(), ProbeError>;

    /// Write `value`, read it back and return what was read.
    async fn test(&self, value: &str) -> Result<String, ProbeError>;

    /// Release held clients. Must tolerate a probe whose `init` never succeeded.
    async fn cleanup(&self) -> Result<(), ProbeError>;
}

/// Errors surfaced by probes.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{op} {target}: {source}")]
    Backend {
        op: &'static str,
        target: String,
        #[source]
        source: BackendError,
    },

    #[error("expected exactly one row, found {0}")]
    RowCount(usize),

    #[error(transparent)]
    Retry(#[from] RetryError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

impl ProbeError {
    /// Adapter for `map_err` that tags a backend error with what was being done.
    pub fn backend(op: &'static str, target: impl Into<String>) -> impl FnOnce(BackendError) -> ProbeError {
        let target = target.into();
        move |source| ProbeError::Backend { op, target, source }
    }
}

/// Pick the single row a round trip must leave behind.
pub(crate) fn single_row(mut rows: Vec<String>) -> Result<String, ProbeError> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        n => Err(ProbeError::RowCount(n)),
    }
}
