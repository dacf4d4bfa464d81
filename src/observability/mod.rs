//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Probes and handlers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms via an injected sink)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → Metrics endpoint (Prometheus scrape on /metrics)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID attached to every request span
//! - Metrics sink constructed once in main and passed down explicitly

pub mod logging;
pub mod metrics;

pub use metrics::{measure, LatencyMetric, MetricsSink, PrometheusSink};
