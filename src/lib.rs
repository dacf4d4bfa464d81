//! Connectivity test app for platform-managed backends.
//!
//! Each configured backend (object storage, S3-compatible storage, Postgres,
//! BigQuery, Kafka) gets a probe that can round-trip a value on demand over
//! HTTP.

pub mod backend;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod probe;
pub mod resilience;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use probe::{ProbeRegistry, Testable};
