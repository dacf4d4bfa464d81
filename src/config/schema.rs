//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the test app.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the test app.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Diagnostic HTTP endpoint settings.
    pub http: HttpConfig,

    /// Settings shared by every probe route.
    pub probes: ProbesConfig,

    /// Object storage probe.
    pub bucket: BucketConfig,

    /// S3-compatible (Ceph RGW) object storage probe.
    pub ceph: CephConfig,

    /// Relational database probe.
    pub database: DatabaseConfig,

    /// Data warehouse probe.
    pub bigquery: BigQueryConfig,

    /// Message broker probe.
    pub kafka: KafkaConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Diagnostic endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Body returned by `/ping`.
    pub ping_response: String,

    /// URL fetched by `/connect`.
    pub connect_url: String,

    /// Seconds to keep serving after a shutdown signal.
    pub graceful_shutdown_wait_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            ping_response: "pong\n".to_string(),
            connect_url: "https://google.com".to_string(),
            graceful_shutdown_wait_secs: 0,
        }
    }
}

/// Settings shared by every probe route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbesConfig {
    /// Ceiling on a single round trip, in seconds.
    pub test_timeout_secs: u64,
}

impl ProbesConfig {
    pub fn test_timeout(&self) -> Duration {
        Duration::from_secs(self.test_timeout_secs)
    }
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            test_timeout_secs: 10,
        }
    }
}

/// OAuth access token settings for the Google APIs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Static bearer token. Takes precedence over `token_url` when set.
    pub access_token: Option<String>,

    /// Metadata server endpoint handing out workload identity tokens.
    /// An empty string disables authentication entirely.
    pub token_url: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            token_url:
                "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token"
                    .to_string(),
        }
    }
}

/// Object storage probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BucketConfig {
    /// Bucket name. The probe is skipped when empty.
    pub name: String,

    /// Object overwritten by every round trip.
    pub object_name: String,

    /// Storage API base URL.
    pub endpoint: String,

    #[serde(flatten)]
    pub token: TokenConfig,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            object_name: "test".to_string(),
            endpoint: "https://storage.googleapis.com".to_string(),
            token: TokenConfig::default(),
        }
    }
}

/// S3-compatible object storage probe configuration.
///
/// The probe is only attempted when host, bucket and both keys are set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CephConfig {
    /// Gateway base URL, addressed path-style.
    pub host: String,

    pub bucket: String,

    pub region: String,

    pub access_key: String,

    pub secret_key: String,

    /// Object overwritten by every round trip.
    pub object_name: String,
}

impl CephConfig {
    pub fn is_complete(&self) -> bool {
        [&self.host, &self.bucket, &self.access_key, &self.secret_key]
            .iter()
            .all(|v| !v.is_empty())
    }
}

impl Default for CephConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            bucket: String::new(),
            region: "us-east-1".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            object_name: "test".to_string(),
        }
    }
}

/// Relational database probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database host. The probe is skipped when empty.
    pub host: String,

    pub port: u16,

    pub user: String,

    pub password: String,

    /// Database name.
    pub name: String,

    /// Single-row table used for the round trip.
    pub table: String,

    /// Per-connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total time allowed for initialization, in seconds.
    pub max_retry_secs: u64,

    /// Wait between initialization attempts, in seconds.
    pub retry_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            user: "sqluser".to_string(),
            password: String::new(),
            name: "sqldatabase".to_string(),
            table: "test".to_string(),
            connect_timeout_secs: 5,
            max_retry_secs: 120,
            retry_interval_secs: 10,
        }
    }
}

/// Data warehouse probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BigQueryConfig {
    pub project_id: String,

    /// Dataset holding the test table. The probe is skipped when empty.
    pub dataset: String,

    /// Test table. The probe is skipped when empty.
    pub table: String,

    /// BigQuery API base URL.
    pub endpoint: String,

    /// How long a single query job may run before it is abandoned, in seconds.
    pub job_timeout_secs: u64,

    pub max_retry_secs: u64,

    pub retry_interval_secs: u64,

    #[serde(flatten)]
    pub token: TokenConfig,
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            dataset: String::new(),
            table: String::new(),
            endpoint: "https://bigquery.googleapis.com".to_string(),
            job_timeout_secs: 10,
            max_retry_secs: 30,
            retry_interval_secs: 5,
            token: TokenConfig::default(),
        }
    }
}

/// Message broker probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma separated `host:port` list. The probe is skipped when empty.
    pub brokers: String,

    /// CA bundle (PEM) used to verify the brokers.
    pub ca_path: String,

    /// Client certificate (PEM).
    pub certificate_path: String,

    /// Client private key (PEM).
    pub private_key_path: String,

    pub connect_timeout_secs: u64,
}

impl KafkaConfig {
    /// Broker addresses with surrounding whitespace and empty entries removed.
    pub fn broker_list(&self) -> Vec<String> {
        self.brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// True when any TLS material is configured.
    pub fn tls_enabled(&self) -> bool {
        !(self.ca_path.is_empty() && self.certificate_path.is_empty() && self.private_key_path.is_empty())
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            ca_path: String::new(),
            certificate_path: String::new(),
            private_key_path: String::new(),
            connect_timeout_secs: 5,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}
