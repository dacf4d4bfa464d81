//! Backend client subsystem.
//!
//! # Data Flow
//! ```text
//! Probe
//!     → capability trait (ObjectStore / SqlClient / WarehouseClient / BrokerConnector)
//!     → concrete client
//!         gcs.rs      (object storage JSON API over reqwest)
//!         rgw.rs      (S3-compatible object storage via rust-s3)
//!         postgres.rs (sqlx connection pool)
//!         bigquery.rs (query jobs over reqwest, wait for completion)
//!         kafka.rs    (TCP / mutual TLS connection per broker)
//!     → BackendError on any transport, status or protocol failure
//! ```
//!
//! # Design Decisions
//! - Probes only see the traits, so tests substitute in-memory fakes
//! - Clients never retry; retry policy belongs to the caller
//! - "Already exists" is classified here, where the wire-level codes are known

pub mod auth;
pub mod bigquery;
pub mod gcs;
pub mod kafka;
pub mod postgres;
pub mod rgw;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use auth::TokenSource;
pub use bigquery::BigQueryClient;
pub use gcs::GcsStore;
pub use kafka::KafkaConnector;
pub use postgres::PgClient;
pub use rgw::RgwStore;

/// Postgres SQLSTATE for `duplicate_table`.
const PG_DUPLICATE_TABLE: &str = "42P07";

/// Errors returned by backend clients.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    /// True for errors meaning the resource being provisioned is already there.
    pub fn is_already_exists(&self) -> bool {
        match self {
            BackendError::Status { status, .. } => *status == 409,
            BackendError::Sql(sqlx::Error::Database(db)) => db.code().as_deref() == Some(PG_DUPLICATE_TABLE),
            _ => false,
        }
    }
}

/// Object storage capability.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Verify the bucket is reachable with the configured credentials.
    /// Stores without a cheap check accept unconditionally.
    async fn check(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn write(&self, object: &str, data: &[u8]) -> Result<(), BackendError>;

    async fn read(&self, object: &str) -> Result<Vec<u8>, BackendError>;

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// A positional SQL argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    BigInt(i64),
    Text(String),
}

/// Relational database capability.
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// Execute a statement, returning the number of affected rows.
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64, BackendError>;

    /// Run a query selecting a single text column.
    async fn query_strings(&self, sql: &str) -> Result<Vec<String>, BackendError>;

    /// Run a one-off setup statement on a fresh connection, so a failure to
    /// connect is reported as the underlying error.
    async fn provision(&self, sql: &str) -> Result<(), BackendError> {
        self.execute(sql, &[]).await.map(|_| ())
    }

    async fn close(&self);
}

/// Analytics warehouse capability. Every call is a job that has completed
/// by the time it returns.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Fully qualified table name, for logs and error context.
    fn table_id(&self) -> String;

    async fn create_table(&self) -> Result<(), BackendError>;

    async fn insert(&self, message: &str) -> Result<(), BackendError>;

    async fn read_messages(&self) -> Result<Vec<String>, BackendError>;

    async fn truncate(&self) -> Result<(), BackendError>;

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// An open connection to one broker.
#[async_trait]
pub trait BrokerConnection: Send {
    fn is_connected(&self) -> bool;

    async fn close(&mut self) -> Result<(), BackendError>;
}

/// Message broker capability.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open(&self, address: &str) -> Result<Box<dyn BrokerConnection>, BackendError>;
}

/// Turn a non-2xx response into `BackendError::Status`, keeping the body for context.
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}
