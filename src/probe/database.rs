//! Relational database round trip against a single-row table.
//!
//! The write replaces the table contents with one `(timestamp, data)` row;
//! the read expects to find exactly that row.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, PgClient, SqlClient, SqlValue};
use crate::config::DatabaseConfig;
use crate::observability::metrics::{measure, MetricsSink, DB_INSERT, DB_READ};
use crate::probe::{single_row, ProbeError, Testable};
use crate::resilience::{retry, RetryConfig};

pub struct DatabaseProbe {
    client: Box<dyn SqlClient>,
    table: String,
    retry: RetryConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl DatabaseProbe {
    /// `table` is interpolated into SQL and must already be a validated identifier.
    pub fn new(
        client: Box<dyn SqlClient>,
        table: impl Into<String>,
        retry: RetryConfig,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            retry,
            metrics,
        }
    }

    pub fn from_config(config: &DatabaseConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, ProbeError> {
        if config.host.is_empty() {
            return Err(ProbeError::Config("database host is not set".to_string()));
        }
        if config.password.is_empty() {
            return Err(ProbeError::Config("database password is not set".to_string()));
        }
        let retry = RetryConfig::from_secs(config.max_retry_secs, config.retry_interval_secs)
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        Ok(Self::new(Box::new(PgClient::new(config)), config.table.as_str(), retry, metrics))
    }

    async fn create_table(&self) -> Result<(), BackendError> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (timestamp BIGINT, data VARCHAR(255))",
            self.table
        );
        self.client.provision(&sql).await
    }

    async fn write(&self, value: &str) -> Result<(), BackendError> {
        self.client.execute(&format!("TRUNCATE TABLE {}", self.table), &[]).await?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        self.client
            .execute(
                &format!("INSERT INTO {} (timestamp, data) VALUES ($1, $2)", self.table),
                &[SqlValue::BigInt(nanos), SqlValue::Text(value.to_string())],
            )
            .await?;
        Ok(())
    }

    async fn read(&self) -> Result<String, ProbeError> {
        let rows = self
            .client
            .query_strings(&format!("SELECT data FROM {}", self.table))
            .await
            .map_err(ProbeError::backend("read", self.target()))?;
        single_row(rows)
    }

    fn target(&self) -> String {
        format!("table {}", self.table)
    }
}

#[async_trait]
impl Testable for DatabaseProbe {
    fn name(&self) -> &str {
        "database"
    }

    async fn init(&self, cancel: &CancellationToken) -> Result<(), ProbeError> {
        tracing::info!(
            table = %self.table,
            max_wait = ?self.retry.max_duration(),
            poll_interval = ?self.retry.poll_interval(),
            "Waiting for database to accept connections"
        );
        retry(&self.retry, cancel, || self.create_table(), BackendError::is_already_exists).await?;
        Ok(())
    }

    async fn test(&self, value: &str) -> Result<String, ProbeError> {
        measure(self.metrics.as_ref(), DB_INSERT, self.write(value))
            .await
            .map_err(ProbeError::backend("write", self.target()))?;

        measure(self.metrics.as_ref(), DB_READ, self.read()).await
    }

    async fn cleanup(&self) -> Result<(), ProbeError> {
        self.client.close().await;
        Ok(())
    }
}
