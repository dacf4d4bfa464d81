//! Analytics warehouse round trip: insert, read back, then truncate so the
//! next invocation starts from an empty table. The truncate runs whatever
//! the read returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, BigQueryClient, TokenSource, WarehouseClient};
use crate::config::BigQueryConfig;
use crate::observability::metrics::{measure, MetricsSink, BIGQUERY_INSERT, BIGQUERY_READ};
use crate::probe::{single_row, ProbeError, Testable};
use crate::resilience::{retry, RetryConfig};

pub struct WarehouseProbe {
    client: Box<dyn WarehouseClient>,
    retry: RetryConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl WarehouseProbe {
    pub fn new(client: Box<dyn WarehouseClient>, retry: RetryConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { client, retry, metrics }
    }

    pub fn from_config(config: &BigQueryConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, ProbeError> {
        if config.dataset.is_empty() || config.table.is_empty() {
            return Err(ProbeError::Config("bigquery dataset and table must both be set".to_string()));
        }
        if config.project_id.is_empty() {
            return Err(ProbeError::Config("bigquery project id is not set".to_string()));
        }
        let retry = RetryConfig::from_secs(config.max_retry_secs, config.retry_interval_secs)
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ProbeError::Config(format!("http client: {e}")))?;
        let auth = TokenSource::from_config(&config.token, http.clone())
            .map_err(|e| ProbeError::Config(format!("token source: {e}")))?;
        let client = BigQueryClient::new(
            http,
            &config.endpoint,
            config.project_id.as_str(),
            config.dataset.as_str(),
            config.table.as_str(),
            auth,
            Duration::from_secs(config.job_timeout_secs),
        )
        .map_err(|e| ProbeError::Config(format!("bigquery endpoint: {e}")))?;

        Ok(Self::new(Box::new(client), retry, metrics))
    }

    async fn read(&self) -> Result<String, ProbeError> {
        let rows = self
            .client
            .read_messages()
            .await
            .map_err(ProbeError::backend("read", self.client.table_id()))?;
        single_row(rows)
    }
}

#[async_trait]
impl Testable for WarehouseProbe {
    fn name(&self) -> &str {
        "bigquery"
    }

    async fn init(&self, cancel: &CancellationToken) -> Result<(), ProbeError> {
        retry(&self.retry, cancel, || self.client.create_table(), BackendError::is_already_exists).await?;
        Ok(())
    }

    async fn test(&self, value: &str) -> Result<String, ProbeError> {
        measure(self.metrics.as_ref(), BIGQUERY_INSERT, self.client.insert(value))
            .await
            .map_err(ProbeError::backend("insert", self.client.table_id()))?;

        let read = measure(self.metrics.as_ref(), BIGQUERY_READ, self.read()).await;

        // Truncate after a failed read too, or leftover rows fail every later call.
        let truncated = self
            .client
            .truncate()
            .await
            .map_err(ProbeError::backend("truncate", self.client.table_id()));

        let read = read?;
        truncated?;
        Ok(read)
    }

    async fn cleanup(&self) -> Result<(), ProbeError> {
        self.client
            .close()
            .await
            .map_err(ProbeError::backend("close", self.client.table_id()))
    }
}
