//! Object storage round trip: upload the value, download it again.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backend::{GcsStore, ObjectStore, TokenSource};
use crate::config::BucketConfig;
use crate::observability::metrics::{measure, MetricsSink, BUCKET_READ, BUCKET_WRITE};
use crate::probe::{ProbeError, Testable};

pub struct BucketProbe {
    store: Box<dyn ObjectStore>,
    target: String,
    object: String,
    metrics: Arc<dyn MetricsSink>,
}

impl BucketProbe {
    pub fn new(
        store: Box<dyn ObjectStore>,
        bucket: &str,
        object: impl Into<String>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let object = object.into();
        Self {
            store,
            target: format!("gs://{bucket}/{object}"),
            object,
            metrics,
        }
    }

    pub fn from_config(config: &BucketConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, ProbeError> {
        if config.name.is_empty() {
            return Err(ProbeError::Config("bucket name is not set".to_string()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProbeError::Config(format!("http client: {e}")))?;
        let auth = TokenSource::from_config(&config.token, client.clone())
            .map_err(|e| ProbeError::Config(format!("token source: {e}")))?;
        let store = GcsStore::new(client, &config.endpoint, config.name.as_str(), auth)
            .map_err(|e| ProbeError::Config(format!("bucket endpoint: {e}")))?;

        Ok(Self::new(Box::new(store), &config.name, config.object_name.as_str(), metrics))
    }
}

#[async_trait]
impl Testable for BucketProbe {
    fn name(&self) -> &str {
        "bucket"
    }

    async fn init(&self, _cancel: &CancellationToken) -> Result<(), ProbeError> {
        self.store
            .check()
            .await
            .map_err(ProbeError::backend("check", self.target.as_str()))
    }

    async fn test(&self, value: &str) -> Result<String, ProbeError> {
        measure(self.metrics.as_ref(), BUCKET_WRITE, self.store.write(&self.object, value.as_bytes()))
            .await
            .map_err(ProbeError::backend("write", self.target.as_str()))?;

        let data = measure(self.metrics.as_ref(), BUCKET_READ, self.store.read(&self.object))
            .await
            .map_err(ProbeError::backend("read", self.target.as_str()))?;

        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    async fn cleanup(&self) -> Result<(), ProbeError> {
        self.store
            .close()
            .await
            .map_err(ProbeError::backend("close", self.target.as_str()))
    }
}
