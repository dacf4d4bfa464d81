//! S3-compatible object storage round trip against a Ceph RADOS Gateway.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backend::{ObjectStore, RgwStore};
use crate::config::CephConfig;
use crate::observability::metrics::{measure, MetricsSink, RGW_READ, RGW_WRITE};
use crate::probe::{ProbeError, Testable};

pub struct CephProbe {
    store: Box<dyn ObjectStore>,
    target: String,
    object: String,
    metrics: Arc<dyn MetricsSink>,
}

impl CephProbe {
    pub fn new(
        store: Box<dyn ObjectStore>,
        bucket: &str,
        object: impl Into<String>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let object = object.into();
        Self {
            store,
            target: format!("s3://{bucket}/{object}"),
            object,
            metrics,
        }
    }

    pub fn from_config(config: &CephConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, ProbeError> {
        if !config.is_complete() {
            return Err(ProbeError::Config(
                "ceph host, bucket, access key and secret key must all be set".to_string(),
            ));
        }
        let store = RgwStore::new(config).map_err(|e| ProbeError::Config(format!("ceph bucket: {e}")))?;
        Ok(Self::new(Box::new(store), &config.bucket, config.object_name.as_str(), metrics))
    }
}

#[async_trait]
impl Testable for CephProbe {
    fn name(&self) -> &str {
        "ceph"
    }

    async fn init(&self, _cancel: &CancellationToken) -> Result<(), ProbeError> {
        self.store
            .check()
            .await
            .map_err(ProbeError::backend("check", self.target.as_str()))
    }

    async fn test(&self, value: &str) -> Result<String, ProbeError> {
        measure(self.metrics.as_ref(), RGW_WRITE, self.store.write(&self.object, value.as_bytes()))
            .await
            .map_err(ProbeError::backend("write", self.target.as_str()))?;

        let data = measure(self.metrics.as_ref(), RGW_READ, self.store.read(&self.object))
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
