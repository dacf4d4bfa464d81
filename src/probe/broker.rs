//! Broker connectivity probe.
//!
//! Unlike the other probes no data moves through the backend: a test opens a
//! connection to every configured broker, confirms it is connected and
//! closes it again. The value is handed back unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendError, BrokerConnector, KafkaConnector};
use crate::config::KafkaConfig;
use crate::observability::metrics::{measure, MetricsSink, KAFKA_CONNECT};
use crate::probe::{ProbeError, Testable};

pub struct BrokerProbe {
    connector: Box<dyn BrokerConnector>,
    brokers: Vec<String>,
    metrics: Arc<dyn MetricsSink>,
}

impl BrokerProbe {
    pub fn new(
        connector: Box<dyn BrokerConnector>,
        brokers: Vec<String>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ProbeError> {
        if brokers.is_empty() {
            return Err(ProbeError::Config("no brokers configured".to_string()));
        }
        Ok(Self {
            connector,
            brokers,
            metrics,
        })
    }

    pub fn from_config(config: &KafkaConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self, ProbeError> {
        let connector =
            KafkaConnector::from_config(config).map_err(|e| ProbeError::Config(format!("broker tls: {e}")))?;
        Self::new(Box::new(connector), config.broker_list(), metrics)
    }

    async fn check(&self, address: &str) -> Result<(), BackendError> {
        let mut connection = self.connector.open(address).await?;
        if !connection.is_connected() {
            return Err(BackendError::Protocol("connection is not established".to_string()));
        }
        connection.close().await
    }

    async fn check_all(&self) -> Result<(), ProbeError> {
        for address in &self.brokers {
            measure(self.metrics.as_ref(), KAFKA_CONNECT, self.check(address))
                .await
                .map_err(ProbeError::backend("connect", format!("broker {address}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Testable for BrokerProbe {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn init(&self, cancel: &CancellationToken) -> Result<(), ProbeError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            result = self.check_all() => result,
        }
    }

    async fn test(&self, value: &str) -> Result<String, ProbeError> {
        self.check_all().await?;
        Ok(value.to_string())
    }

    async fn cleanup(&self) -> Result<(), ProbeError> {
        Ok(())
    }
}
