//! Broker connectivity over plain TCP or mutual TLS.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::backend::{BackendError, BrokerConnection, BrokerConnector};
use crate::config::KafkaConfig;

/// Opens one connection per broker address.
#[derive(Clone)]
pub struct KafkaConnector {
    tls: Option<TlsConnector>,
    connect_timeout: Duration,
}

impl std::fmt::Debug for KafkaConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaConnector")
            .field("tls", &self.tls.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl KafkaConnector {
    pub fn plaintext(connect_timeout: Duration) -> Self {
        Self {
            tls: None,
            connect_timeout,
        }
    }

    /// Build a connector, loading the CA, certificate and key when TLS is configured.
    pub fn from_config(config: &KafkaConfig) -> Result<Self, BackendError> {
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        if !config.tls_enabled() {
            return Ok(Self::plaintext(connect_timeout));
        }

        let mut roots = RootCertStore::empty();
        for cert in load_certs(Path::new(&config.ca_path))? {
            roots.add(cert).map_err(|e| BackendError::Tls(e.to_string()))?;
        }
        let certs = load_certs(Path::new(&config.certificate_path))?;
        let key = load_private_key(Path::new(&config.private_key_path))?;

        let tls = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| BackendError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .map_err(|e| BackendError::Tls(e.to_string()))?;

        Ok(Self {
            tls: Some(TlsConnector::from(Arc::new(tls))),
            connect_timeout,
        })
    }

    async fn connect(&self, address: &str) -> Result<KafkaConnection, BackendError> {
        let stream = TcpStream::connect(address).await?;
        let Some(tls) = &self.tls else {
            return Ok(KafkaConnection::Plain(stream));
        };

        let host = host_part(address);
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| BackendError::Tls(format!("{host}: {e}")))?;
        let stream = tls.connect(server_name, stream).await?;
        Ok(KafkaConnection::Tls(Box::new(stream)))
    }
}

#[async_trait]
impl BrokerConnector for KafkaConnector {
    async fn open(&self, address: &str) -> Result<Box<dyn BrokerConnection>, BackendError> {
        let connection = tokio::time::timeout(self.connect_timeout, self.connect(address))
            .await
            .map_err(|_| BackendError::Timeout(self.connect_timeout))??;
        tracing::debug!(broker = %address, tls = self.tls.is_some(), "Connected to broker");
        Ok(Box::new(connection))
    }
}

/// An established broker connection.
pub enum KafkaConnection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

#[async_trait]
impl BrokerConnection for KafkaConnection {
    fn is_connected(&self) -> bool {
        match self {
            KafkaConnection::Plain(stream) => stream.peer_addr().is_ok(),
            KafkaConnection::Tls(stream) => stream.get_ref().0.peer_addr().is_ok(),
        }
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        match self {
            KafkaConnection::Plain(stream) => stream.shutdown().await?,
            KafkaConnection::Tls(stream) => stream.shutdown().await?,
        }
        Ok(())
    }
}

/// Host portion of `host:port`, without IPv6 brackets.
fn host_part(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => address,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, BackendError> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(BackendError::Tls(format!("no certificates found in {}", path.display())));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, BackendError> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| BackendError::Tls(format!("no private key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn host_part_strips_port_and_brackets() {
        assert_eq!(host_part("broker-1.kafka:9093"), "broker-1.kafka");
        assert_eq!(host_part("[::1]:9092"), "::1");
        assert_eq!(host_part("localhost"), "localhost");
    }

    #[tokio::test]
    async fn opens_and_closes_plain_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let connector = KafkaConnector::plaintext(Duration::from_secs(1));
        let mut connection = connector.open(&address).await.unwrap();
        assert!(connection.is_connected());
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let connector = KafkaConnector::plaintext(Duration::from_secs(1));
        assert!(connector.open(&address).await.is_err());
    }

    #[test]
    fn missing_tls_files_fail_construction() {
        let config = KafkaConfig {
            brokers: "localhost:9093".to_string(),
            ca_path: "/nonexistent/ca.pem".to_string(),
            certificate_path: "/nonexistent/cert.pem".to_string(),
            private_key_path: "/nonexistent/key.pem".to_string(),
            connect_timeout_secs: 5,
        };
        assert!(matches!(KafkaConnector::from_config(&config), Err(BackendError::Io(_))));
    }
}
