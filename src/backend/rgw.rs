//! S3-compatible object storage client for Ceph RADOS Gateway.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use crate::backend::{BackendError, ObjectStore};
use crate::config::CephConfig;

/// One bucket on an S3-compatible gateway, addressed path-style.
pub struct RgwStore {
    bucket: Box<Bucket>,
}

impl std::fmt::Debug for RgwStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgwStore").field("bucket", &self.bucket.name()).finish()
    }
}

impl RgwStore {
    pub fn new(config: &CephConfig) -> Result<Self, BackendError> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.host.clone(),
        };
        let credentials = Credentials::new(
            Some(config.access_key.as_str()),
            Some(config.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| BackendError::Protocol(format!("s3 credentials: {e}")))?;
        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(s3_error)?
            .with_path_style();

        Ok(Self { bucket })
    }
}

/// Keep the provider's status code so non-2xx answers read like the other stores.
fn s3_error(error: S3Error) -> BackendError {
    match error {
        S3Error::HttpFailWithBody(status, body) => BackendError::Status { status, body },
        other => BackendError::Protocol(format!("s3: {other}")),
    }
}

fn key(object: &str) -> String {
    format!("/{}", object.trim_start_matches('/'))
}

#[async_trait]
impl ObjectStore for RgwStore {
    async fn write(&self, object: &str, data: &[u8]) -> Result<(), BackendError> {
        self.bucket
            .put_object_with_content_type(key(object), data, "text/plain")
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn read(&self, object: &str) -> Result<Vec<u8>, BackendError> {
        let response = self.bucket.get_object(key(object)).await.map_err(s3_error)?;
        Ok(response.bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_rooted_once() {
        assert_eq!(key("test"), "/test");
        assert_eq!(key("/test"), "/test");
    }

    #[test]
    fn failed_status_is_kept() {
        let err = s3_error(S3Error::HttpFailWithBody(403, "AccessDenied".to_string()));
        assert!(matches!(err, BackendError::Status { status: 403, .. }));
        assert_eq!(err.to_string(), "unexpected status 403: AccessDenied");
    }
}
