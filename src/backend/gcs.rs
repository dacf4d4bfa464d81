//! Object storage client for the Cloud Storage JSON API.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use url::Url;

use crate::backend::{ensure_success, BackendError, ObjectStore, TokenSource};

/// A single bucket reached through the JSON API.
#[derive(Debug)]
pub struct GcsStore {
    client: reqwest::Client,
    endpoint: Url,
    bucket: String,
    auth: TokenSource,
}

impl GcsStore {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        bucket: impl Into<String>,
        auth: TokenSource,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            client,
            endpoint: endpoint.parse()?,
            bucket: bucket.into(),
            auth,
        })
    }

    /// Append percent-encoded path segments to the endpoint.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Protocol(format!("endpoint cannot be a base url: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, object: &str) -> Result<Url, BackendError> {
        self.url(&["storage", "v1", "b", &self.bucket, "o", object])
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn check(&self) -> Result<(), BackendError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket])?;
        let request = self.auth.authorize(self.client.get(url)).await?;
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    async fn write(&self, object: &str, data: &[u8]) -> Result<(), BackendError> {
        let mut upload = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        upload
            .query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object);
        let request = self
            .client
            .post(upload)
            .header(CONTENT_TYPE, "text/plain")
            .body(data.to_vec());
        ensure_success(self.auth.authorize(request).await?.send().await?).await?;

        // Reads must never be served from an edge cache.
        let patch = self
            .client
            .patch(self.object_url(object)?)
            .json(&json!({ "cacheControl": "no-store" }));
        ensure_success(self.auth.authorize(patch).await?.send().await?).await?;
        Ok(())
    }

    async fn read(&self, object: &str) -> Result<Vec<u8>, BackendError> {
        let mut url = self.object_url(object)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let request = self.auth.authorize(self.client.get(url)).await?;
        let response = ensure_success(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
