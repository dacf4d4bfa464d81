//! OAuth access tokens for the Google REST APIs.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::backend::{ensure_success, BackendError};
use crate::config::TokenConfig;

/// Refresh this long before the advertised expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum TokenKind {
    Anonymous,
    Static(String),
    Metadata(url::Url),
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Supplies bearer tokens, caching metadata-server tokens until near expiry.
#[derive(Debug)]
pub struct TokenSource {
    kind: TokenKind,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn from_config(config: &TokenConfig, client: reqwest::Client) -> Result<Self, BackendError> {
        let kind = match &config.access_token {
            Some(token) if !token.is_empty() => TokenKind::Static(token.clone()),
            _ if config.token_url.is_empty() => TokenKind::Anonymous,
            _ => TokenKind::Metadata(config.token_url.parse()?),
        };
        Ok(Self {
            kind,
            client,
            cached: Mutex::new(None),
        })
    }

    /// A source that never authenticates.
    pub fn anonymous(client: reqwest::Client) -> Self {
        Self {
            kind: TokenKind::Anonymous,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Attach a bearer token to `request` when one is configured.
    pub async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, BackendError> {
        Ok(match self.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn token(&self) -> Result<Option<String>, BackendError> {
        let url = match &self.kind {
            TokenKind::Anonymous => return Ok(None),
            TokenKind::Static(token) => return Ok(Some(token.clone())),
            TokenKind::Metadata(url) => url,
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(Some(token.value.clone()));
            }
        }

        let response = self
            .client
            .get(url.clone())
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let fresh: MetadataToken = ensure_success(response).await?.json().await?;
        tracing::debug!(expires_in = fresh.expires_in, "Fetched access token from metadata server");

        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(Some(fresh.access_token))
    }
}
