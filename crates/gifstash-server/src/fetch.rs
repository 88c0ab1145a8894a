use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ServerError, ServerResult};

/// Retrieves a remote payload named by a link upload.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> ServerResult<Vec<u8>>;
}

/// Fetches over HTTP(S) with a bounded timeout.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> ServerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PayloadFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> ServerResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                warn!(url, error = %e, "remote fetch failed");
                ServerError::InvalidContent(e.to_string())
            })?;
        let body = response.bytes().await.map_err(|e| {
            warn!(url, error = %e, "remote body unreadable");
            ServerError::InvalidContent(e.to_string())
        })?;
        debug!(url, bytes = body.len(), "fetched remote payload");
        Ok(body.to_vec())
    }
}
