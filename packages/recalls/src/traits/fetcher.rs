//! Fetch collaborator for retrieving raw recall payloads.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};

/// Fetches the raw bytes of a recall notice.
///
/// All failures are retryable per record: the batch driver logs and moves on,
/// leaving the record in its prior state.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch raw bytes for a URL.
    async fn fetch(&self, url: &str) -> FetchResult<Vec<u8>>;

    /// Name for logging/debugging.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// HTTP fetcher with an enforced request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher with a 30 second timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            user_agent: "RecallBot/1.0".to_string(),
        }
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    FetchError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Http(Box::new(e))
            }
        })?;

        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}
