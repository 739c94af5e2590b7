//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Per-request timeouts and run cancellation
//! - Error classification
//!
//! Transport is a trait so the crawl can be driven against canned responses.

use crate::config::CrawlerConfig;
use crate::state::Page;
use crate::url::strip_trailing_colon;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A way of turning a URL into a response body
///
/// Implementations must report non-success statuses as [`FetchError::HttpStatus`]
/// and never retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.fetch_timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Transport`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify(url, e))
    }
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_builder() {
        FetchError::InvalidUrl(url.to_string())
    } else {
        FetchError::ConnectionFailed {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Single-page fetcher shared by every crawl step
///
/// Applies trailing-colon cleanup to every URL, bounds each request by the
/// configured timeout, and gives up as soon as the run is cancelled.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            timeout,
            cancel,
        }
    }

    /// Fetches one page
    ///
    /// # Errors
    ///
    /// * `InvalidUrl` - the URL is empty after cleanup
    /// * `Timeout` - no response within the per-request timeout
    /// * `Cancelled` - the run was cancelled before the response arrived
    /// * anything the transport reports
    pub async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        let url = strip_trailing_colon(url);
        if url.is_empty() {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled {
                url: url.to_string(),
            });
        }

        let request = tokio::time::timeout(self.timeout, self.transport.get(url));

        let body = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(FetchError::Cancelled { url: url.to_string() });
            }
            result = request => match result {
                Ok(body) => body?,
                Err(_) => return Err(FetchError::Timeout { url: url.to_string() }),
            },
        };

        Ok(Page {
            url: url.to_string(),
            body,
        })
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
