// Page fetching for the scraped sources.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

const USER_AGENT: &str = concat!("evo-monitor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read body from {url}: {source}")]
    Body { url: String, source: reqwest::Error },
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Request { source, .. } | FetchError::Body { source, .. } => {
                source.is_timeout()
            }
            _ => false,
        }
    }
}

/// Fetches a page body as text.
///
/// Production uses [`HttpFetcher`]; tests point it at a local mock server or
/// inject canned pages.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send>>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send>> {
        let client = self.client.clone();
        let url = url.to_string();
        Box::pin(async move {
            debug!(%url, "fetching page");
            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|source| FetchError::Request { url: url.clone(), source })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status { url, status: status.as_u16() });
            }

            response.text().await.map_err(|source| FetchError::Body { url, source })
        })
    }
}
