//! Network fetch collaborator.
//!
//! Everything that touches the network (manifests and segments) goes through
//! the `Fetcher` trait so tests can inject scripted responses. `HttpFetcher`
//! is the real implementation over a shared reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Raw response from a fetch: HTTP status plus the full body.
/// Non-success statuses are returned here, not mapped to errors; callers
/// decide whether a 404 on a manifest and a 404 on a segment mean the same thing.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8 text (lossy). Used for manifest parsing.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level fetch failure (DNS, connect, timeout, protocol).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-reqwest fetchers (tests, alternative transports) report through here.
    #[error("{0}")]
    Other(String),
}

/// Abstract network fetch. One call, one response; no caching assumed.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Fetcher backed by a reqwest client with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(request_timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?.to_vec();
        Ok(FetchResponse { status, body })
    }
}
