//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with an identifying user agent string
//! - GET requests bounded by the configured timeout
//! - Optional per-host request spacing
//! - Error classification
//!
//! There are no retries: a failed fetch becomes a failed record.

use crate::config::UserAgentConfig;
use crate::state::HostThrottle;
use crate::url::host_key;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("{0}")]
    Other(String),
}

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value, if sent
    pub content_type: Option<String>,

    /// Raw response body
    pub body: Vec<u8>,
}

/// Retrieves raw page content
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Overall per-request timeout
///
/// # Example
///
/// ```no_run
/// use priority_crawl::config::UserAgentConfig;
/// use priority_crawl::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig::default();
/// let client = build_http_client(&config, Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies a transport-level reqwest error
fn classify_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_connect() {
        FetchError::Connection(error.to_string())
    } else if error.is_redirect() {
        FetchError::Other(format!("redirect error: {}", error))
    } else {
        FetchError::Other(error.to_string())
    }
}

/// Fetcher backed by a reqwest client
pub struct HttpFetcher {
    client: Client,
    throttle: Option<HostThrottle>,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            throttle: None,
        }
    }

    /// Builds a fetcher with the crawler's user agent and timeout
    pub fn from_config(user_agent: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, timeout)?))
    }

    /// Limits each host to `requests` per minute
    pub fn with_requests_per_minute(mut self, requests: Option<u32>) -> Self {
        self.throttle = requests.map(HostThrottle::per_minute);
        self
    }

    pub fn with_throttle(mut self, throttle: HostThrottle) -> Self {
        self.throttle = Some(throttle);
        self
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        if let (Some(throttle), Some(host)) = (&self.throttle, host_key(url)) {
            throttle.acquire(&host).await;
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_error(&e))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| classify_error(&e))?;

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }
}
