//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with per-host spacing
//! - HTML content and link extraction
//! - Oracle-driven link selection
//! - The frontier and overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod scoring;

pub use coordinator::Coordinator;
pub use extractor::{extract, PageContent};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use frontier::{CrawlTarget, Frontier};
pub use scoring::{select_links, LinkSelection};

use crate::config::Config;
use crate::output::{ChannelSink, CrawlSummary, PageRecord};
use crate::url::normalize_url;
use crate::{ConfigError, CrawlError};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

/// Records buffered between the crawl task and the stream consumer
const RECORD_CHANNEL_CAPACITY: usize = 64;

/// Starts a crawl in the background and streams its records
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and the seed URL
/// 2. Build the HTTP fetcher and, if configured, the oracle
/// 3. Spawn the run on the current tokio runtime
///
/// Records arrive on the returned stream as pages complete; the stream ends
/// when the run does. Must be called from within a tokio runtime.
///
/// # Arguments
///
/// * `seed` - Absolute http(s) URL to start from
/// * `max_depth` - Deepest link distance from the seed to fetch
/// * `context` - Description of the content of interest, passed to the oracle
/// * `config` - Crawler configuration
pub fn crawl(
    seed: &str,
    max_depth: u32,
    context: &str,
    config: Config,
) -> Result<CrawlStream, CrawlError> {
    normalize_url(seed).map_err(|e| ConfigError::InvalidUrl(format!("seed {}: {}", seed, e)))?;

    let coordinator = Coordinator::from_config(&config)?;
    let cancel = coordinator.cancellation_token();
    let (sink, rx) = ChannelSink::new(RECORD_CHANNEL_CAPACITY);

    let seed = seed.to_string();
    let context = context.to_string();
    let handle = tokio::spawn(async move {
        coordinator.run(&seed, max_depth, &context, &sink).await
    });

    Ok(CrawlStream {
        records: ReceiverStream::new(rx),
        cancel,
        handle,
    })
}

/// Handle to a running crawl
///
/// Yields every [`PageRecord`] in completion order. [`CrawlStream::cancel`]
/// stops dispatching new fetches; [`CrawlStream::finish`] waits for the run
/// and returns its summary.
pub struct CrawlStream {
    records: ReceiverStream<PageRecord>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<CrawlSummary, CrawlError>>,
}

impl CrawlStream {
    /// Requests cancellation; pages already in flight still complete
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run to end and returns its summary
    ///
    /// Records not yet consumed from the stream are discarded.
    pub async fn finish(self) -> Result<CrawlSummary, CrawlError> {
        drop(self.records);
        self.handle
            .await
            .map_err(|e| CrawlError::Task(e.to_string()))?
    }
}

impl Stream for CrawlStream {
    type Item = PageRecord;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().records).poll_next(cx)
    }
}
