//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - The run lifecycle (`Idle -> Running -> Completed | Cancelled`)
//! - A pool of workers sharing one frontier
//! - Fetching, extraction and link selection for every target
//! - Handing every record to the sink
//!
//! Per-page problems never abort a run: a failed fetch becomes a failed
//! record, a failed oracle call expands nothing, a failed sink write is
//! counted and logged.

use crate::config::{validate, validate_crawler_config, Config, CrawlerConfig, UserAgentConfig};
use crate::crawler::extractor::extract;
use crate::crawler::fetcher::{FetchError, Fetcher, HttpFetcher};
use crate::crawler::frontier::{CrawlTarget, Frontier};
use crate::crawler::scoring::select_links;
use crate::oracle::{Analyzer, HttpOracle, Scorer};
use crate::output::{
    CrawlStats, CrawlSummary, FailureReason, PageRecord, RecordSink, ScoreAnnotations,
};
use crate::robots::RobotsCache;
use crate::state::CrawlState;
use crate::url::normalize_url;
use crate::{ConfigError, CrawlError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

impl From<FetchError> for FailureReason {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Timeout => Self::Timeout,
            FetchError::Connection(message) => Self::Connection { message },
            FetchError::Http { status } => Self::Http { status },
            FetchError::Other(message) => Self::Other { message },
        }
    }
}

/// Main crawler coordinator structure
///
/// A coordinator drives exactly one run; calling [`Coordinator::run`] a
/// second time fails with [`CrawlError::InvalidTransition`].
pub struct Coordinator {
    config: CrawlerConfig,
    fetcher: Arc<dyn Fetcher>,
    scorer: Option<Arc<dyn Scorer>>,
    analyzer: Option<Arc<dyn Analyzer>>,
    robots_agent: String,
    request_delay: Duration,
    scorer_timeout: Duration,
    cancel: CancellationToken,
    state: Mutex<CrawlState>,
}

impl Coordinator {
    /// Creates a coordinator around an existing fetcher
    ///
    /// The crawler configuration is validated here, before any network
    /// activity.
    pub fn new(config: CrawlerConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self, CrawlError> {
        validate_crawler_config(&config)?;
        let request_delay = config.request_delay()?;
        let scorer_timeout = config.scorer_timeout()?;

        Ok(Self {
            config,
            fetcher,
            scorer: None,
            analyzer: None,
            robots_agent: UserAgentConfig::default().crawler_name,
            request_delay,
            scorer_timeout,
            cancel: CancellationToken::new(),
            state: Mutex::new(CrawlState::Idle),
        })
    }

    /// Builds a coordinator with an HTTP fetcher and, when configured, the
    /// HTTP oracle
    pub fn from_config(config: &Config) -> Result<Self, CrawlError> {
        validate(config)?;

        let fetcher = HttpFetcher::from_config(&config.user_agent, config.crawler.fetch_timeout()?)?
            .with_requests_per_minute(config.crawler.requests_per_minute);

        let mut coordinator = Self::new(config.crawler.clone(), Arc::new(fetcher))?
            .with_user_agent(&config.user_agent);

        if let Some(oracle_config) = &config.oracle {
            if oracle_config.score_links || oracle_config.analyze_content {
                let oracle = Arc::new(HttpOracle::from_config(
                    oracle_config,
                    config.crawler.scorer_timeout()?,
                )?);
                if oracle_config.score_links {
                    coordinator = coordinator.with_scorer(oracle.clone());
                }
                if oracle_config.analyze_content {
                    coordinator = coordinator.with_analyzer(oracle);
                }
            }
        }

        Ok(coordinator)
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Uses the crawler name as the robots.txt product token
    pub fn with_user_agent(mut self, user_agent: &UserAgentConfig) -> Self {
        self.robots_agent = user_agent.crawler_name.clone();
        self
    }

    /// Replaces the cancellation token, e.g. to share one with a signal handler
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> CrawlState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: CrawlState) -> Result<(), CrawlError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: *state,
                to: next,
            });
        }
        tracing::debug!("Crawl state {} -> {}", *state, next);
        *state = next;
        Ok(())
    }

    /// Crawls from `seed` down to `max_depth`, writing every record to `sink`
    ///
    /// Returns once every worker has stopped: either the frontier ran dry
    /// (`Completed`) or the cancellation token fired (`Cancelled`). Only an
    /// invalid seed or a reused coordinator is an error.
    pub async fn run(
        &self,
        seed: &str,
        max_depth: u32,
        context: &str,
        sink: &dyn RecordSink,
    ) -> Result<CrawlSummary, CrawlError> {
        let seed_url = normalize_url(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("seed {}: {}", seed, e)))?;

        self.transition(CrawlState::Running)?;

        let started_at = Utc::now();
        let start_time = Instant::now();
        tracing::info!(
            "Starting crawl of {} (max depth {}, {} worker(s), {:?} order)",
            seed_url,
            max_depth,
            self.config.max_workers,
            self.config.traversal
        );

        let frontier = Frontier::new(max_depth, self.config.traversal).with_base(seed_url.clone());
        frontier.offer(seed, 0);

        let robots = self
            .config
            .respect_robots_txt
            .then(|| RobotsCache::new(Arc::clone(&self.fetcher), self.robots_agent.clone()));

        let run = CrawlRun {
            coordinator: self,
            frontier,
            robots,
            context,
            sink,
            max_depth,
            stats: Mutex::new(CrawlStats::new()),
            stopped_by_cancel: AtomicBool::new(false),
        };

        futures::future::join_all((0..self.config.max_workers).map(|id| run.worker(id))).await;

        if let Err(e) = sink.flush().await {
            tracing::warn!("Failed to flush record sink: {}", e);
            run.stats().record_sink_failure();
        }

        let final_state = if run.stopped_by_cancel.load(Ordering::SeqCst) {
            CrawlState::Cancelled
        } else {
            CrawlState::Completed
        };
        self.transition(final_state)?;

        let summary = run.stats().finish(
            final_state,
            run.frontier.visited_count(),
            started_at,
            start_time.elapsed(),
        );

        tracing::info!(
            "Crawl {}: {} succeeded, {} failed, {} links enqueued in {:?}",
            summary.state,
            summary.pages_succeeded,
            summary.pages_failed,
            summary.links_enqueued,
            summary.elapsed
        );

        Ok(summary)
    }
}

/// Everything one run's workers share
struct CrawlRun<'a> {
    coordinator: &'a Coordinator,
    frontier: Frontier,
    robots: Option<RobotsCache>,
    context: &'a str,
    sink: &'a dyn RecordSink,
    max_depth: u32,
    stats: Mutex<CrawlStats>,
    stopped_by_cancel: AtomicBool,
}

impl CrawlRun<'_> {
    fn stats(&self) -> std::sync::MutexGuard<'_, CrawlStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> &CrawlerConfig {
        &self.coordinator.config
    }

    /// Records that cancellation stopped a worker
    ///
    /// While other workers still have a page in flight the run is draining.
    fn observe_cancel(&self, worker_id: usize) {
        tracing::debug!("Worker {} observed cancellation", worker_id);
        self.stopped_by_cancel.store(true, Ordering::SeqCst);

        if self.frontier.in_flight() > 0 && self.coordinator.state() == CrawlState::Running {
            // Another worker may have won the race; either way we are draining
            let _ = self.coordinator.transition(CrawlState::Draining);
        }
    }

    async fn worker(&self, id: usize) {
        let cancel = &self.coordinator.cancel;
        let delay = self.coordinator.request_delay;

        loop {
            if cancel.is_cancelled() {
                self.observe_cancel(id);
                break;
            }

            // Register for wakeups before looking, so an offer or completion
            // between `take` and the wait is not missed
            let notified = self.frontier.changed();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let target = match self.frontier.take() {
                Some(target) => target,
                None => {
                    if self.frontier.is_idle() {
                        tracing::trace!("Worker {} found the frontier idle", id);
                        break;
                    }

                    let cancelled = tokio::select! {
                        _ = &mut notified => false,
                        _ = cancel.cancelled() => true,
                    };
                    if cancelled {
                        self.observe_cancel(id);
                        break;
                    }
                    continue;
                }
            };

            self.process(id, target).await;

            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }
    }

    /// Visits one target, emits its record and releases its frontier slot
    async fn process(&self, worker_id: usize, target: CrawlTarget) {
        if let Some(record) = self.visit(&target).await {
            tracing::info!(
                "[{}] {} {} (depth {})",
                worker_id,
                record.status,
                record.url,
                record.depth
            );

            self.stats().record_page(&record);
            if let Err(e) = self.sink.write(&record).await {
                tracing::warn!("Failed to write record for {}: {}", record.url, e);
                self.stats().record_sink_failure();
            }
        }

        self.frontier.complete();
    }

    /// Produces the record for one target
    ///
    /// Returns None when cancellation arrives before the fetch is sent.
    async fn visit(&self, target: &CrawlTarget) -> Option<PageRecord> {
        let url = target.url.as_str();

        if self.coordinator.cancel.is_cancelled() {
            tracing::debug!("Dropping {} (cancelled before fetch)", url);
            return None;
        }

        if let Some(robots) = &self.robots {
            if !robots.is_allowed(&target.url).await {
                tracing::debug!("{} disallowed by robots.txt", url);
                return Some(PageRecord::failed(url, target.depth, FailureReason::Robots));
            }
        }

        if self.coordinator.cancel.is_cancelled() {
            tracing::debug!("Dropping {} (cancelled during robots.txt check)", url);
            return None;
        }

        let page = match self.coordinator.fetcher.fetch(&target.url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!("Fetch failed for {}: {}", url, e);
                return Some(PageRecord::failed(url, target.depth, e.into()));
            }
        };

        let content = extract(&page.body, &page.final_url, self.config().max_body_chars);
        let mut annotations = ScoreAnnotations::default();

        if target.depth < self.max_depth {
            let selection = select_links(
                self.coordinator.scorer.as_deref(),
                &content.links,
                self.context,
                self.config(),
            )
            .await;

            let next_depth = target.depth + 1;
            let accepted = selection
                .links
                .iter()
                .filter(|(link, score)| match score {
                    Some(score) => self.frontier.offer_scored(link, next_depth, *score),
                    None => self.frontier.offer(link, next_depth),
                })
                .count();

            tracing::debug!(
                "{}: {} of {} links enqueued at depth {}",
                url,
                accepted,
                content.links.len(),
                next_depth
            );
            self.stats().record_enqueued(accepted);
            annotations.priority_map = selection.priority_map;
            annotations.purpose_tags = selection.purpose_tags;
        }

        if let Some(analyzer) = &self.coordinator.analyzer {
            if !content.body_text.is_empty() {
                let analysis = tokio::time::timeout(
                    self.coordinator.scorer_timeout,
                    analyzer.analyze(&content.body_text, self.context),
                )
                .await;

                match analysis {
                    Ok(Ok(analysis)) => {
                        annotations.categories = analysis.categories;
                        annotations.summary = analysis.summary;
                    }
                    Ok(Err(e)) => tracing::warn!("Content analysis failed for {}: {}", url, e),
                    Err(_) => tracing::warn!("Content analysis timed out for {}", url),
                }
            }
        }

        let mut record = PageRecord::success(url, target.depth, page.status);
        record.title = content.title;
        record.body_text = content.body_text;
        record.outbound_links = content.links;
        record.score_annotations = (!annotations.is_empty()).then_some(annotations);

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraversalOrder;
    use crate::crawler::fetcher::FetchedPage;
    use crate::oracle::{ContentAnalysis, LinkScore, OracleError};
    use crate::output::{MemorySink, SinkError};
    use crate::state::PageStatus;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use url::Url;

    /// In-memory web: path -> (status, html)
    struct StubFetcher {
        pages: HashMap<String, (u16, String)>,
        fetched: Mutex<Vec<(String, Instant)>>,
        cancel_after_first: Option<CancellationToken>,
        latency: Duration,
    }

    impl StubFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(path, html)| (path.to_string(), (200, html.to_string())))
                    .collect(),
                fetched: Mutex::new(Vec::new()),
                cancel_after_first: None,
                latency: Duration::ZERO,
            }
        }

        fn with_status(mut self, path: &str, status: u16) -> Self {
            self.pages.insert(path.to_string(), (status, String::new()));
            self
        }

        fn fetched_paths(&self) -> Vec<String> {
            self.fetched
                .lock()
                .unwrap()
                .iter()
                .map(|(p, _)| p.clone())
                .filter(|p| p != "/robots.txt")
                .collect()
        }

        fn start_times(&self) -> Vec<Instant> {
            self.fetched.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
            self.fetched
                .lock()
                .unwrap()
                .push((url.path().to_string(), Instant::now()));

            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            match self.pages.get(url.path()) {
                Some((200, html)) => Ok(FetchedPage {
                    final_url: url.clone(),
                    status: 200,
                    content_type: Some("text/html".to_string()),
                    body: html.as_bytes().to_vec(),
                }),
                Some((status, _)) => Err(FetchError::Http { status: *status }),
                None => Err(FetchError::Http { status: 404 }),
            }
        }
    }

    /// Scores links by path
    struct PathScorer(HashMap<&'static str, i64>);

    #[async_trait]
    impl Scorer for PathScorer {
        async fn score(&self, links: &[String], _context: &str) -> Result<Vec<LinkScore>, OracleError> {
            Ok(links
                .iter()
                .filter_map(|link| {
                    let path = Url::parse(link).ok()?.path().to_string();
                    let score = self.0.get(path.as_str())?;
                    Some(LinkScore::new(link.as_str(), *score, None))
                })
                .collect())
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl Scorer for FailingScorer {
        async fn score(&self, _links: &[String], _context: &str) -> Result<Vec<LinkScore>, OracleError> {
            Err(OracleError::Status(500))
        }
    }

    struct StaticAnalyzer;

    #[async_trait]
    impl Analyzer for StaticAnalyzer {
        async fn analyze(&self, _body: &str, _context: &str) -> Result<ContentAnalysis, OracleError> {
            Ok(ContentAnalysis {
                categories: vec!["docs".to_string()],
                summary: Some("A page".to_string()),
            })
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl RecordSink for RejectingSink {
        async fn write(&self, _record: &PageRecord) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    const SEED: &str = "http://site.test/";

    fn fast_config() -> CrawlerConfig {
        CrawlerConfig {
            request_delay_seconds: 0.0,
            ..CrawlerConfig::default()
        }
    }

    fn links(paths: &[&str]) -> String {
        let anchors: String = paths
            .iter()
            .map(|p| format!(r#"<a href="{}">{}</a>"#, p, p))
            .collect();
        format!("<html><body><p>page</p>{}</body></html>", anchors)
    }

    fn scorer(scores: &[(&'static str, i64)]) -> Arc<dyn Scorer> {
        Arc::new(PathScorer(scores.iter().copied().collect()))
    }

    #[tokio::test]
    async fn test_cycle_visits_each_page_once() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/b"]).as_str()),
            ("/b", links(&["/", "/b"]).as_str()),
        ]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone()).unwrap();
        let sink = MemorySink::new();

        let summary = coordinator.run(SEED, 5, "", &sink).await.unwrap();

        assert_eq!(fetcher.fetched_paths(), vec!["/", "/b"]);
        assert_eq!(summary.state, CrawlState::Completed);
        assert_eq!(summary.urls_seen, 2);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_records_keep_query_as_linked() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/list?page", "/list?page="]).as_str()),
            ("/list", links(&[]).as_str()),
        ]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone()).unwrap();
        let sink = MemorySink::new();

        coordinator.run(SEED, 1, "", &sink).await.unwrap();

        assert_eq!(fetcher.fetched_paths(), vec!["/", "/list"]);
        let urls: Vec<_> = sink.records().iter().map(|r| r.url.clone()).collect();
        assert_eq!(urls, vec![SEED, "http://site.test/list?page"]);
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/b"]).as_str()),
            ("/b", links(&["/c"]).as_str()),
            ("/c", links(&[]).as_str()),
        ]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone()).unwrap();
        let sink = MemorySink::new();

        coordinator.run(SEED, 1, "", &sink).await.unwrap();

        assert_eq!(fetcher.fetched_paths(), vec!["/", "/b"]);
        let depths: Vec<_> = sink.records().iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_threshold_filters_links() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/x", "/y"]).as_str()),
            ("/x", links(&[]).as_str()),
            ("/y", links(&[]).as_str()),
        ]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone())
            .unwrap()
            .with_scorer(scorer(&[("/x", 8), ("/y", 3)]));
        let sink = MemorySink::new();

        let summary = coordinator.run(SEED, 2, "pricing", &sink).await.unwrap();

        assert_eq!(fetcher.fetched_paths(), vec!["/", "/x"]);
        assert_eq!(summary.links_enqueued, 1);

        let seed = &sink.records()[0];
        let map = &seed.score_annotations.as_ref().unwrap().priority_map;
        assert_eq!(map.get("http://site.test/x"), Some(&8));
        assert_eq!(map.get("http://site.test/y"), Some(&3));
    }

    #[tokio::test]
    async fn test_scorer_failure_degrades_to_seed_only() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/a", "/b"]).as_str()),
            ("/a", links(&[]).as_str()),
        ]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone())
            .unwrap()
            .with_scorer(Arc::new(FailingScorer));
        let sink = MemorySink::new();

        let summary = coordinator.run(SEED, 2, "", &sink).await.unwrap();

        assert_eq!(summary.state, CrawlState::Completed);
        assert_eq!(fetcher.fetched_paths(), vec!["/"]);
        assert!(sink.records()[0].is_success());
    }

    #[tokio::test]
    async fn test_end_to_end_scored_crawl() {
        let fetcher = Arc::new(StubFetcher::new(&[
            (
                "/",
                "<html><head><title>Home</title></head><body>\
                 <a href=\"/p1\">one</a><a href=\"/p2\">two</a></body></html>",
            ),
            ("/p1", "<html><head><title>P1</title></head><body>content</body></html>"),
            ("/p2", "<html><body>never</body></html>"),
        ]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone())
            .unwrap()
            .with_scorer(scorer(&[("/p1", 9), ("/p2", 2)]));
        let sink = MemorySink::new();

        let summary = coordinator.run(SEED, 2, "products", &sink).await.unwrap();

        assert_eq!(fetcher.fetched_paths(), vec!["/", "/p1"]);
        let records = sink.records();
        assert_eq!(records[0].title.as_deref(), Some("Home"));
        assert_eq!(
            records[0].outbound_links,
            vec!["http://site.test/p1", "http://site.test/p2"]
        );
        assert_eq!(records[1].url, "http://site.test/p1");
        assert_eq!(records[1].depth, 1);
        assert_eq!(summary.pages_succeeded, 2);
        assert_eq!(coordinator.state(), CrawlState::Completed);
    }

    #[tokio::test]
    async fn test_politeness_delay_between_fetches() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/a", "/b"]).as_str()),
            ("/a", links(&[]).as_str()),
            ("/b", links(&[]).as_str()),
        ]));
        let config = CrawlerConfig {
            request_delay_seconds: 0.05,
            ..CrawlerConfig::default()
        };
        let coordinator = Coordinator::new(config, fetcher.clone()).unwrap();

        coordinator.run(SEED, 1, "", &MemorySink::new()).await.unwrap();

        let starts = fetcher.start_times();
        assert_eq!(starts.len(), 3);
        assert!(starts[2].duration_since(starts[0]) >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_priority_traversal_order() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/a", "/b", "/c"]).as_str()),
            ("/a", links(&[]).as_str()),
            ("/b", links(&[]).as_str()),
            ("/c", links(&[]).as_str()),
        ]));
        let config = CrawlerConfig {
            traversal: TraversalOrder::Priority,
            ..fast_config()
        };
        let coordinator = Coordinator::new(config, fetcher.clone())
            .unwrap()
            .with_scorer(scorer(&[("/a", 7), ("/b", 9), ("/c", 7)]));

        coordinator.run(SEED, 1, "", &MemorySink::new()).await.unwrap();

        assert_eq!(fetcher.fetched_paths(), vec!["/", "/b", "/a", "/c"]);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_recorded() {
        let fetcher = Arc::new(
            StubFetcher::new(&[
                ("/", links(&["/gone", "/ok"]).as_str()),
                ("/ok", links(&[]).as_str()),
            ])
            .with_status("/gone", 410),
        );
        let coordinator = Coordinator::new(fast_config(), fetcher.clone()).unwrap();
        let sink = MemorySink::new();

        let summary = coordinator.run(SEED, 1, "", &sink).await.unwrap();

        let gone = sink
            .records()
            .into_iter()
            .find(|r| r.url.ends_with("/gone"))
            .unwrap();
        assert_eq!(gone.status, PageStatus::Failed);
        assert_eq!(gone.failure_reason, Some(FailureReason::Http { status: 410 }));
        assert_eq!(summary.pages_failed, 1);
        assert_eq!(summary.pages_succeeded, 2);
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let fetcher = Arc::new(StubFetcher::new(&[("/", links(&[]).as_str())]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone()).unwrap();
        coordinator.cancellation_token().cancel();

        let summary = coordinator.run(SEED, 2, "", &MemorySink::new()).await.unwrap();

        assert_eq!(summary.state, CrawlState::Cancelled);
        assert!(fetcher.fetched_paths().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_run_stops_dispatch() {
        let token = CancellationToken::new();
        let mut stub = StubFetcher::new(&[
            ("/", links(&["/a", "/b"]).as_str()),
            ("/a", links(&[]).as_str()),
            ("/b", links(&[]).as_str()),
        ]);
        stub.cancel_after_first = Some(token.clone());
        let fetcher = Arc::new(stub);

        let coordinator = Coordinator::new(fast_config(), fetcher.clone())
            .unwrap()
            .with_cancellation(token);
        let sink = MemorySink::new();

        let summary = coordinator.run(SEED, 2, "", &sink).await.unwrap();

        assert_eq!(summary.state, CrawlState::Cancelled);
        assert_eq!(fetcher.fetched_paths(), vec!["/"]);
        // The in-flight page still produces its record
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_multiple_workers_fetch_each_once() {
        let children: Vec<String> = (0..12).map(|i| format!("/p{}", i)).collect();
        let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
        let seed_html = links(&child_refs);
        let leaf = links(&["/"]);

        let mut pages = vec![("/", seed_html.as_str())];
        pages.extend(child_refs.iter().map(|p| (*p, leaf.as_str())));

        let mut stub = StubFetcher::new(&pages);
        stub.latency = Duration::from_millis(10);
        let fetcher = Arc::new(stub);

        let config = CrawlerConfig {
            max_workers: 4,
            ..fast_config()
        };
        let coordinator = Coordinator::new(config, fetcher.clone()).unwrap();
        let sink = MemorySink::new();

        let summary = coordinator.run(SEED, 1, "", &sink).await.unwrap();

        let mut fetched = fetcher.fetched_paths();
        fetched.sort();
        fetched.dedup();
        assert_eq!(fetched.len(), 13);
        assert_eq!(fetcher.fetched_paths().len(), 13);
        assert_eq!(summary.state, CrawlState::Completed);
        assert_eq!(summary.total_pages(), 13);
    }

    #[tokio::test]
    async fn test_robots_disallow_produces_failed_record() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/robots.txt", "User-agent: *\nDisallow: /private"),
            ("/", links(&["/private", "/public"]).as_str()),
            ("/public", links(&[]).as_str()),
            ("/private", links(&[]).as_str()),
        ]));
        let config = CrawlerConfig {
            respect_robots_txt: true,
            ..fast_config()
        };
        let coordinator = Coordinator::new(config, fetcher.clone()).unwrap();
        let sink = MemorySink::new();

        coordinator.run(SEED, 1, "", &sink).await.unwrap();

        assert_eq!(fetcher.fetched_paths(), vec!["/", "/public"]);
        let private = sink
            .records()
            .into_iter()
            .find(|r| r.url.ends_with("/private"))
            .unwrap();
        assert_eq!(private.failure_reason, Some(FailureReason::Robots));
    }

    #[tokio::test]
    async fn test_target_taken_before_cancel_skips_robots_lookup() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/robots.txt", "User-agent: *\nAllow: /"),
            ("/", links(&[]).as_str()),
        ]));
        let config = CrawlerConfig {
            respect_robots_txt: true,
            ..fast_config()
        };
        let coordinator = Coordinator::new(config, fetcher.clone()).unwrap();
        let sink = MemorySink::new();

        let frontier = Frontier::new(1, TraversalOrder::Fifo);
        frontier.offer(SEED, 0);
        let run = CrawlRun {
            coordinator: &coordinator,
            frontier,
            robots: Some(RobotsCache::new(fetcher.clone(), "TestBot")),
            context: "",
            sink: &sink,
            max_depth: 1,
            stats: Mutex::new(CrawlStats::new()),
            stopped_by_cancel: AtomicBool::new(false),
        };

        let target = run.frontier.take().unwrap();
        coordinator.cancellation_token().cancel();

        assert!(run.visit(&target).await.is_none());
        assert!(fetcher.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyzer_annotations() {
        let fetcher = Arc::new(StubFetcher::new(&[("/", links(&[]).as_str())]));
        let coordinator = Coordinator::new(fast_config(), fetcher)
            .unwrap()
            .with_analyzer(Arc::new(StaticAnalyzer));
        let sink = MemorySink::new();

        coordinator.run(SEED, 0, "", &sink).await.unwrap();

        let annotations = sink.records()[0].score_annotations.clone().unwrap();
        assert_eq!(annotations.categories, vec!["docs"]);
        assert_eq!(annotations.summary.as_deref(), Some("A page"));
    }

    #[tokio::test]
    async fn test_sink_failures_are_counted_not_fatal() {
        let fetcher = Arc::new(StubFetcher::new(&[
            ("/", links(&["/a"]).as_str()),
            ("/a", links(&[]).as_str()),
        ]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone()).unwrap();

        let summary = coordinator.run(SEED, 1, "", &RejectingSink).await.unwrap();

        assert_eq!(summary.state, CrawlState::Completed);
        assert_eq!(summary.sink_failures, 2);
        assert_eq!(fetcher.fetched_paths(), vec!["/", "/a"]);
    }

    #[tokio::test]
    async fn test_invalid_seed_is_fatal() {
        let fetcher = Arc::new(StubFetcher::new(&[]));
        let coordinator = Coordinator::new(fast_config(), fetcher.clone()).unwrap();

        let result = coordinator
            .run("ftp://site.test/", 1, "", &MemorySink::new())
            .await;

        assert!(matches!(result, Err(CrawlError::Config(ConfigError::InvalidUrl(_)))));
        assert_eq!(coordinator.state(), CrawlState::Idle);
        assert!(fetcher.fetched_paths().is_empty());
    }

    #[tokio::test]
    async fn test_coordinator_is_single_use() {
        let fetcher = Arc::new(StubFetcher::new(&[("/", links(&[]).as_str())]));
        let coordinator = Coordinator::new(fast_config(), fetcher).unwrap();
        let sink = MemorySink::new();

        coordinator.run(SEED, 0, "", &sink).await.unwrap();
        let second = coordinator.run(SEED, 0, "", &sink).await;

        assert!(matches!(
            second,
            Err(CrawlError::InvalidTransition {
                from: CrawlState::Completed,
                to: CrawlState::Running
            })
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CrawlerConfig {
            max_workers: 0,
            ..CrawlerConfig::default()
        };
        let result = Coordinator::new(config, Arc::new(StubFetcher::new(&[])));
        assert!(matches!(result, Err(CrawlError::Config(_))));
    }
}
