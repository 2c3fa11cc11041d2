use crate::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Priority-Crawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    /// Scoring/analysis oracle; crawling degrades to plain BFS without it
    #[serde(default)]
    pub oracle: Option<OracleConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Order in which the frontier hands out targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraversalOrder {
    /// Breadth-first, in discovery order
    #[default]
    Fifo,
    /// Highest oracle score first, ties broken by discovery order
    Priority,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from the seed URL (used when the caller gives none)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Pause after every dispatched fetch, per worker (seconds)
    #[serde(rename = "request-delay-seconds", default = "default_request_delay")]
    pub request_delay_seconds: f64,

    /// Minimum oracle score (0-10) a link needs to be enqueued
    #[serde(rename = "priority-threshold", default = "default_priority_threshold")]
    pub priority_threshold: u8,

    /// Maximum number of links submitted to the oracle per page
    #[serde(
        rename = "max-links-per-score-batch",
        default = "default_max_links_per_score_batch"
    )]
    pub max_links_per_score_batch: usize,

    /// Timeout for a single page fetch (seconds)
    #[serde(rename = "fetch-timeout-seconds", default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: f64,

    /// Timeout for a single oracle call (seconds)
    #[serde(rename = "scorer-timeout-seconds", default = "default_scorer_timeout")]
    pub scorer_timeout_seconds: f64,

    /// Number of concurrent fetch workers
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: usize,

    /// Body text is truncated to this many characters; `None` keeps it whole
    #[serde(rename = "max-body-chars", default = "default_max_body_chars")]
    pub max_body_chars: Option<usize>,

    #[serde(default)]
    pub traversal: TraversalOrder,

    /// Check robots.txt before fetching each page
    #[serde(rename = "respect-robots-txt", default)]
    pub respect_robots_txt: bool,

    /// Per-host request budget enforced by the HTTP fetcher
    #[serde(rename = "requests-per-minute", default)]
    pub requests_per_minute: Option<u32>,
}

impl CrawlerConfig {
    /// Politeness delay between fetches of one worker
    pub fn request_delay(&self) -> Result<Duration, ConfigError> {
        seconds("request_delay_seconds", self.request_delay_seconds)
    }

    pub fn fetch_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("fetch_timeout_seconds", self.fetch_timeout_seconds)
    }

    pub fn scorer_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("scorer_timeout_seconds", self.scorer_timeout_seconds)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            request_delay_seconds: default_request_delay(),
            priority_threshold: default_priority_threshold(),
            max_links_per_score_batch: default_max_links_per_score_batch(),
            fetch_timeout_seconds: default_fetch_timeout(),
            scorer_timeout_seconds: default_scorer_timeout(),
            max_workers: default_max_workers(),
            max_body_chars: default_max_body_chars(),
            traversal: TraversalOrder::default(),
            respect_robots_txt: false,
            requests_per_minute: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email", default)]
    pub contact_email: Option<String>,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        let contact: Vec<String> = self
            .contact_url
            .iter()
            .map(|url| format!("+{}", url))
            .chain(self.contact_email.iter().cloned())
            .collect();

        if contact.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contact.join("; ")
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
            contact_email: None,
        }
    }
}

/// Chat-completions oracle used for link scoring and page analysis
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the API; `/chat/completions` is appended
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,

    /// Name of the environment variable holding the bearer token
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// Ask the oracle to score outbound links
    #[serde(rename = "score-links", default = "default_true")]
    pub score_links: bool,

    /// Ask the oracle to summarize and categorize each fetched page
    #[serde(rename = "analyze-content", default)]
    pub analyze_content: bool,

    /// Page text sent for analysis is cut to this many characters
    #[serde(rename = "max-content-chars", default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            api_key_env: default_api_key_env(),
            model: default_oracle_model(),
            score_links: true,
            analyze_content: false,
            max_content_chars: default_max_content_chars(),
        }
    }
}

/// Output configuration; every sink is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,

    /// Path to an append-only JSON Lines file
    #[serde(rename = "jsonl-path", default)]
    pub jsonl_path: Option<String>,

    /// Path to the markdown report
    #[serde(rename = "report-path", default)]
    pub report_path: Option<String>,
}

/// Converts a seconds setting, rejecting negative, non-finite and
/// out-of-range values
fn seconds(name: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|e| {
        ConfigError::Validation(format!(
            "{} must be a non-negative number of seconds, got {}: {}",
            name, value, e
        ))
    })
}

fn default_max_depth() -> u32 {
    2
}

fn default_request_delay() -> f64 {
    1.0
}

fn default_priority_threshold() -> u8 {
    6
}

fn default_max_links_per_score_batch() -> usize {
    50
}

fn default_fetch_timeout() -> f64 {
    10.0
}

fn default_scorer_timeout() -> f64 {
    30.0
}

fn default_max_workers() -> usize {
    1
}

fn default_max_body_chars() -> Option<usize> {
    Some(1000)
}

fn default_crawler_name() -> String {
    "PriorityCrawl".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_oracle_endpoint() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_oracle_model() -> String {
    "anthropic/claude-3.5-sonnet".to_string()
}

fn default_max_content_chars() -> usize {
    4000
}

fn default_true() -> bool {
    true
}
