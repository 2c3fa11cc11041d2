//! Content-scoring oracle
//!
//! The oracle is an external relevance service. [`Scorer`] rates candidate
//! links against a crawl context; [`Analyzer`] categorizes and summarizes a
//! page body. Both are fallible and optional: the crawler treats every
//! [`OracleError`] as "nothing qualifies" and keeps going.

mod http;
mod response;

pub use http::HttpOracle;
pub use response::{parse_analysis, parse_scores};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest score the oracle can assign
pub const MAX_PRIORITY: u8 = 10;

/// Oracle rating for one link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkScore {
    pub url: String,

    /// Relevance from 0 to 10
    pub priority_score: u8,

    /// Expected kind of content ("article", "product_page", ...)
    pub purpose_tag: Option<String>,
}

impl LinkScore {
    /// Creates a score, clamping it into 0..=10
    pub fn new(url: impl Into<String>, priority_score: i64, purpose_tag: Option<String>) -> Self {
        Self {
            url: url.into(),
            priority_score: priority_score.clamp(0, MAX_PRIORITY as i64) as u8,
            purpose_tag,
        }
    }
}

/// Oracle analysis of a page body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    #[serde(default)]
    pub categories: Vec<String>,

    #[serde(default)]
    pub summary: Option<String>,
}

/// Errors returned by oracle calls
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Oracle returned HTTP {0}")]
    Status(u16),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),

    #[error("Oracle call timed out")]
    Timeout,

    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
}

/// Rates candidate links for relevance
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Scores `links` against `context`
    ///
    /// The result may omit links or contain URLs that were not asked about;
    /// callers match results back to their batch.
    async fn score(&self, links: &[String], context: &str) -> Result<Vec<LinkScore>, OracleError>;
}

/// Categorizes and summarizes page content
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, body_text: &str, context: &str)
        -> Result<ContentAnalysis, OracleError>;
}
