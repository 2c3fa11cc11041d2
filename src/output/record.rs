//! Page records produced by the crawler
//!
//! One record is created per fetch attempt, successful or not, and handed to
//! the configured sink. Records are never mutated afterwards.

use crate::state::PageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a page produced a `Failed` record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The request exceeded the fetch timeout
    Timeout,

    /// Connection refused, DNS failure, TLS error
    Connection { message: String },

    /// The server answered with a 4xx/5xx status
    Http { status: u16 },

    /// robots.txt disallows the URL for our user agent
    Robots,

    /// Anything else (body read error, invalid response)
    Other { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connection { message } => write!(f, "connection error: {}", message),
            Self::Http { status } => write!(f, "HTTP {}", status),
            Self::Robots => write!(f, "disallowed by robots.txt"),
            Self::Other { message } => write!(f, "{}", message),
        }
    }
}

/// Oracle output attached to a successfully fetched page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreAnnotations {
    /// Categories assigned by content analysis
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,

    /// Short summary from content analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Oracle score for every outbound link it rated (qualifying or not)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub priority_map: BTreeMap<String, u8>,

    /// Expected kind of content the oracle gave each rated link, if any
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub purpose_tags: BTreeMap<String, String>,
}

impl ScoreAnnotations {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.summary.is_none()
            && self.priority_map.is_empty()
            && self.purpose_tags.is_empty()
    }
}

/// Result of one fetch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// URL that was dispatched, as linked (fragment removed)
    pub url: String,

    /// Distance from the seed (seed = 0)
    pub depth: u32,

    pub title: Option<String>,

    /// Sanitized, possibly truncated page text
    pub body_text: String,

    /// Absolute outbound links found on the page, in document order
    pub outbound_links: Vec<String>,

    pub fetched_at: DateTime<Utc>,

    pub status: PageStatus,

    /// HTTP status code, when the server answered at all
    pub http_status: Option<u16>,

    pub failure_reason: Option<FailureReason>,

    pub score_annotations: Option<ScoreAnnotations>,
}

impl PageRecord {
    /// Creates a record for a page that was fetched and extracted
    pub fn success(url: impl Into<String>, depth: u32, http_status: u16) -> Self {
        Self {
            url: url.into(),
            depth,
            title: None,
            body_text: String::new(),
            outbound_links: Vec::new(),
            fetched_at: Utc::now(),
            status: PageStatus::Success,
            http_status: Some(http_status),
            failure_reason: None,
            score_annotations: None,
        }
    }

    /// Creates a record for a failed fetch attempt
    pub fn failed(url: impl Into<String>, depth: u32, reason: FailureReason) -> Self {
        let http_status = match reason {
            FailureReason::Http { status } => Some(status),
            _ => None,
        };

        Self {
            url: url.into(),
            depth,
            title: None,
            body_text: String::new(),
            outbound_links: Vec::new(),
            fetched_at: Utc::now(),
            status: PageStatus::Failed,
            http_status,
            failure_reason: Some(reason),
            score_annotations: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
