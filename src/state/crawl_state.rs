//! Crawl run lifecycle
//!
//! ```text
//! Idle ──> Running ──> Completed
//!             │
//!             ├──────> Cancelled
//!             │            ^
//!             └──> Draining┘
//! ```
//!
//! `Draining` is entered when cancellation is observed while other workers
//! still have a page in flight; it ends in `Cancelled` once they finish.

use serde::Serialize;
use std::fmt;

/// Lifecycle state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlState {
    Idle,
    Running,
    Draining,
    Cancelled,
    Completed,
}

impl CrawlState {
    /// Returns true for states a run can never leave
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Running, Self::Cancelled)
                | (Self::Running, Self::Completed)
                | (Self::Draining, Self::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
