//! Run statistics
//!
//! The coordinator feeds a [`CrawlStats`] accumulator as pages complete and
//! turns it into a [`CrawlSummary`] when the run ends.

use crate::output::record::PageRecord;
use crate::state::{CrawlState, PageStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Summary of a finished crawl run
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    /// Terminal state of the run (`completed` or `cancelled`)
    pub state: CrawlState,

    pub pages_succeeded: u64,
    pub pages_failed: u64,

    /// Number of records per depth
    pub by_depth: BTreeMap<u32, u64>,

    /// Links accepted into the frontier, seed excluded
    pub links_enqueued: u64,

    /// Sink writes that returned an error
    pub sink_failures: u64,

    /// Distinct URLs admitted to the frontier, seed included
    pub urls_seen: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

impl CrawlSummary {
    /// Total records produced
    pub fn total_pages(&self) -> u64 {
        self.pages_succeeded + self.pages_failed
    }

    /// Calculates the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.total_pages();
        if total == 0 {
            return 0.0;
        }
        (self.pages_succeeded as f64 / total as f64) * 100.0
    }

    /// Calculates the failure rate as a percentage
    pub fn error_rate(&self) -> f64 {
        let total = self.total_pages();
        if total == 0 {
            return 0.0;
        }
        (self.pages_failed as f64 / total as f64) * 100.0
    }
}

/// Running counters for one crawl
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_succeeded: u64,
    pages_failed: u64,
    by_depth: BTreeMap<u32, u64>,
    links_enqueued: u64,
    sink_failures: u64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a produced record
    pub fn record_page(&mut self, record: &PageRecord) {
        match record.status {
            PageStatus::Success => self.pages_succeeded += 1,
            PageStatus::Failed => self.pages_failed += 1,
        }
        *self.by_depth.entry(record.depth).or_insert(0) += 1;
    }

    pub fn record_enqueued(&mut self, count: usize) {
        self.links_enqueued += count as u64;
    }

    pub fn record_sink_failure(&mut self) {
        self.sink_failures += 1;
    }

    pub fn pages_processed(&self) -> u64 {
        self.pages_succeeded + self.pages_failed
    }

    /// Builds the final summary
    pub fn finish(
        &self,
        state: CrawlState,
        urls_seen: usize,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> CrawlSummary {
        CrawlSummary {
            state,
            pages_succeeded: self.pages_succeeded,
            pages_failed: self.pages_failed,
            by_depth: self.by_depth.clone(),
            links_enqueued: self.links_enqueued,
            sink_failures: self.sink_failures,
            urls_seen,
            started_at,
            finished_at: Utc::now(),
            elapsed,
        }
    }
}
