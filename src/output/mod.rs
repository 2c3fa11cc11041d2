//! Output module for crawl records, sinks and reports
//!
//! This module handles:
//! - The page record produced for every fetch attempt
//! - Record sinks (channel, memory, JSON Lines, SQLite)
//! - Run statistics and the markdown report

mod jsonl;
mod markdown;
mod record;
mod sinks;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use markdown::{format_report, write_report};
pub use record::{FailureReason, PageRecord, ScoreAnnotations};
pub use sinks::{ChannelSink, FanoutSink, MemorySink};
pub use sqlite_output::SqliteSink;
pub use stats::{CrawlStats, CrawlSummary};
pub use traits::{RecordSink, SinkError, SinkResult};
