//! Record sink trait and error types
//!
//! A sink receives every page record the crawler produces. Writes are
//! best-effort: the coordinator logs and counts a failed write, then moves on.

use crate::output::record::PageRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while writing records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Record receiver closed")]
    Closed,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for completed page records
///
/// Implementations must be thread-safe; several crawl workers may write
/// concurrently.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persists or forwards one record
    async fn write(&self, record: &PageRecord) -> SinkResult<()>;

    /// Flushes buffered records, called once when the crawl ends
    async fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}

/// Lets a caller keep a handle on a sink it also hands to the crawler
#[async_trait]
impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    async fn write(&self, record: &PageRecord) -> SinkResult<()> {
        (**self).write(record).await
    }

    async fn flush(&self) -> SinkResult<()> {
        (**self).flush().await
    }
}
