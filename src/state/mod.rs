//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageStatus`: outcome of a single fetch attempt (success or failure)
//! - `CrawlState`: lifecycle of one crawl run (idle, running, draining, ...)
//! - `HostState` / `HostThrottle`: per-host request spacing used by the fetcher

mod crawl_state;
mod host_state;
mod page_state;

// Re-export main types
pub use crawl_state::CrawlState;
pub use host_state::{HostState, HostThrottle};
pub use page_state::PageStatus;
