//! URL handling module for Priority-Crawl
//!
//! This module provides URL normalization (the frontier's deduplication key),
//! resolution of the URL actually fetched, and host extraction for per-host bookkeeping.

mod normalize;

use url::Url;

// Re-export main functions
pub use normalize::{dedup_key, dispatch_url, normalize_url, resolve_url};

/// Returns the per-host bookkeeping key of a URL
///
/// The key is the lowercase host plus the port when one is explicit, so two
/// servers on the same address but different ports are tracked separately.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use priority_crawl::url::host_key;
///
/// let url = Url::parse("https://Example.com/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
