//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Checking is opt-in (`respect-robots-txt`); a missing or unreachable
//! robots.txt allows everything.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::RobotsRules;

use url::Url;

/// Returns the robots.txt location for the host serving `url`
///
/// # Examples
///
/// ```
/// use priority_crawl::robots::robots_url;
/// use url::Url;
///
/// let url = Url::parse("http://127.0.0.1:8080/docs/page?x=1").unwrap();
/// assert_eq!(robots_url(&url).unwrap().as_str(), "http://127.0.0.1:8080/robots.txt");
/// ```
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;
    url.join("/robots.txt").ok()
}
