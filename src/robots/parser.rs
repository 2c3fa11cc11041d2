//! Robots.txt rules
//!
//! Matching is delegated to the robotstxt crate (Google's matcher port).

use robotstxt::DefaultMatcher;
use url::Url;

/// Rules from one host's robots.txt
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt body; None means everything is allowed
    body: Option<String>,
}

impl RobotsRules {
    /// Creates rules from a robots.txt body
    pub fn from_body(body: &str) -> Self {
        Self {
            body: Some(body.to_string()),
        }
    }

    /// Rules that allow everything
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self { body: None }
    }

    pub fn is_allow_all(&self) -> bool {
        self.body.as_deref().map_or(true, |b| b.trim().is_empty())
    }

    /// Checks whether `agent` may fetch `url`
    ///
    /// `agent` is the product token (e.g. "PriorityCrawl"), not the full
    /// User-Agent header.
    pub fn allows(&self, url: &Url, agent: &str) -> bool {
        match self.body.as_deref() {
            None => true,
            Some(body) if body.trim().is_empty() => true,
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, agent, url.as_str())
            }
        }
    }
}
