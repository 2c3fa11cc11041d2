//! Per-host robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per crawl run, through the
//! crawler's own [`Fetcher`] so it shares the user agent and host throttle.
//! Concurrent lookups for the same host wait on a single fetch.

use crate::crawler::{FetchError, Fetcher};
use crate::robots::{robots_url, RobotsRules};
use crate::url::host_key;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use url::Url;

pub struct RobotsCache {
    fetcher: Arc<dyn Fetcher>,
    agent: String,
    hosts: Mutex<HashMap<String, Arc<OnceCell<RobotsRules>>>>,
}

impl RobotsCache {
    /// Creates an empty cache checking rules for the `agent` product token
    pub fn new(fetcher: Arc<dyn Fetcher>, agent: impl Into<String>) -> Self {
        Self {
            fetcher,
            agent: agent.into(),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Checks whether `url` may be fetched, loading its host's rules first
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = host_key(url) else {
            return true;
        };

        let cell = {
            let mut hosts = self.hosts.lock().await;
            Arc::clone(hosts.entry(host).or_default())
        };

        let rules = cell.get_or_init(|| self.load(url)).await;
        rules.allows(url, &self.agent)
    }

    /// Number of hosts whose rules are cached
    pub async fn len(&self) -> usize {
        self.hosts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn load(&self, url: &Url) -> RobotsRules {
        let Some(robots) = robots_url(url) else {
            return RobotsRules::allow_all();
        };

        match self.fetcher.fetch(&robots).await {
            Ok(page) => {
                tracing::debug!("Loaded {}", robots);
                RobotsRules::from_body(&String::from_utf8_lossy(&page.body))
            }
            Err(FetchError::Http { status }) => {
                tracing::debug!("No robots.txt at {} (HTTP {}), allowing all", robots, status);
                RobotsRules::allow_all()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}, allowing all", robots, e);
                RobotsRules::allow_all()
            }
        }
    }
}
