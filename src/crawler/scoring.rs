//! Selection of outbound links to expand
//!
//! Wraps the [`Scorer`] call with the crawler's rules: a bounded batch, a
//! time limit and the priority threshold. The oracle can only narrow the
//! crawl. When it fails, times out or returns garbage, no link qualifies.

use crate::config::CrawlerConfig;
use crate::oracle::{OracleError, Scorer};
use crate::url::normalize_url;
use std::collections::{BTreeMap, HashMap};

/// Links chosen for expansion from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkSelection {
    /// Qualifying links in page order, with their score when one was given
    pub links: Vec<(String, Option<u8>)>,

    /// Every score the oracle returned for the batch, by normalized URL
    pub priority_map: BTreeMap<String, u8>,

    /// Purpose tags the oracle returned for the batch, by normalized URL
    pub purpose_tags: BTreeMap<String, String>,
}

/// Decides which of a page's links should be offered to the frontier
///
/// Without a scorer every link up to the batch bound qualifies unscored.
/// With a scorer a link qualifies only if the oracle rated it at or above
/// the priority threshold. Links beyond the batch bound are never considered.
pub async fn select_links(
    scorer: Option<&dyn Scorer>,
    links: &[String],
    context: &str,
    config: &CrawlerConfig,
) -> LinkSelection {
    let batch: Vec<String> = links
        .iter()
        .take(config.max_links_per_score_batch)
        .cloned()
        .collect();

    if links.len() > batch.len() {
        tracing::debug!(
            "Considering {} of {} links (batch limit)",
            batch.len(),
            links.len()
        );
    }

    let Some(scorer) = scorer else {
        return LinkSelection {
            links: batch.into_iter().map(|link| (link, None)).collect(),
            ..LinkSelection::default()
        };
    };

    if batch.is_empty() {
        return LinkSelection::default();
    }

    let timeout = match config.scorer_timeout() {
        Ok(timeout) => timeout,
        Err(e) => {
            tracing::warn!("Link scoring skipped, expanding no links: {}", e);
            return LinkSelection::default();
        }
    };

    let scores = match tokio::time::timeout(timeout, scorer.score(&batch, context)).await {
        Ok(Ok(scores)) => scores,
        Ok(Err(e)) => {
            tracing::warn!("Link scoring failed, expanding no links: {}", e);
            return LinkSelection::default();
        }
        Err(_) => {
            tracing::warn!(
                "Link scoring failed, expanding no links: {}",
                OracleError::Timeout
            );
            return LinkSelection::default();
        }
    };

    // Match results back to the batch by normalized URL
    let batch_keys: HashMap<String, usize> = batch
        .iter()
        .enumerate()
        .filter_map(|(idx, link)| normalize_url(link).ok().map(|u| (u.to_string(), idx)))
        .collect();

    let mut priority_map = BTreeMap::new();
    let mut purpose_tags = BTreeMap::new();
    for score in scores {
        let Ok(key) = normalize_url(&score.url) else {
            tracing::debug!("Ignoring score for unparseable URL {}", score.url);
            continue;
        };
        let key = key.to_string();
        if !batch_keys.contains_key(&key) {
            tracing::debug!("Ignoring score for URL outside the batch: {}", score.url);
            continue;
        }
        if priority_map.contains_key(&key) {
            continue;
        }
        if let Some(tag) = score.purpose_tag {
            purpose_tags.insert(key.clone(), tag);
        }
        priority_map.insert(key, score.priority_score);
    }

    let mut selected = Vec::new();
    for link in &batch {
        let Ok(key) = normalize_url(link) else {
            continue;
        };
        match priority_map.get(key.as_str()) {
            Some(&score) if score >= config.priority_threshold => {
                selected.push((link.clone(), Some(score)));
            }
            Some(&score) => {
                tracing::debug!(
                    "Skipping {} (score {} < {})",
                    link,
                    score,
                    config.priority_threshold
                );
            }
            None => tracing::debug!("Skipping {} (not scored)", link),
        }
    }

    LinkSelection {
        links: selected,
        priority_map,
        purpose_tags,
    }
}
