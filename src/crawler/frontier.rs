//! Crawl frontier: pending targets plus the visited set
//!
//! The visited set is keyed by each URL's normalized form, while the queued
//! target keeps the URL as written (minus its fragment) so the server sees the
//! request the page linked to. Admission is a single check-and-insert under
//! one lock, so two concurrent `offer` calls can never both accept the same
//! URL. A URL counts as visited from the moment it is accepted, not when it is
//! fetched.

use crate::config::TraversalOrder;
use crate::url::{dedup_key, dispatch_url};
use crate::UrlResult;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone)]
pub struct CrawlTarget {
    /// URL to fetch, fragment removed
    pub url: Url,

    /// Distance from the seed (seed = 0)
    pub depth: u32,

    /// Oracle score, if the link was scored
    pub priority: Option<u8>,

    /// Discovery order, used to break priority ties
    pub seq: u64,
}

// Higher priority pops first from the BinaryHeap; equal priorities pop in
// discovery order.
impl Ord for CrawlTarget {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for CrawlTarget {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CrawlTarget {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for CrawlTarget {}

#[derive(Debug)]
enum Queue {
    Fifo(VecDeque<CrawlTarget>),
    Priority(BinaryHeap<CrawlTarget>),
}

impl Queue {
    fn new(order: TraversalOrder) -> Self {
        match order {
            TraversalOrder::Fifo => Self::Fifo(VecDeque::new()),
            TraversalOrder::Priority => Self::Priority(BinaryHeap::new()),
        }
    }

    fn push(&mut self, target: CrawlTarget) {
        match self {
            Self::Fifo(queue) => queue.push_back(target),
            Self::Priority(heap) => heap.push(target),
        }
    }

    fn pop(&mut self) -> Option<CrawlTarget> {
        match self {
            Self::Fifo(queue) => queue.pop_front(),
            Self::Priority(heap) => heap.pop(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Fifo(queue) => queue.len(),
            Self::Priority(heap) => heap.len(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    queue: Queue,
    visited: HashSet<String>,
    in_flight: usize,
    next_seq: u64,
}

/// Queue of pending targets and the dedup record of everything admitted
///
/// Owned by a single crawl run and shared by its workers.
#[derive(Debug)]
pub struct Frontier {
    max_depth: u32,
    base: Option<Url>,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Frontier {
    pub fn new(max_depth: u32, order: TraversalOrder) -> Self {
        Self {
            max_depth,
            base: None,
            inner: Mutex::new(Inner {
                queue: Queue::new(order),
                visited: HashSet::new(),
                in_flight: 0,
                next_seq: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Resolves relative URLs offered later against `base`
    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Offers an unscored URL at `depth`
    ///
    /// Returns true if the URL was new and within depth, and is now queued.
    pub fn offer(&self, url: &str, depth: u32) -> bool {
        self.admit(url, depth, None)
    }

    /// Offers a URL carrying an oracle score
    pub fn offer_scored(&self, url: &str, depth: u32, priority: u8) -> bool {
        self.admit(url, depth, Some(priority))
    }

    fn admit(&self, url: &str, depth: u32, priority: Option<u8>) -> bool {
        if depth > self.max_depth {
            tracing::trace!("Rejecting {} at depth {} (max {})", url, depth, self.max_depth);
            return false;
        }

        let (target_url, key) = match self.locate(url) {
            Ok(located) => located,
            Err(e) => {
                tracing::trace!("Rejecting {}: {}", url, e);
                return false;
            }
        };

        {
            let mut inner = self.lock();
            if !inner.visited.insert(key.into()) {
                return false;
            }

            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.queue.push(CrawlTarget {
                url: target_url,
                depth,
                priority,
                seq,
            });
        }

        self.notify.notify_waiters();
        true
    }

    /// Returns the URL to fetch and its dedup key
    fn locate(&self, url: &str) -> UrlResult<(Url, Url)> {
        let target_url = dispatch_url(url, self.base.as_ref())?;
        let key = dedup_key(&target_url)?;
        Ok((target_url, key))
    }

    /// Pops the next target and marks it in flight
    ///
    /// Never blocks; returns None when nothing is queued.
    pub fn take(&self) -> Option<CrawlTarget> {
        let mut inner = self.lock();
        let target = inner.queue.pop()?;
        inner.in_flight += 1;
        Some(target)
    }

    /// Releases the in-flight slot of a target returned by `take`
    pub fn complete(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// True when nothing is queued and nothing is in flight
    pub fn is_idle(&self) -> bool {
        let inner = self.lock();
        inner.queue.len() == 0 && inner.in_flight == 0
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of distinct URLs ever admitted
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    /// Returns true if the normalized form of `url` was admitted
    pub fn contains(&self, url: &str) -> bool {
        match self.locate(url) {
            Ok((_, key)) => self.lock().visited.contains(key.as_str()),
            Err(_) => false,
        }
    }

    /// Future that resolves on the next offer or completion
    ///
    /// Call `enable()` on the pinned future before re-checking the frontier,
    /// otherwise a wakeup between the check and the await is lost.
    pub fn changed(&self) -> Notified<'_> {
        self.notify.notified()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
