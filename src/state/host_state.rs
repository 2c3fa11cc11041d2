use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Tracks the request history of one host during a crawl
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current crawl
    pub request_count: u32,

    /// Timestamp of the last request to this host
    pub last_request_time: Option<Instant>,
}

impl HostState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a request was made to this host
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, min_interval: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_interval {
            Some(min_interval - elapsed)
        } else {
            None
        }
    }
}

/// Spaces out requests to the same host
///
/// Independent of the worker count: two workers hitting one host still wait
/// for each other, while different hosts never block each other.
#[derive(Debug)]
pub struct HostThrottle {
    min_interval: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

impl HostThrottle {
    /// Creates a throttle allowing `requests` per minute per host
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self::with_interval(Duration::from_secs(60) / requests)
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until `host` may receive another request, then books the slot
    pub async fn acquire(&self, host: &str) {
        loop {
            let wait = {
                let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
                let state = hosts.entry(host.to_string()).or_default();
                let now = Instant::now();

                match state.time_until_next_request(self.min_interval, now) {
                    None => {
                        state.record_request(now);
                        return;
                    }
                    Some(wait) => wait,
                }
            };

            tracing::trace!("Throttling {} for {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of requests booked for `host` so far
    pub fn request_count(&self, host: &str) -> u32 {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .map(|state| state.request_count)
            .unwrap_or(0)
    }
}
