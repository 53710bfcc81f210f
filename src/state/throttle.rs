use std::time::{Duration, Instant};

/// Per-worker request pacing
///
/// Each fetch worker owns one `Throttle` and waits on it before every
/// request, so the configured delay bounds the request rate of a single
/// worker rather than of the whole pool.
#[derive(Debug, Clone)]
pub struct Throttle {
    /// Minimum time between two requests from this worker
    min_delay: Duration,

    /// Timestamp of the last request issued by this worker
    last_request_time: Option<Instant>,

    /// Number of requests issued by this worker
    request_count: u32,
}

impl Throttle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request_time: None,
            request_count: 0,
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// `extra_delay` raises the minimum delay for this request, used when a
    /// host asks for a longer `Crawl-delay`.
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(
        &self,
        now: Instant,
        extra_delay: Option<Duration>,
    ) -> Option<Duration> {
        let last = self.last_request_time?;
        let min_delay = match extra_delay {
            Some(extra) => self.min_delay.max(extra),
            None => self.min_delay,
        };

        let elapsed = now.duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }

    /// Records that a request was made
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Sleeps until the next request is allowed, then records it
    pub async fn wait_turn(&mut self, extra_delay: Option<Duration>) {
        if let Some(wait) = self.time_until_next_request(Instant::now(), extra_delay) {
            tracing::trace!("Throttling worker for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        self.record_request(Instant::now());
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }
}
