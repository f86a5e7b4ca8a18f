use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{now_millis, LimiterError, RateLimitResponse, RateLimiter, SlidingWindow};

/// Counts for one key: the current fixed window and the one before it.
#[derive(Debug, Default, Clone, Copy)]
struct WindowCounts {
    index: u64,
    current: u64,
    previous: u64,
}

impl WindowCounts {
    /// Moves the counts forward so `index` is the current window.
    fn roll_to(&mut self, index: u64) {
        if index == self.index {
            return;
        }
        self.previous = if index == self.index + 1 {
            self.current
        } else {
            0
        };
        self.current = 0;
        self.index = index;
    }
}

/// Per-key counts plus the window index of the last sweep.
#[derive(Debug, Default)]
struct Counters {
    keys: HashMap<String, WindowCounts>,
    swept: u64,
}

impl Counters {
    /// Drops keys that no longer affect any decision at `index`.
    ///
    /// Runs at most once per window, on the first check after a rollover.
    fn sweep(&mut self, index: u64) {
        if index <= self.swept {
            return;
        }
        self.keys.retain(|_, counts| counts.index.saturating_add(1) >= index);
        self.swept = index;
    }
}

/// Process-local sliding-window store.
///
/// Approximates a sliding window by weighting the previous fixed window with
/// the share of it that still overlaps the rolling interval. One mutex guards
/// all keys, which serializes consumptions for the same key. Keys idle for
/// more than a full window are evicted on the next rollover, so memory stays
/// bounded by the clients seen in the last two windows.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use coprocessor_gate::limiter::{InMemoryLimiter, SlidingWindow};
///
/// let limiter = InMemoryLimiter::new(SlidingWindow::new(2, Duration::from_secs(10)));
///
/// assert!(limiter.check_at("web", 1, 1_000).success);
/// assert!(limiter.check_at("web", 1, 2_000).success);
/// assert!(!limiter.check_at("web", 1, 3_000).success);
/// ```
#[derive(Debug)]
pub struct InMemoryLimiter {
    window: SlidingWindow,
    counts: Mutex<Counters>,
}

impl InMemoryLimiter {
    /// Creates an empty store for `window`.
    pub fn new(window: SlidingWindow) -> Self {
        Self {
            window,
            counts: Mutex::new(Counters::default()),
        }
    }

    /// Returns the window configuration.
    pub fn window(&self) -> SlidingWindow {
        self.window
    }

    /// Consumes `cost` units for `key` as of `now_millis` (Unix time).
    pub fn check_at(&self, key: &str, cost: u64, now_millis: u64) -> RateLimitResponse {
        let window_millis = self.window.window_millis();
        let index = self.window.window_index(now_millis);

        let mut counts = self.counts.lock();
        counts.sweep(index);
        let entry = counts.keys.entry(key.to_string()).or_insert(WindowCounts {
            index,
            ..WindowCounts::default()
        });
        entry.roll_to(index);
        entry.current = entry.current.saturating_add(cost);

        let elapsed = (now_millis % window_millis) as f64 / window_millis as f64;
        let carried = ((1.0 - elapsed) * entry.previous as f64).floor() as u64;
        let used = carried.saturating_add(entry.current);
        let limit = self.window.max_requests;

        RateLimitResponse {
            success: used <= limit,
            limit,
            remaining: limit.saturating_sub(used),
            reset: self.window.reset_at(now_millis),
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryLimiter {
    async fn limit(&self, key: &str, cost: u64) -> Result<RateLimitResponse, LimiterError> {
        Ok(self.check_at(key, cost, now_millis()))
    }
}
