//! Sliding-window counter stores.
//!
//! The gate only depends on the [`RateLimiter`] contract: consume `cost`
//! units for a key and report whether the window still had room. Two stores
//! implement it:
//!
//! - [`InMemoryLimiter`]: process-local counters, for tests and single-node
//!   development.
//! - [`UpstashLimiter`]: a remote Redis reached over the Upstash REST API,
//!   where the window update runs as one atomic script.
//!
//! Both count every attempt, admitted or not, against the window.

mod memory;
mod upstash;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryLimiter;
pub use upstash::{UpstashConfig, UpstashLimiter};

/// Default number of units admitted per window.
pub const DEFAULT_MAX_REQUESTS: u64 = 10;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Longest window accepted from configuration (one week).
pub const MAX_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Window configuration shared by every store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindow {
    /// Units admitted per window
    pub max_requests: u64,
    /// Length of one window
    pub window: Duration,
}

impl SlidingWindow {
    /// Creates a window admitting `max_requests` units per `window`.
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    /// Window length in milliseconds, never zero.
    pub(crate) fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis())
            .unwrap_or(u64::MAX)
            .max(1)
    }

    /// Index of the window containing `now_millis`.
    pub(crate) fn window_index(&self, now_millis: u64) -> u64 {
        now_millis / self.window_millis()
    }

    /// Unix time in milliseconds at which the window containing `now_millis` ends.
    pub(crate) fn reset_at(&self, now_millis: u64) -> u64 {
        self.window_index(now_millis)
            .saturating_add(1)
            .saturating_mul(self.window_millis())
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

/// Answer of a store to one consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResponse {
    /// Whether the attempt fit into the window
    pub success: bool,
    /// Configured units per window
    pub limit: u64,
    /// Units left in the current window
    pub remaining: u64,
    /// Unix time in milliseconds at which the current window ends
    pub reset: u64,
}

/// Failure to obtain a decision from a store.
#[derive(Debug, Error)]
pub enum LimiterError {
    /// The store could not be reached
    #[error("rate limit store unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    /// The store answered with a non-success HTTP status
    #[error("rate limit store returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },
    /// The store rejected the command
    #[error("rate limit store rejected the command: {0}")]
    Store(String),
    /// The store reply did not have the expected shape
    #[error("unexpected rate limit store reply: {0}")]
    Decode(String),
}

/// A sliding-window counter keyed by client.
///
/// Implementations must serialize concurrent consumptions against the same
/// key so the limit cannot be exceeded under races.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Consumes `cost` units for `key` and reports the window state.
    async fn limit(&self, key: &str, cost: u64) -> Result<RateLimitResponse, LimiterError>;
}

/// Current Unix time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
