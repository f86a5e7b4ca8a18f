use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{now_millis, LimiterError, RateLimitResponse, RateLimiter, SlidingWindow};
use crate::secret::Secret;

/// Key namespace used by default, shared with other Upstash rate limit clients.
pub const DEFAULT_PREFIX: &str = "@upstash/ratelimit";

/// Atomic sliding-window update.
///
/// KEYS: current window, previous window.
/// ARGV: limit, now (ms), window (ms), cost.
/// Returns `{admitted, remaining}`.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local current_key = KEYS[1]
local previous_key = KEYS[2]
local limit = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
local window = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])

local previous = tonumber(redis.call("GET", previous_key) or "0")
local current = redis.call("INCRBY", current_key, cost)
if current == cost then
  redis.call("PEXPIRE", current_key, window * 2 + 1000)
end

local weight = 1 - ((now % window) / window)
local used = math.floor(previous * weight) + current
if used > limit then
  return {0, 0}
end
return {1, limit - used}
"#;

const MAX_ERROR_BODY: usize = 200;

/// Connection settings for the Upstash REST endpoint.
#[derive(Debug)]
pub struct UpstashConfig {
    /// REST endpoint, e.g. `https://eu1-example.upstash.io`
    pub url: String,
    /// Bearer token
    pub token: Secret<String>,
    /// Key namespace
    pub prefix: String,
    /// Per-call timeout
    pub timeout: Duration,
}

impl UpstashConfig {
    /// Creates settings with the default prefix and a 5 second timeout.
    pub fn new(url: impl Into<String>, token: Secret<String>) -> Self {
        Self {
            url: url.into(),
            token,
            prefix: DEFAULT_PREFIX.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Sliding-window store backed by Redis over the Upstash REST API.
///
/// Each check is a single `EVAL`, so Redis serializes concurrent checks for
/// the same key.
#[derive(Debug)]
pub struct UpstashLimiter {
    http: Client,
    config: UpstashConfig,
    window: SlidingWindow,
}

impl UpstashLimiter {
    /// Creates a client for `config` enforcing `window`.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: UpstashConfig, window: SlidingWindow) -> Result<Self, LimiterError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            window,
        })
    }

    fn key(&self, key: &str, index: u64) -> String {
        format!("{}:{}:{}", self.config.prefix, key, index)
    }

    /// Key of the window before `index`. Window 0 has no predecessor, so it
    /// gets a key that is never written.
    fn previous_key(&self, key: &str, index: u64) -> String {
        match index.checked_sub(1) {
            Some(previous) => self.key(key, previous),
            None => format!("{}:{}:none", self.config.prefix, key),
        }
    }

    fn decode(result: Value) -> Result<(bool, u64), LimiterError> {
        let pair = result
            .as_array()
            .filter(|items| items.len() == 2)
            .ok_or_else(|| LimiterError::Decode(result.to_string()))?;

        let admitted = pair[0].as_i64();
        let remaining = pair[1].as_u64();
        match (admitted, remaining) {
            (Some(admitted), Some(remaining)) => Ok((admitted == 1, remaining)),
            _ => Err(LimiterError::Decode(result.to_string())),
        }
    }

    /// Runs the window script as of `now_millis`.
    pub async fn check_at(
        &self,
        key: &str,
        cost: u64,
        now_millis: u64,
    ) -> Result<RateLimitResponse, LimiterError> {
        let index = self.window.window_index(now_millis);
        let command = json!([
            "EVAL",
            SLIDING_WINDOW_SCRIPT,
            "2",
            self.key(key, index),
            self.previous_key(key, index),
            self.window.max_requests.to_string(),
            now_millis.to_string(),
            self.window.window_millis().to_string(),
            cost.to_string(),
        ]);

        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(self.config.token.expose_secret())
            .json(&command)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let reply: Option<RestReply> = serde_json::from_str(&text).ok();

        if let Some(RestReply {
            error: Some(message),
            ..
        }) = reply
        {
            return Err(LimiterError::Store(message));
        }
        if !status.is_success() {
            return Err(LimiterError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let result = reply
            .and_then(|reply| reply.result)
            .ok_or_else(|| LimiterError::Decode(text.chars().take(MAX_ERROR_BODY).collect()))?;
        let (success, remaining) = Self::decode(result)?;

        Ok(RateLimitResponse {
            success,
            limit: self.window.max_requests,
            remaining,
            reset: self.window.reset_at(now_millis),
        })
    }
}

#[async_trait]
impl RateLimiter for UpstashLimiter {
    async fn limit(&self, key: &str, cost: u64) -> Result<RateLimitResponse, LimiterError> {
        tracing::trace!(key, cost, "evaluating sliding window in store");
        self.check_at(key, cost, now_millis()).await
    }
}
