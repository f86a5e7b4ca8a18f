//! Environment-sourced configuration.
//!
//! Every setting has a default except the Upstash credentials, which are
//! required only when the Upstash backend is selected. `.env` files are
//! loaded by the binary before [`GateConfig::from_env`] runs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::identity::DEFAULT_CLIENT_NAME_HEADER;
use crate::limiter::{
    InMemoryLimiter, LimiterError, RateLimiter, SlidingWindow, UpstashConfig, UpstashLimiter,
    DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW, MAX_WINDOW,
};
use crate::secret::Secret;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 3007;

/// Default whole-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do when the counter store cannot produce a decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreFailurePolicy {
    /// Propagate the failure; the HTTP boundary answers 502
    #[default]
    Error,
    /// Fail open: let the request through
    Allow,
    /// Fail closed: short-circuit the envelope with 503
    Reject,
}

impl FromStr for StoreFailurePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(StoreFailurePolicy::Error),
            "allow" | "open" => Ok(StoreFailurePolicy::Allow),
            "reject" | "closed" => Ok(StoreFailurePolicy::Reject),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StoreFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFailurePolicy::Error => write!(f, "error"),
            StoreFailurePolicy::Allow => write!(f, "allow"),
            StoreFailurePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Which counter store backs the admission gate.
#[derive(Debug)]
pub enum LimiterBackend {
    /// Process-local counters
    Memory,
    /// Redis over the Upstash REST API
    Upstash(UpstashConfig),
}

impl LimiterBackend {
    /// Builds the store enforcing `window`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client for the remote store cannot be built.
    pub fn into_limiter(self, window: SlidingWindow) -> Result<Arc<dyn RateLimiter>, LimiterError> {
        let limiter: Arc<dyn RateLimiter> = match self {
            LimiterBackend::Memory => Arc::new(InMemoryLimiter::new(window)),
            LimiterBackend::Upstash(config) => Arc::new(UpstashLimiter::new(config, window)?),
        };
        Ok(limiter)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LimiterBackend::Memory => "memory",
            LimiterBackend::Upstash(_) => "upstash",
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug)]
pub struct GateConfig {
    /// Listening port
    pub port: u16,
    /// Header consulted when the context carries no client name
    pub client_name_header: String,
    /// Units per window and window length
    pub window: SlidingWindow,
    /// Counter store
    pub backend: LimiterBackend,
    /// Behavior on counter store failure
    pub failure_policy: StoreFailurePolicy,
    /// Whole-request timeout applied by the HTTP boundary
    pub request_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            client_name_header: DEFAULT_CLIENT_NAME_HEADER.to_string(),
            window: SlidingWindow::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW),
            backend: LimiterBackend::Memory,
            failure_policy: StoreFailurePolicy::Error,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl GateConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                value: raw,
                reason: "expected a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let max_requests = positive(get("RATE_LIMIT_MAX_REQUESTS"), "RATE_LIMIT_MAX_REQUESTS")?
            .unwrap_or(DEFAULT_MAX_REQUESTS);
        let window = match get("RATE_LIMIT_WINDOW_SECS") {
            Some(raw) => match positive(Some(raw.clone()), "RATE_LIMIT_WINDOW_SECS")? {
                Some(secs) if secs <= MAX_WINDOW.as_secs() => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "RATE_LIMIT_WINDOW_SECS",
                        value: raw,
                        reason: "expected at most 604800 seconds (one week)",
                    })
                }
            },
            None => DEFAULT_WINDOW,
        };
        let request_timeout = positive(get("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let failure_policy = match get("STORE_FAILURE_POLICY") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "STORE_FAILURE_POLICY",
                value: raw,
                reason: "expected one of error, allow, reject",
            })?,
            None => StoreFailurePolicy::default(),
        };

        let url = get("UPSTASH_REDIS_REST_URL");
        let backend_name = get("RATE_LIMIT_BACKEND").unwrap_or_else(|| {
            if url.is_some() { "upstash" } else { "memory" }.to_string()
        });
        let backend = match backend_name.to_ascii_lowercase().as_str() {
            "memory" => LimiterBackend::Memory,
            "upstash" => {
                let url = url.ok_or(ConfigError::Missing {
                    var: "UPSTASH_REDIS_REST_URL",
                    because: "RATE_LIMIT_BACKEND=upstash",
                })?;
                let token = get("UPSTASH_REDIS_REST_TOKEN").ok_or(ConfigError::Missing {
                    var: "UPSTASH_REDIS_REST_TOKEN",
                    because: "RATE_LIMIT_BACKEND=upstash",
                })?;
                let mut upstash = UpstashConfig::new(url, Secret::new(token));
                if let Some(prefix) = get("RATE_LIMIT_PREFIX") {
                    upstash.prefix = prefix;
                }
                LimiterBackend::Upstash(upstash)
            }
            _ => {
                return Err(ConfigError::Invalid {
                    var: "RATE_LIMIT_BACKEND",
                    value: backend_name,
                    reason: "expected memory or upstash",
                })
            }
        };

        Ok(Self {
            port,
            client_name_header: get("CLIENT_NAME_HEADER")
                .unwrap_or_else(|| DEFAULT_CLIENT_NAME_HEADER.to_string()),
            window: SlidingWindow::new(max_requests, window),
            backend,
            failure_policy,
            request_timeout,
        })
    }
}

fn positive(raw: Option<String>, var: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected a positive integer",
        }),
    }
}
