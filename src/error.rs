use std::fmt;

use thiserror::Error;

use crate::limiter::LimiterError;

/// Errors that abort processing of an envelope or startup.
///
/// Client-visible refusals (missing client id, throttling) are not errors:
/// they are written into the envelope. See [`RejectionKind`].
#[derive(Debug, Error)]
pub enum Error {
    /// The counter store failed and the failure policy propagates it
    #[error("rate limit check failed: {0}")]
    Limiter(#[from] LimiterError),
    /// The configuration is invalid
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// An invalid configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable could not be parsed
    #[error("{var}={value:?}: {reason}")]
    Invalid {
        /// Environment variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// What was expected
        reason: &'static str,
    },
    /// A variable required by another setting is missing
    #[error("{var} is required when {because}")]
    Missing {
        /// Environment variable name
        var: &'static str,
        /// The setting that requires it
        because: &'static str,
    },
}

/// Why a request was refused at the gate.
///
/// Each kind maps to the short-circuit status and the `extensions.code`
/// written into the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// No client name in context or header
    MissingClientId,
    /// The client used up its window
    RateLimited,
    /// The counter store failed and the failure policy rejects
    StoreUnavailable,
}

impl RejectionKind {
    /// HTTP status the router answers with.
    pub fn status(self) -> u16 {
        match self {
            RejectionKind::MissingClientId => 400,
            RejectionKind::RateLimited => 429,
            RejectionKind::StoreUnavailable => 503,
        }
    }

    /// Value of `extensions.code` in the GraphQL error.
    pub fn code(self) -> &'static str {
        match self {
            RejectionKind::MissingClientId => "INVALID_CLIENT_ID",
            RejectionKind::RateLimited => "RATE_LIMIT_EXCEED",
            RejectionKind::StoreUnavailable => "RATE_LIMIT_UNAVAILABLE",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionKind::MissingClientId => write!(f, "missing client id"),
            RejectionKind::RateLimited => write!(f, "rate limited"),
            RejectionKind::StoreUnavailable => write!(f, "rate limit store unavailable"),
        }
    }
}
