//! Logging setup and envelope-scoped log helpers.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "coprocessor_gate=info,tower_http=info";

/// Installs the global `tracing` subscriber.
///
/// Honours `RUST_LOG` and falls back to `default_filter`. Calling it twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Logger scoped to one envelope.
///
/// Every message carries the router-assigned envelope id and the stage, so
/// the lines of one request can be correlated with the router's own logs.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeLog<'a> {
    envelope_id: &'a str,
    stage: &'a str,
}

impl<'a> EnvelopeLog<'a> {
    /// Creates a logger for an envelope. A missing id is logged as `-`.
    pub fn new(envelope_id: Option<&'a str>, stage: &'a str) -> Self {
        Self {
            envelope_id: envelope_id.unwrap_or("-"),
            stage,
        }
    }

    /// Returns the envelope id attached to every message.
    pub fn envelope_id(&self) -> &str {
        self.envelope_id
    }

    /// Logs an info-level message.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(envelope_id = %self.envelope_id, stage = %self.stage, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(envelope_id = %self.envelope_id, stage = %self.stage, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(envelope_id = %self.envelope_id, stage = %self.stage, "{}", args);
    }

    /// Logs a debug-level message.
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(envelope_id = %self.envelope_id, stage = %self.stage, "{}", args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_id_is_dashed() {
        let log = EnvelopeLog::new(None, "SupergraphRequest");
        assert_eq!(log.envelope_id(), "-");
    }

    #[test]
    fn logging_without_subscriber_is_a_no_op() {
        let log = EnvelopeLog::new(Some("abc"), "SupergraphRequest");
        log.info(format_args!("client {} admitted", "web"));
        log.warn(format_args!("store slow"));
        log.debug(format_args!("payload"));
        log.error(format_args!("store down"));
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_tracing("debug");
        init_tracing("info");
    }
}
