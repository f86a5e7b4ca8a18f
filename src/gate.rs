use std::sync::Arc;

use crate::identity::ClientIdentity;
use crate::limiter::{LimiterError, RateLimiter};

/// Window diagnostics returned with a denial.
///
/// Copied verbatim from the store so clients can compute their backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Units per window
    pub limit: u64,
    /// Units left in the current window
    pub remaining: u64,
    /// Unix time in milliseconds at which the window ends
    pub reset: u64,
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// The client had room in its window
    Allowed,
    /// The client exhausted its window
    Denied(RateLimitInfo),
}

impl AdmissionDecision {
    /// Returns `true` for [`AdmissionDecision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, AdmissionDecision::Allowed)
    }
}

/// The admission gate.
///
/// Wraps an injected [`RateLimiter`] keyed solely by client name. Every call
/// to [`admit`](Self::admit) performs exactly one consumption attempt, and a
/// denied attempt still counts against the window.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use coprocessor_gate::{AdmissionGate, ClientIdentity};
/// use coprocessor_gate::limiter::{InMemoryLimiter, SlidingWindow};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let limiter = InMemoryLimiter::new(SlidingWindow::new(1, Duration::from_secs(3600)));
/// let gate = AdmissionGate::new(Arc::new(limiter));
/// let client = ClientIdentity::new("web-client");
///
/// assert!(gate.admit(&client, 1).await.unwrap().is_allowed());
/// assert!(!gate.admit(&client, 1).await.unwrap().is_allowed());
/// # });
/// ```
#[derive(Clone)]
pub struct AdmissionGate {
    limiter: Arc<dyn RateLimiter>,
}

impl AdmissionGate {
    /// Creates a gate backed by `limiter`.
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }

    /// Consumes `cost` units for `client` and decides admission.
    ///
    /// # Errors
    ///
    /// Returns the store failure unchanged; the caller applies its failure
    /// policy.
    pub async fn admit(
        &self,
        client: &ClientIdentity,
        cost: u64,
    ) -> Result<AdmissionDecision, LimiterError> {
        let response = self.limiter.limit(client.as_str(), cost).await?;

        tracing::debug!(
            client_name = %client,
            success = response.success,
            limit = response.limit,
            remaining = response.remaining,
            reset = response.reset,
            "admission checked"
        );

        if response.success {
            Ok(AdmissionDecision::Allowed)
        } else {
            Ok(AdmissionDecision::Denied(RateLimitInfo {
                limit: response.limit,
                remaining: response.remaining,
                reset: response.reset,
            }))
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate").finish_non_exhaustive()
    }
}
