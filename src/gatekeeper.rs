//! Admission handling for the `SupergraphRequest` stage.
//!
//! Processing is split in two steps: [`RequestGatekeeper::evaluate`] walks
//! the decision sequence and returns a [`GateOutcome`];
//! [`RequestGatekeeper::process`] then writes that outcome into the envelope.
//!
//! ```text
//! Start -> OperationCheck -> Bypass
//!                         -> IdentityCheck -> Reject(400)
//!                                          -> RateCheck -> Reject(429)
//!                                                       -> Pass
//! ```
//!
//! The 400 path never reaches the counter store, so unidentified traffic
//! consumes no quota. Introspection is exempt before the identity check so
//! schema tooling works without a client name.

use crate::config::StoreFailurePolicy;
use crate::envelope::RequestEnvelope;
use crate::error::{Error, RejectionKind};
use crate::gate::{AdmissionDecision, AdmissionGate, RateLimitInfo};
use crate::graphql::{append_error, replace_errors, GraphQLError, RateLimitExtension};
use crate::identity::{operation_name, ClientIdentifier, ClientIdentity};
use crate::logging::EnvelopeLog;

/// Operation name exempt from identification and rate limiting.
pub const INTROSPECTION_OPERATION: &str = "IntrospectionQuery";

/// Units consumed by one request.
pub const REQUEST_COST: u64 = 1;

const MISSING_CLIENT_MESSAGE: &str = "Invalid or missing client id";

/// Result of walking the decision sequence for one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Introspection query, no checks performed
    Bypassed,
    /// No client name could be resolved
    MissingClient,
    /// The client was admitted
    Admitted(ClientIdentity),
    /// The client exhausted its window
    Throttled(ClientIdentity, RateLimitInfo),
    /// The store failed and the policy lets the request through
    FailedOpen(ClientIdentity),
    /// The store failed and the policy refuses the request
    FailedClosed(ClientIdentity),
}

impl GateOutcome {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            GateOutcome::Bypassed => "bypassed",
            GateOutcome::MissingClient => "missing_client",
            GateOutcome::Admitted(_) => "admitted",
            GateOutcome::Throttled(..) => "throttled",
            GateOutcome::FailedOpen(_) => "failed_open",
            GateOutcome::FailedClosed(_) => "failed_closed",
        }
    }

    /// The resolved client, if the sequence got that far.
    pub fn client(&self) -> Option<&ClientIdentity> {
        match self {
            GateOutcome::Admitted(client)
            | GateOutcome::Throttled(client, _)
            | GateOutcome::FailedOpen(client)
            | GateOutcome::FailedClosed(client) => Some(client),
            GateOutcome::Bypassed | GateOutcome::MissingClient => None,
        }
    }

    /// Returns `true` when the envelope gets a short-circuit directive.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            GateOutcome::MissingClient | GateOutcome::Throttled(..) | GateOutcome::FailedClosed(_)
        )
    }
}

/// Identifies the client of a request and enforces its rate limit.
///
/// Holds no per-request state; one instance serves all requests
/// concurrently.
#[derive(Debug, Clone)]
pub struct RequestGatekeeper {
    identifier: ClientIdentifier,
    gate: AdmissionGate,
    failure_policy: StoreFailurePolicy,
}

impl RequestGatekeeper {
    /// Creates a gatekeeper that propagates store failures.
    pub fn new(identifier: ClientIdentifier, gate: AdmissionGate) -> Self {
        Self {
            identifier,
            gate,
            failure_policy: StoreFailurePolicy::default(),
        }
    }

    /// Sets the behavior on store failure.
    pub fn with_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Walks the decision sequence without touching the envelope.
    ///
    /// Consults the store at most once, and only for identified,
    /// non-introspection requests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Limiter`] when the store fails under
    /// [`StoreFailurePolicy::Error`].
    pub async fn evaluate(&self, envelope: &RequestEnvelope) -> Result<GateOutcome, Error> {
        if operation_name(envelope) == Some(INTROSPECTION_OPERATION) {
            return Ok(GateOutcome::Bypassed);
        }

        let Some(client) = self.identifier.identify(envelope) else {
            return Ok(GateOutcome::MissingClient);
        };

        match self.gate.admit(&client, REQUEST_COST).await {
            Ok(AdmissionDecision::Allowed) => Ok(GateOutcome::Admitted(client)),
            Ok(AdmissionDecision::Denied(info)) => Ok(GateOutcome::Throttled(client, info)),
            Err(err) => match self.failure_policy {
                StoreFailurePolicy::Error => Err(err.into()),
                StoreFailurePolicy::Allow => {
                    tracing::warn!(client_name = %client, error = %err, "rate limit store failed, admitting");
                    Ok(GateOutcome::FailedOpen(client))
                }
                StoreFailurePolicy::Reject => {
                    tracing::warn!(client_name = %client, error = %err, "rate limit store failed, rejecting");
                    Ok(GateOutcome::FailedClosed(client))
                }
            },
        }
    }

    /// Evaluates the envelope and writes the outcome into it.
    ///
    /// Admitted and bypassed envelopes are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Limiter`] when the store fails under
    /// [`StoreFailurePolicy::Error`].
    pub async fn process(&self, mut envelope: RequestEnvelope) -> Result<RequestEnvelope, Error> {
        let stage = envelope
            .stage
            .as_ref()
            .map(|stage| stage.as_str().to_string())
            .unwrap_or_default();
        let envelope_id = envelope.id.clone();
        let log = EnvelopeLog::new(envelope_id.as_deref(), &stage);
        log.debug(format_args!("received {:?}", envelope));

        let outcome = self.evaluate(&envelope).await.inspect_err(|err| {
            log.error(format_args!("{}", err));
        })?;

        match &outcome {
            GateOutcome::Bypassed | GateOutcome::Admitted(_) | GateOutcome::FailedOpen(_) => {}
            GateOutcome::MissingClient => {
                let kind = RejectionKind::MissingClientId;
                envelope.short_circuit(kind.status());
                replace_errors(
                    &mut envelope.body,
                    &GraphQLError::rejection(kind, MISSING_CLIENT_MESSAGE),
                );
            }
            GateOutcome::Throttled(client, info) => {
                let kind = RejectionKind::RateLimited;
                let error = GraphQLError::rejection(
                    kind,
                    format!("Rate limit exceeded for client: {}", client),
                )
                .with_rate_limit(RateLimitExtension {
                    client_name: client.as_str().to_string(),
                    limit: info.limit,
                    remaining: info.remaining,
                    reset: info.reset,
                });
                envelope.short_circuit(kind.status());
                append_error(&mut envelope.body, &error);
            }
            GateOutcome::FailedClosed(client) => {
                let kind = RejectionKind::StoreUnavailable;
                let error = GraphQLError::rejection(
                    kind,
                    format!("Rate limit unavailable for client: {}", client),
                );
                envelope.short_circuit(kind.status());
                append_error(&mut envelope.body, &error);
            }
        }

        let client = outcome.client().map_or("-", ClientIdentity::as_str);
        if outcome.is_refusal() {
            log.warn(format_args!(
                "request refused: outcome={} client_name={} operation_name={}",
                outcome.label(),
                client,
                operation_name(&envelope).unwrap_or("-"),
            ));
        } else {
            log.info(format_args!(
                "request passed: outcome={} client_name={}",
                outcome.label(),
                client,
            ));
        }

        Ok(envelope)
    }
}
